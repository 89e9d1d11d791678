//! Scalar types understood by the PLY format.
//!
//! [`DataType`] is the single table that drives byte widths, binary and ASCII
//! decoding, and conversion into destination buffers. Decoded values travel as
//! [`Scalar`] until they are written in the destination's representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlyError;

/// Numeric type of a property value or list count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl DataType {
    pub const ALL: [DataType; 8] = [
        DataType::Int8,
        DataType::UInt8,
        DataType::Int16,
        DataType::UInt16,
        DataType::Int32,
        DataType::UInt32,
        DataType::Float32,
        DataType::Float64,
    ];

    /// Size of one value in bytes.
    pub fn width(self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Short header name, e.g. `uchar` for [`DataType::UInt8`].
    pub fn header_name(self) -> &'static str {
        match self {
            DataType::Int8 => "char",
            DataType::UInt8 => "uchar",
            DataType::Int16 => "short",
            DataType::UInt16 => "ushort",
            DataType::Int32 => "int",
            DataType::UInt32 => "uint",
            DataType::Float32 => "float",
            DataType::Float64 => "double",
        }
    }
}

impl FromStr for DataType {
    type Err = PlyError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "int8" | "char" => Ok(DataType::Int8),
            "uint8" | "uchar" => Ok(DataType::UInt8),
            "int16" | "short" => Ok(DataType::Int16),
            "uint16" | "ushort" => Ok(DataType::UInt16),
            "int32" | "int" => Ok(DataType::Int32),
            "uint32" | "uint" => Ok(DataType::UInt32),
            "float32" | "float" => Ok(DataType::Float32),
            "float64" | "double" => Ok(DataType::Float64),
            other => Err(PlyError::UnsupportedDataType(other.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_name())
    }
}

/// Byte order of a binary data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// A single decoded value, tagged with the type it was read as.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
}

macro_rules! decode_bytes {
    ($ty:ty, $bytes:expr, $order:expr) => {{
        let mut raw = [0u8; std::mem::size_of::<$ty>()];
        raw.copy_from_slice($bytes);
        match $order {
            ByteOrder::Little => <$ty>::from_le_bytes(raw),
            ByteOrder::Big => <$ty>::from_be_bytes(raw),
        }
    }};
}

// Converts with `as` semantics: integers truncate, floats saturate.
macro_rules! write_as {
    ($value:expr, $dest:expr, $out:expr) => {{
        let v = $value;
        match $dest {
            DataType::Int8 => $out.extend_from_slice(&(v as i8).to_ne_bytes()),
            DataType::UInt8 => $out.extend_from_slice(&(v as u8).to_ne_bytes()),
            DataType::Int16 => $out.extend_from_slice(&(v as i16).to_ne_bytes()),
            DataType::UInt16 => $out.extend_from_slice(&(v as u16).to_ne_bytes()),
            DataType::Int32 => $out.extend_from_slice(&(v as i32).to_ne_bytes()),
            DataType::UInt32 => $out.extend_from_slice(&(v as u32).to_ne_bytes()),
            DataType::Float32 => $out.extend_from_slice(&(v as f32).to_ne_bytes()),
            DataType::Float64 => $out.extend_from_slice(&(v as f64).to_ne_bytes()),
        }
    }};
}

impl Scalar {
    /// Decode one value from exactly `data_type.width()` bytes.
    ///
    /// Callers slice `bytes` to the width first; a shorter slice panics.
    pub(crate) fn decode(data_type: DataType, bytes: &[u8], order: ByteOrder) -> Scalar {
        debug_assert_eq!(bytes.len(), data_type.width());
        match data_type {
            DataType::Int8 => Scalar::Int8(bytes[0] as i8),
            DataType::UInt8 => Scalar::UInt8(bytes[0]),
            DataType::Int16 => Scalar::Int16(decode_bytes!(i16, bytes, order)),
            DataType::UInt16 => Scalar::UInt16(decode_bytes!(u16, bytes, order)),
            DataType::Int32 => Scalar::Int32(decode_bytes!(i32, bytes, order)),
            DataType::UInt32 => Scalar::UInt32(decode_bytes!(u32, bytes, order)),
            DataType::Float32 => Scalar::Float32(decode_bytes!(f32, bytes, order)),
            DataType::Float64 => Scalar::Float64(decode_bytes!(f64, bytes, order)),
        }
    }

    /// Parse one ASCII token as `data_type`.
    ///
    /// Integer types only accept integer tokens within their range.
    pub fn parse(data_type: DataType, token: &str) -> Result<Scalar, String> {
        let parsed = match data_type {
            DataType::Int8 => token.parse().map(Scalar::Int8).map_err(|e| e.to_string()),
            DataType::UInt8 => token.parse().map(Scalar::UInt8).map_err(|e| e.to_string()),
            DataType::Int16 => token.parse().map(Scalar::Int16).map_err(|e| e.to_string()),
            DataType::UInt16 => token.parse().map(Scalar::UInt16).map_err(|e| e.to_string()),
            DataType::Int32 => token.parse().map(Scalar::Int32).map_err(|e| e.to_string()),
            DataType::UInt32 => token.parse().map(Scalar::UInt32).map_err(|e| e.to_string()),
            DataType::Float32 => token.parse().map(Scalar::Float32).map_err(|e| e.to_string()),
            DataType::Float64 => token.parse().map(Scalar::Float64).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| format!("cannot parse '{}' as {}: {}", token, data_type, e))
    }

    pub fn data_type(self) -> DataType {
        match self {
            Scalar::Int8(_) => DataType::Int8,
            Scalar::UInt8(_) => DataType::UInt8,
            Scalar::Int16(_) => DataType::Int16,
            Scalar::UInt16(_) => DataType::UInt16,
            Scalar::Int32(_) => DataType::Int32,
            Scalar::UInt32(_) => DataType::UInt32,
            Scalar::Float32(_) => DataType::Float32,
            Scalar::Float64(_) => DataType::Float64,
        }
    }

    /// Append this value to `out` converted to `dest`, in host byte order.
    pub fn write_to(self, dest: DataType, out: &mut Vec<u8>) {
        match self {
            Scalar::Int8(v) => write_as!(v, dest, out),
            Scalar::UInt8(v) => write_as!(v, dest, out),
            Scalar::Int16(v) => write_as!(v, dest, out),
            Scalar::UInt16(v) => write_as!(v, dest, out),
            Scalar::Int32(v) => write_as!(v, dest, out),
            Scalar::UInt32(v) => write_as!(v, dest, out),
            Scalar::Float32(v) => write_as!(v, dest, out),
            Scalar::Float64(v) => write_as!(v, dest, out),
        }
    }

    /// Interpret this value as a list length.
    ///
    /// Negative and floating-point values are rejected.
    pub fn as_count(self) -> Option<usize> {
        match self {
            Scalar::Int8(v) => usize::try_from(v).ok(),
            Scalar::UInt8(v) => Some(v as usize),
            Scalar::Int16(v) => usize::try_from(v).ok(),
            Scalar::UInt16(v) => Some(v as usize),
            Scalar::Int32(v) => usize::try_from(v).ok(),
            Scalar::UInt32(v) => usize::try_from(v).ok(),
            Scalar::Float32(_) | Scalar::Float64(_) => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int8(v) => v as f64,
            Scalar::UInt8(v) => v as f64,
            Scalar::Int16(v) => v as f64,
            Scalar::UInt16(v) => v as f64,
            Scalar::Int32(v) => v as f64,
            Scalar::UInt32(v) => v as f64,
            Scalar::Float32(v) => v as f64,
            Scalar::Float64(v) => v,
        }
    }

    /// Read one value of `data_type` from a host-order byte slice.
    pub(crate) fn from_ne_bytes(data_type: DataType, bytes: &[u8]) -> Scalar {
        let order = if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        };
        Scalar::decode(data_type, bytes, order)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int8(v) => write!(f, "{}", v),
            Scalar::UInt8(v) => write!(f, "{}", v),
            Scalar::Int16(v) => write!(f, "{}", v),
            Scalar::UInt16(v) => write!(f, "{}", v),
            Scalar::Int32(v) => write!(f, "{}", v),
            Scalar::UInt32(v) => write!(f, "{}", v),
            Scalar::Float32(v) => write!(f, "{}", v),
            Scalar::Float64(v) => write!(f, "{}", v),
        }
    }
}
