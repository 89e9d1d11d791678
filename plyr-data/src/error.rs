//! Error types for header parsing, binding and data decoding.

use thiserror::Error;

use crate::types::DataType;

/// Errors that can occur while decoding a PLY document.
#[derive(Debug, Error)]
pub enum PlyError {
    #[error("Header syntax error at line {line}: {message}")]
    HeaderSyntax { line: usize, message: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error(
        "Buffer underrun in element '{element}', property '{property}', instance {instance}: \
         need {needed} bytes at offset {offset}, only {available} available"
    )]
    BufferUnderrun {
        element: String,
        property: String,
        instance: usize,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Malformed data in element '{element}', property '{property}', instance {instance}: {reason}")]
    MalformedData {
        element: String,
        property: String,
        instance: usize,
        reason: String,
    },

    #[error("Destination for '{element}.{property}' is full ({limit} values)")]
    BufferOverflow {
        element: String,
        property: String,
        limit: usize,
    },

    #[error("Unknown element: {0}")]
    UnknownElement(String),

    #[error("Unknown property '{property}' in element '{element}'")]
    UnknownProperty { element: String, property: String },

    #[error("Binding mismatch for '{element}.{property}': {message}")]
    BindingMismatch {
        element: String,
        property: String,
        message: String,
    },

    #[error("Property '{element}.{property}' is already bound")]
    DuplicateBinding { element: String, property: String },

    #[error("Destination for '{element}.{property}' holds {capacity} values, {required} required")]
    InsufficientCapacity {
        element: String,
        property: String,
        capacity: usize,
        required: usize,
    },

    #[error("Element '{element}' declares {count} instances, too many to bind")]
    CountOverflow { element: String, count: usize },

    #[error("Cannot view {data_type} values as a {size}-byte type")]
    TypeWidthMismatch { data_type: DataType, size: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlyError>;

impl PlyError {
    pub(crate) fn header(line: usize, message: impl Into<String>) -> Self {
        PlyError::HeaderSyntax {
            line,
            message: message.into(),
        }
    }
}
