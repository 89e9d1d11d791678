//! Binary and ASCII value sources for the data section

use std::str::SplitAsciiWhitespace;

use crate::types::{ByteOrder, DataType, Scalar};

/// Failure reported by a source before the walker attaches its location.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SourceError {
    Underrun {
        offset: usize,
        needed: usize,
        available: usize,
    },
    Malformed(String),
}

/// Sequential reader of typed values.
pub(crate) trait ValueSource {
    fn read(&mut self, data_type: DataType) -> Result<Scalar, SourceError>;

    fn skip(&mut self, data_type: DataType) -> Result<(), SourceError>;

    fn skip_many(&mut self, data_type: DataType, count: usize) -> Result<(), SourceError> {
        for _ in 0..count {
            self.skip(data_type)?;
        }
        Ok(())
    }

    /// Skip `len` raw bytes in one step. Returns `false`, consuming nothing,
    /// if the source is not byte addressed or too short.
    fn skip_bytes(&mut self, _len: usize) -> bool {
        false
    }

    /// Whether unread data remains after the walk.
    fn has_trailing(&self) -> bool;
}

/// Packed records in a contiguous buffer.
pub(crate) struct BinarySource<'a> {
    data: &'a [u8],
    offset: usize,
    order: ByteOrder,
}

impl<'a> BinarySource<'a> {
    pub(crate) fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            data,
            offset: 0,
            order,
        }
    }

    #[cfg(test)]
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], SourceError> {
        let available = self.data.len() - self.offset;
        if needed > available {
            return Err(SourceError::Underrun {
                offset: self.offset,
                needed,
                available,
            });
        }
        let bytes = &self.data[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(bytes)
    }
}

impl ValueSource for BinarySource<'_> {
    fn read(&mut self, data_type: DataType) -> Result<Scalar, SourceError> {
        let order = self.order;
        let bytes = self.take(data_type.width())?;
        Ok(Scalar::decode(data_type, bytes, order))
    }

    fn skip(&mut self, data_type: DataType) -> Result<(), SourceError> {
        self.take(data_type.width()).map(|_| ())
    }

    fn skip_many(&mut self, data_type: DataType, count: usize) -> Result<(), SourceError> {
        let needed = data_type.width().checked_mul(count).unwrap_or(usize::MAX);
        self.take(needed).map(|_| ())
    }

    fn skip_bytes(&mut self, len: usize) -> bool {
        self.take(len).is_ok()
    }

    fn has_trailing(&self) -> bool {
        self.offset < self.data.len()
    }
}

/// Whitespace separated tokens; line breaks carry no meaning.
pub(crate) struct AsciiSource<'a> {
    tokens: SplitAsciiWhitespace<'a>,
}

impl<'a> AsciiSource<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            tokens: text.split_ascii_whitespace(),
        }
    }

    fn next_token(&mut self) -> Result<&'a str, SourceError> {
        self.tokens
            .next()
            .ok_or_else(|| SourceError::Malformed("unexpected end of data".to_string()))
    }
}

impl ValueSource for AsciiSource<'_> {
    fn read(&mut self, data_type: DataType) -> Result<Scalar, SourceError> {
        let token = self.next_token()?;
        Scalar::parse(data_type, token).map_err(SourceError::Malformed)
    }

    fn skip(&mut self, _data_type: DataType) -> Result<(), SourceError> {
        self.next_token().map(|_| ())
    }

    fn has_trailing(&self) -> bool {
        self.tokens.clone().next().is_some()
    }
}
