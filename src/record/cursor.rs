//! Sequential field extraction over a byte buffer.
//!
//! Subheaders are parsed field by field in declared order; the cursor
//! tracks the position and turns short reads into [`FormatError::Truncated`]
//! with enough context to name the field that ran off the end.

use crate::error::{FormatError, IoError};
use crate::io::IoHandle;
use crate::record::field::{Field, FieldKind};

/// A forward-only cursor over a subheader byte buffer.
pub(crate) struct FieldCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left in the buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take the next `len` raw bytes, or fail naming `what`.
    pub fn take_bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8], FormatError> {
        if self.remaining() < len {
            return Err(FormatError::Truncated {
                message: format!(
                    "{} needs {} bytes, only {} left at offset {}",
                    what,
                    len,
                    self.remaining(),
                    self.pos
                ),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Take the next `len` bytes as a field of the given kind.
    pub fn take(&mut self, kind: FieldKind, len: usize, what: &str) -> Result<Field, FormatError> {
        let bytes = self.take_bytes(len, what)?;
        Ok(Field::from_bytes(kind, bytes.to_vec()))
    }

    /// Take a BCS-N field and parse it as an unsigned count.
    pub fn take_count(&mut self, len: usize, what: &str) -> Result<u64, FormatError> {
        let field = self.take(FieldKind::BcsN, len, what)?;
        field.as_u64().map_err(|_| FormatError::Truncated {
            message: format!("{} is not numeric: {:?}", what, field.as_str()),
        })
    }
}

/// A forward-only cursor over an [`IoHandle`], for structures whose total
/// length is not known until their fields are read (the file header).
///
/// Reads happen at the handle's cursor; a short read becomes
/// [`FormatError::Truncated`] naming the field.
pub(crate) struct HandleCursor<'a> {
    handle: &'a IoHandle,
}

impl<'a> HandleCursor<'a> {
    pub fn new(handle: &'a IoHandle) -> Self {
        Self { handle }
    }

    /// Absolute offset of the next read.
    pub fn pos(&self) -> Result<u64, FormatError> {
        Ok(self.handle.tell()?)
    }

    /// Take the next `len` raw bytes, or fail naming `what`.
    pub fn take_bytes(&mut self, len: usize, what: &str) -> Result<Vec<u8>, FormatError> {
        match self.handle.read(len) {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(IoError::RangeOutOfBounds {
                offset, requested, ..
            }) => Err(FormatError::Truncated {
                message: format!("{} needs {} bytes at offset {}", what, requested, offset),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Take the next `len` bytes as a field of the given kind.
    pub fn take(&mut self, kind: FieldKind, len: usize, what: &str) -> Result<Field, FormatError> {
        Ok(Field::from_bytes(kind, self.take_bytes(len, what)?))
    }

    /// Take a BCS-N field and parse it as an unsigned count.
    pub fn take_count(&mut self, len: usize, what: &str) -> Result<u64, FormatError> {
        let field = self.take(FieldKind::BcsN, len, what)?;
        field.as_u64().map_err(|_| FormatError::Truncated {
            message: format!("{} is not numeric: {:?}", what, field.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_sequence() {
        let buf = b"IM0000012345";
        let mut cursor = FieldCursor::new(buf);

        let part = cursor.take(FieldKind::BcsA, 2, "part type").unwrap();
        assert_eq!(part.as_str(), "IM");

        let count = cursor.take_count(5, "count").unwrap();
        assert_eq!(count, 1);

        assert_eq!(cursor.take_bytes(5, "tail").unwrap(), b"12345");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_truncated_names_field() {
        let mut cursor = FieldCursor::new(b"ab");
        let err = cursor.take_bytes(5, "FTITLE").unwrap_err();
        match err {
            FormatError::Truncated { message } => {
                assert!(message.contains("FTITLE"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_count() {
        let mut cursor = FieldCursor::new(b"ABC");
        assert!(cursor.take_count(3, "NUMI").is_err());
    }
}
