//! Fixed-width typed header fields.
//!
//! Every value in a file header or segment subheader is a [`Field`]: a run
//! of exactly `L` bytes with a declared kind that fixes its padding and
//! justification rules. The serialized form of a field is always its full
//! declared length, so a subheader's byte size is fully determined by its
//! field table.
//!
//! # Kinds
//!
//! - **BCS-A**: printable ASCII, left-justified, space-padded on the right
//! - **BCS-N**: digits (optionally signed/decimal), right-justified,
//!   zero-padded on the left
//! - **Binary**: opaque bytes, no padding rules

use crate::error::FieldError;

// =============================================================================
// FieldKind
// =============================================================================

/// The kind of a fixed-width field, which determines padding and parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Printable ASCII text, space-padded right
    BcsA,
    /// Numeric content, zero-padded left
    BcsN,
    /// Opaque binary content
    Binary,
}

impl FieldKind {
    /// Short name used in error messages and dumps.
    pub const fn name(self) -> &'static str {
        match self {
            FieldKind::BcsA => "BCS-A",
            FieldKind::BcsN => "BCS-N",
            FieldKind::Binary => "binary",
        }
    }
}

// =============================================================================
// Field
// =============================================================================

/// A fixed-width typed value.
///
/// The backing storage is always exactly the declared length; mutators
/// re-pad on every set and fail with [`FieldError::Overflow`] (leaving the
/// content unchanged) when a value does not fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    kind: FieldKind,
    data: Vec<u8>,
}

impl Field {
    /// Create a field of the given kind and declared length, filled with
    /// its kind's default padding (spaces for BCS-A, zeros otherwise).
    pub fn new(kind: FieldKind, len: usize) -> Self {
        let fill = match kind {
            FieldKind::BcsA => b' ',
            FieldKind::BcsN => b'0',
            FieldKind::Binary => 0u8,
        };
        Self {
            kind,
            data: vec![fill; len],
        }
    }

    /// Create a BCS-A field pre-set to `value`.
    ///
    /// Intended for default field tables; fails like [`Field::set_string`].
    pub fn bcs_a(len: usize, value: &str) -> Result<Self, FieldError> {
        let mut field = Self::new(FieldKind::BcsA, len);
        field.set_string(value)?;
        Ok(field)
    }

    /// Create a BCS-N field pre-set to `value`.
    pub fn bcs_n(len: usize, value: u64) -> Result<Self, FieldError> {
        let mut field = Self::new(FieldKind::BcsN, len);
        field.set_uint(value)?;
        Ok(field)
    }

    /// Take ownership of raw bytes parsed from a file.
    ///
    /// No padding is applied: the bytes are the field, whatever the file
    /// contained.
    pub fn from_bytes(kind: FieldKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// The declared length in bytes. Fixed at construction.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the declared length is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The field's kind.
    #[inline]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The raw serialized bytes. Always exactly `len()` long.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    // -------------------------------------------------------------------------
    // Setters
    // -------------------------------------------------------------------------

    /// Set from a string, padding per the field kind.
    ///
    /// BCS-A values are left-justified and space-padded; BCS-N values are
    /// right-justified and zero-padded. Binary fields copy the bytes and
    /// zero-fill the remainder.
    ///
    /// # Errors
    /// [`FieldError::Overflow`] if the value is longer than the declared
    /// length. The field is left unchanged.
    pub fn set_string(&mut self, value: &str) -> Result<(), FieldError> {
        let bytes = value.as_bytes();
        if bytes.len() > self.data.len() {
            return Err(FieldError::Overflow {
                actual: bytes.len(),
                declared: self.data.len(),
            });
        }
        match self.kind {
            FieldKind::BcsA => {
                self.data[..bytes.len()].copy_from_slice(bytes);
                self.data[bytes.len()..].fill(b' ');
            }
            FieldKind::BcsN => {
                let pad = self.data.len() - bytes.len();
                self.data[..pad].fill(b'0');
                self.data[pad..].copy_from_slice(bytes);
            }
            FieldKind::Binary => {
                self.data[..bytes.len()].copy_from_slice(bytes);
                self.data[bytes.len()..].fill(0);
            }
        }
        Ok(())
    }

    /// Set from an unsigned integer, zero-padded to the declared length.
    pub fn set_uint(&mut self, value: u64) -> Result<(), FieldError> {
        self.set_string(&value.to_string())
    }

    /// Set from a signed integer. Negative values keep their sign digit.
    pub fn set_int(&mut self, value: i64) -> Result<(), FieldError> {
        if value < 0 {
            // Sign goes first, zeros between sign and digits
            let digits = value.unsigned_abs().to_string();
            if digits.len() + 1 > self.data.len() {
                return Err(FieldError::Overflow {
                    actual: digits.len() + 1,
                    declared: self.data.len(),
                });
            }
            let pad = self.data.len() - digits.len() - 1;
            self.data[0] = b'-';
            self.data[1..1 + pad].fill(b'0');
            self.data[1 + pad..].copy_from_slice(digits.as_bytes());
            Ok(())
        } else {
            self.set_uint(value as u64)
        }
    }

    /// Replace the raw content. Shorter input is zero-padded on the right.
    ///
    /// # Errors
    /// [`FieldError::Overflow`] if `bytes` is longer than the declared
    /// length.
    pub fn set_raw(&mut self, bytes: &[u8]) -> Result<(), FieldError> {
        if bytes.len() > self.data.len() {
            return Err(FieldError::Overflow {
                actual: bytes.len(),
                declared: self.data.len(),
            });
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.data[bytes.len()..].fill(0);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Getters
    // -------------------------------------------------------------------------

    /// The content as a string with kind-appropriate padding trimmed:
    /// trailing spaces for BCS-A, nothing for BCS-N (zeros are
    /// significant), lossy conversion for binary.
    pub fn as_str(&self) -> String {
        match self.kind {
            FieldKind::BcsA => String::from_utf8_lossy(&self.data)
                .trim_end_matches(' ')
                .to_string(),
            _ => String::from_utf8_lossy(&self.data).to_string(),
        }
    }

    /// Parse the content as an unsigned integer.
    ///
    /// Accepts both BCS-N content and numeric BCS-A content (surrounding
    /// spaces ignored).
    pub fn as_u64(&self) -> Result<u64, FieldError> {
        let trimmed = self.trimmed_numeric()?;
        trimmed.parse::<u64>().map_err(|_| FieldError::NotNumeric {
            content: trimmed.to_string(),
        })
    }

    /// Parse the content as a signed integer.
    pub fn as_i64(&self) -> Result<i64, FieldError> {
        let trimmed = self.trimmed_numeric()?;
        trimmed.parse::<i64>().map_err(|_| FieldError::NotNumeric {
            content: trimmed.to_string(),
        })
    }

    /// Parse the content as a float (BCS-N with decimal point).
    pub fn as_f64(&self) -> Result<f64, FieldError> {
        let trimmed = self.trimmed_numeric()?;
        trimmed.parse::<f64>().map_err(|_| FieldError::NotNumeric {
            content: trimmed.to_string(),
        })
    }

    fn trimmed_numeric(&self) -> Result<&str, FieldError> {
        if self.kind == FieldKind::Binary {
            return Err(FieldError::TypeMismatch {
                expected: "BCS-A or BCS-N",
                actual: "binary",
            });
        }
        let text = std::str::from_utf8(&self.data).map_err(|_| FieldError::NotNumeric {
            content: format!("{:?}", self.data),
        })?;
        Ok(text.trim())
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FieldKind::Binary => write!(f, "0x{}", hex::encode(&self.data)),
            _ => write!(f, "{}", String::from_utf8_lossy(&self.data)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_default_padding() {
        assert_eq!(Field::new(FieldKind::BcsA, 4).bytes(), b"    ");
        assert_eq!(Field::new(FieldKind::BcsN, 4).bytes(), b"0000");
        assert_eq!(Field::new(FieldKind::Binary, 4).bytes(), &[0u8; 4]);
    }

    #[test]
    fn test_bcs_a_space_padded_right() {
        let mut field = Field::new(FieldKind::BcsA, 8);
        field.set_string("ABC").unwrap();
        assert_eq!(field.bytes(), b"ABC     ");
        assert_eq!(field.as_str(), "ABC");
    }

    #[test]
    fn test_bcs_n_zero_padded_left() {
        let mut field = Field::new(FieldKind::BcsN, 6);
        field.set_uint(42).unwrap();
        assert_eq!(field.bytes(), b"000042");
        assert_eq!(field.as_u64().unwrap(), 42);
    }

    #[test]
    fn test_bcs_n_negative() {
        let mut field = Field::new(FieldKind::BcsN, 6);
        field.set_int(-37).unwrap();
        assert_eq!(field.bytes(), b"-00037");
        assert_eq!(field.as_i64().unwrap(), -37);
    }

    #[test]
    fn test_overflow_leaves_field_unchanged() {
        let mut field = Field::new(FieldKind::BcsA, 5);
        field.set_string("HELLO").unwrap();

        let result = field.set_string("too-long-value");
        assert!(matches!(
            result,
            Err(FieldError::Overflow {
                actual: 14,
                declared: 5
            })
        ));
        // Contents unchanged
        assert_eq!(field.bytes(), b"HELLO");
    }

    #[test]
    fn test_serialized_length_invariant() {
        let mut field = Field::new(FieldKind::BcsN, 10);
        for value in [0u64, 7, 123, 9_999_999_999] {
            field.set_uint(value).unwrap();
            assert_eq!(field.bytes().len(), 10);
        }
        assert!(field.set_uint(10_000_000_000).is_err());
        assert_eq!(field.bytes().len(), 10);
    }

    #[test]
    fn test_binary_set_raw() {
        let mut field = Field::new(FieldKind::Binary, 3);
        field.set_raw(&[0xAB, 0xCD]).unwrap();
        assert_eq!(field.bytes(), &[0xAB, 0xCD, 0x00]);
        assert!(field.set_raw(&[0; 4]).is_err());
    }

    #[test]
    fn test_binary_numeric_getter_is_type_mismatch() {
        let field = Field::new(FieldKind::Binary, 2);
        assert!(matches!(
            field.as_u64(),
            Err(FieldError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_numeric_parse_of_bcs_a() {
        let mut field = Field::new(FieldKind::BcsA, 5);
        field.set_string("12").unwrap();
        // "12   " parses as 12
        assert_eq!(field.as_u64().unwrap(), 12);
    }

    #[test]
    fn test_not_numeric() {
        let mut field = Field::new(FieldKind::BcsA, 5);
        field.set_string("NITF").unwrap();
        assert!(matches!(field.as_u64(), Err(FieldError::NotNumeric { .. })));
    }

    #[test]
    fn test_as_f64() {
        let mut field = Field::new(FieldKind::BcsN, 7);
        field.set_string("03.5000").unwrap();
        assert!((field.as_f64().unwrap() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_display_binary_as_hex() {
        let mut field = Field::new(FieldKind::Binary, 3);
        field.set_raw(&[0x00, 0x7F, 0xFF]).unwrap();
        assert_eq!(field.to_string(), "0x007fff");
    }
}
