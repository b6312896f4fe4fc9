//! Ordered TRE containers attached to headers.

use crate::error::{FormatError, RecordError, TreError};
use crate::record::cursor::FieldCursor;
use crate::record::field::{Field, FieldKind};
use crate::tre::{Tre, TreRegistry, TRE_LENGTH_LEN, TRE_TAG_LEN};

/// An insertion-ordered collection of TREs.
///
/// Iteration preserves insertion order, which is also serialization
/// order. Tags need not be unique; by-tag lookup returns every match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extensions {
    tres: Vec<Tre>,
}

impl Extensions {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a TRE at the end.
    pub fn append(&mut self, tre: Tre) {
        self.tres.push(tre);
    }

    /// All TREs with the given tag, in insertion order.
    pub fn by_tag(&self, tag: &str) -> Vec<&Tre> {
        self.tres.iter().filter(|tre| tre.tag() == tag).collect()
    }

    /// Remove every TRE with the given tag.
    pub fn remove_by_tag(&mut self, tag: &str) {
        self.tres.retain(|tre| tre.tag() != tag);
    }

    /// Number of TREs in the container.
    pub fn len(&self) -> usize {
        self.tres.len()
    }

    /// True if the container holds no TREs.
    pub fn is_empty(&self) -> bool {
        self.tres.is_empty()
    }

    /// Iterate TREs in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tre> {
        self.tres.iter()
    }

    /// Mutable iteration in insertion order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Tre> {
        self.tres.iter_mut()
    }

    /// Total serialized size of the section.
    pub fn serialized_len(&self) -> usize {
        self.tres.iter().map(Tre::serialized_len).sum()
    }

    /// Serialize every TRE back to back.
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> Result<(), TreError> {
        for tre in &self.tres {
            tre.serialize_into(out)?;
        }
        Ok(())
    }

    /// Parse a TRE section.
    ///
    /// Consumes the whole buffer as a sequence of tag + length + payload
    /// records, resolving each tag through the registry (unknown tags
    /// become raw-bytes TREs).
    pub fn parse(buf: &[u8], registry: &TreRegistry) -> Result<Self, FormatError> {
        let mut tres = Vec::new();
        let mut pos = 0usize;
        while pos < buf.len() {
            if buf.len() - pos < TRE_TAG_LEN + TRE_LENGTH_LEN {
                return Err(FormatError::Truncated {
                    message: format!(
                        "TRE header needs {} bytes, only {} left in extension section",
                        TRE_TAG_LEN + TRE_LENGTH_LEN,
                        buf.len() - pos
                    ),
                });
            }
            let tag = String::from_utf8_lossy(&buf[pos..pos + TRE_TAG_LEN])
                .trim_end_matches(' ')
                .to_string();
            pos += TRE_TAG_LEN;
            let length_text = String::from_utf8_lossy(&buf[pos..pos + TRE_LENGTH_LEN]).to_string();
            let length: usize = length_text
                .trim()
                .parse()
                .map_err(|_| FormatError::Truncated {
                    message: format!("TRE {:?} has non-numeric length {:?}", tag, length_text),
                })?;
            pos += TRE_LENGTH_LEN;
            if buf.len() - pos < length {
                return Err(FormatError::Truncated {
                    message: format!(
                        "TRE {:?} declares {} payload bytes, only {} left",
                        tag,
                        length,
                        buf.len() - pos
                    ),
                });
            }
            tres.push(registry.parse_payload(&tag, &buf[pos..pos + length]));
            pos += length;
        }
        Ok(Self { tres })
    }
}

impl<'a> IntoIterator for &'a Extensions {
    type Item = &'a Tre;
    type IntoIter = std::slice::Iter<'a, Tre>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Extension section helpers (shared by every subheader)
// =============================================================================

/// Serialize a TRE section: length field, then the overflow field and TRE
/// bytes when the section is non-empty.
///
/// The declared length covers the overflow field plus the TREs, so an
/// empty section with no overflow reference costs only the length digits.
pub(crate) fn write_extension_section(
    out: &mut Vec<u8>,
    extensions: &Extensions,
    overflow: &Field,
    length_width: usize,
) -> Result<(), RecordError> {
    let overflow_set = overflow.as_u64().unwrap_or(0) != 0;
    if extensions.is_empty() && !overflow_set {
        out.extend_from_slice("0".repeat(length_width).as_bytes());
        return Ok(());
    }
    let total = extensions.serialized_len() + overflow.len();
    let max = 10usize.pow(length_width as u32) - 1;
    if total > max {
        return Err(RecordError::Invariant(format!(
            "extension section of {} bytes exceeds its {}-digit length field",
            total, length_width
        )));
    }
    out.extend_from_slice(format!("{:0width$}", total, width = length_width).as_bytes());
    out.extend_from_slice(overflow.bytes());
    extensions.serialize_into(out)?;
    Ok(())
}

/// Parse a TRE section: length field, then overflow field and TREs when
/// the length is nonzero.
pub(crate) fn parse_extension_section(
    cursor: &mut FieldCursor<'_>,
    registry: &TreRegistry,
    length_width: usize,
    overflow_width: usize,
    what: &str,
) -> Result<(Extensions, Field), FormatError> {
    let declared = cursor.take_count(length_width, &format!("{what} length"))? as usize;
    if declared == 0 {
        return Ok((Extensions::new(), Field::new(FieldKind::BcsN, overflow_width)));
    }
    if declared < overflow_width {
        return Err(FormatError::Truncated {
            message: format!(
                "{} section declares {} bytes, less than its {}-byte overflow field",
                what, declared, overflow_width
            ),
        });
    }
    let overflow = cursor.take(FieldKind::BcsN, overflow_width, &format!("{what} overflow"))?;
    let tre_bytes = cursor.take_bytes(declared - overflow_width, &format!("{what} TREs"))?;
    let extensions = Extensions::parse(tre_bytes, registry)?;
    Ok((extensions, overflow))
}

// =============================================================================
// Tests
// =============================================================================
