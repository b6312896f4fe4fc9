//! Tagged Record Extensions.
//!
//! A TRE is a `(tag, payload)` record attached to a header's user-defined
//! or extended section, serialized as a 6-character tag, a 5-digit payload
//! length, and the payload itself. When the [`registry`](TreRegistry) knows
//! the tag, the payload decomposes into named sub-fields per the tag's
//! [`TreDescriptor`]; unknown tags are carried as raw bytes and re-emitted
//! verbatim, so a file with unrecognized extensions still round-trips
//! exactly.

mod descriptor;
mod registry;

pub use descriptor::{CondDef, DescriptorKind, FieldDef, FieldSpec, LoopDef, TreDescriptor};
pub use registry::TreRegistry;

use std::sync::Arc;

use descriptor::{expand_layout, ExpandedField};

use crate::error::TreError;
use crate::record::{Field, FieldKind};

// =============================================================================
// Constants
// =============================================================================

/// Length of the tag portion of a serialized TRE.
pub const TRE_TAG_LEN: usize = 6;

/// Length of the payload-length portion of a serialized TRE.
pub const TRE_LENGTH_LEN: usize = 5;

/// Largest payload a TRE can declare (5 decimal digits).
pub const TRE_MAX_PAYLOAD: usize = 99_999;

/// Pseudo-field name exposed by raw-bytes extensions.
pub const RAW_DATA_FIELD: &str = "raw_data";

// =============================================================================
// Tre
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TreBody {
    /// Layout known: ordered named sub-fields
    Typed {
        descriptor: Arc<TreDescriptor>,
        fields: Vec<(String, Field)>,
    },
    /// Layout unknown: the payload is preserved verbatim
    Raw { data: Field },
}

/// A single tagged record extension.
#[derive(Debug, Clone, PartialEq)]
pub struct Tre {
    tag: String,
    body: TreBody,
}

impl Tre {
    /// Construct a raw-bytes extension that re-emits `payload` verbatim.
    pub fn raw(tag: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            tag: tag.into(),
            body: TreBody::Raw {
                data: Field::from_bytes(FieldKind::Binary, payload.to_vec()),
            },
        }
    }

    /// Construct an empty typed extension from a descriptor.
    ///
    /// Sub-fields take their descriptor defaults; loops over a defaulted
    /// zero count expand to nothing until the count field is set.
    pub fn from_descriptor(descriptor: Arc<TreDescriptor>) -> Result<Self, TreError> {
        let rows = expand_layout(&descriptor, &|_| None)?;
        let fields = rows.into_iter().map(materialize).collect();
        Ok(Self {
            tag: descriptor.tag.clone(),
            body: TreBody::Typed { descriptor, fields },
        })
    }

    /// Parse a typed extension from its payload bytes.
    ///
    /// Walks the descriptor in declared order, resolving loop counts and
    /// conditions from sub-fields parsed earlier in the same payload.
    ///
    /// # Errors
    /// [`TreError::LengthMismatch`] if the payload is shorter or longer
    /// than the expanded layout.
    pub fn parse(descriptor: Arc<TreDescriptor>, payload: &[u8]) -> Result<Self, TreError> {
        let mut fields: Vec<(String, Field)> = Vec::new();
        let mut pos = 0usize;
        parse_specs(
            &descriptor,
            &descriptor.fields,
            "",
            payload,
            &mut pos,
            &mut fields,
        )?;
        if pos != payload.len() {
            return Err(TreError::LengthMismatch {
                tag: descriptor.tag.clone(),
                declared: payload.len(),
                actual: pos,
            });
        }
        Ok(Self {
            tag: descriptor.tag.clone(),
            body: TreBody::Typed { descriptor, fields },
        })
    }

    /// The 6-character tag (trimmed).
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether this extension is carried as raw bytes.
    pub fn is_raw(&self) -> bool {
        matches!(self.body, TreBody::Raw { .. })
    }

    /// Payload size in bytes (the value the length prefix will carry).
    pub fn current_size(&self) -> usize {
        match &self.body {
            TreBody::Typed { fields, .. } => fields.iter().map(|(_, f)| f.len()).sum(),
            TreBody::Raw { data } => data.len(),
        }
    }

    /// Full serialized size: tag + length prefix + payload.
    pub fn serialized_len(&self) -> usize {
        TRE_TAG_LEN + TRE_LENGTH_LEN + self.current_size()
    }

    /// Look up a sub-field by name. Raw extensions expose a single
    /// [`RAW_DATA_FIELD`].
    pub fn get(&self, name: &str) -> Option<&Field> {
        match &self.body {
            TreBody::Typed { fields, .. } => fields
                .iter()
                .find(|(field_name, _)| field_name == name)
                .map(|(_, field)| field),
            TreBody::Raw { data } => (name == RAW_DATA_FIELD).then_some(data),
        }
    }

    /// Whether a sub-field with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a sub-field from a string value.
    ///
    /// After the set, the layout is re-expanded against the new values:
    /// growing a loop count adds fresh defaulted rows, shrinking it drops
    /// the excess, and satisfied conditions bring their rows into
    /// existence.
    pub fn set_string(&mut self, name: &str, value: &str) -> Result<(), TreError> {
        let (descriptor, fields) = match &mut self.body {
            TreBody::Typed { descriptor, fields } => (descriptor, fields),
            TreBody::Raw { .. } => {
                return Err(TreError::NoSuchField {
                    tag: self.tag.clone(),
                    field: name.to_string(),
                });
            }
        };
        let slot = fields
            .iter_mut()
            .find(|(field_name, _)| field_name == name)
            .ok_or_else(|| TreError::NoSuchField {
                tag: descriptor.tag.clone(),
                field: name.to_string(),
            })?;
        slot.1.set_string(value)?;
        self.reflow()
    }

    /// Set a numeric sub-field.
    pub fn set_uint(&mut self, name: &str, value: u64) -> Result<(), TreError> {
        self.set_string(name, &value.to_string())
    }

    /// Iterate `(name, field)` pairs in serialization order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        let pairs: Vec<(&str, &Field)> = match &self.body {
            TreBody::Typed { fields, .. } => fields
                .iter()
                .map(|(name, field)| (name.as_str(), field))
                .collect(),
            TreBody::Raw { data } => vec![(RAW_DATA_FIELD, data)],
        };
        pairs.into_iter()
    }

    /// Serialize as tag + 5-digit length + payload.
    ///
    /// # Errors
    /// [`TreError::LengthMismatch`] if the payload exceeds the 5-digit
    /// length prefix.
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> Result<(), TreError> {
        let size = self.current_size();
        if size > TRE_MAX_PAYLOAD {
            return Err(TreError::LengthMismatch {
                tag: self.tag.clone(),
                declared: TRE_MAX_PAYLOAD,
                actual: size,
            });
        }
        let mut tag_field = Field::new(FieldKind::BcsA, TRE_TAG_LEN);
        tag_field.set_string(&self.tag)?;
        out.extend_from_slice(tag_field.bytes());
        out.extend_from_slice(format!("{:05}", size).as_bytes());
        match &self.body {
            TreBody::Typed { fields, .. } => {
                for (_, field) in fields {
                    out.extend_from_slice(field.bytes());
                }
            }
            TreBody::Raw { data } => out.extend_from_slice(data.bytes()),
        }
        Ok(())
    }

    /// Serialize to a fresh buffer.
    pub fn serialize(&self) -> Result<Vec<u8>, TreError> {
        let mut out = Vec::with_capacity(self.serialized_len());
        self.serialize_into(&mut out)?;
        Ok(out)
    }

    /// The payload bytes alone, without the tag and length prefix.
    ///
    /// This is the form data-extension subheader fields are stored in:
    /// their length is carried by the subheader's own length field.
    pub fn payload_bytes(&self) -> Vec<u8> {
        match &self.body {
            TreBody::Typed { fields, .. } => {
                let mut out = Vec::with_capacity(self.current_size());
                for (_, field) in fields {
                    out.extend_from_slice(field.bytes());
                }
                out
            }
            TreBody::Raw { data } => data.bytes().to_vec(),
        }
    }

    /// Re-expand the layout, preserving values for rows that survive.
    fn reflow(&mut self) -> Result<(), TreError> {
        let (descriptor, fields) = match &self.body {
            TreBody::Typed { descriptor, fields } => (descriptor.clone(), fields.clone()),
            TreBody::Raw { .. } => return Ok(()),
        };
        let rows = expand_layout(&descriptor, &|name| {
            fields
                .iter()
                .find(|(field_name, _)| field_name == name)
                .map(|(_, field)| field.clone())
        })?;
        let new_fields = rows
            .into_iter()
            .map(|row| {
                match fields
                    .iter()
                    .find(|(name, field)| *name == row.name && field.len() == row.len)
                {
                    Some((name, field)) => (name.clone(), field.clone()),
                    None => materialize(row),
                }
            })
            .collect();
        self.body = TreBody::Typed {
            descriptor,
            fields: new_fields,
        };
        Ok(())
    }
}

/// Turn an expanded row into a defaulted field.
fn materialize(row: ExpandedField) -> (String, Field) {
    let mut field = Field::new(row.kind, row.len);
    if let Some(ref default) = row.default {
        let _ = field.set_string(default);
    }
    (row.name, field)
}

/// Recursive payload walk mirroring descriptor expansion.
fn parse_specs(
    descriptor: &TreDescriptor,
    specs: &[FieldSpec],
    suffix: &str,
    payload: &[u8],
    pos: &mut usize,
    fields: &mut Vec<(String, Field)>,
) -> Result<(), TreError> {
    for spec in specs {
        match spec {
            FieldSpec::Field(def) => {
                if *pos + def.len > payload.len() {
                    return Err(TreError::LengthMismatch {
                        tag: descriptor.tag.clone(),
                        declared: payload.len(),
                        actual: *pos + def.len,
                    });
                }
                let bytes = payload[*pos..*pos + def.len].to_vec();
                *pos += def.len;
                fields.push((
                    format!("{}{}", def.name, suffix),
                    Field::from_bytes(def.kind.field_kind(), bytes),
                ));
            }
            FieldSpec::Loop(def) => {
                let count_name = format!("{}{}", def.count, suffix);
                let count = lookup_parsed(fields, &count_name)
                    .and_then(|field| field.as_u64().ok())
                    .ok_or_else(|| TreError::BadLoopCount {
                        tag: descriptor.tag.clone(),
                        field: count_name,
                    })?;
                for index in 0..count {
                    let nested = format!("{}[{}]", suffix, index);
                    parse_specs(descriptor, &def.fields, &nested, payload, pos, fields)?;
                }
            }
            FieldSpec::Cond(def) => {
                let field_name = format!("{}{}", def.field, suffix);
                let value =
                    lookup_parsed(fields, &field_name).ok_or_else(|| TreError::BadLoopCount {
                        tag: descriptor.tag.clone(),
                        field: field_name,
                    })?;
                if value.as_str().trim() == def.equals {
                    parse_specs(descriptor, &def.fields, suffix, payload, pos, fields)?;
                }
            }
        }
    }
    Ok(())
}

fn lookup_parsed<'a>(fields: &'a [(String, Field)], name: &str) -> Option<&'a Field> {
    fields
        .iter()
        .find(|(field_name, _)| field_name == name)
        .map(|(_, field)| field)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lut_descriptor() -> Arc<TreDescriptor> {
        Arc::new(TreDescriptor {
            tag: "LUTTRE".to_string(),
            variant: None,
            fields: vec![
                FieldSpec::Field(FieldDef {
                    name: "NAME".to_string(),
                    kind: DescriptorKind::A,
                    len: 4,
                    default: None,
                }),
                FieldSpec::Field(FieldDef {
                    name: "NENTRIES".to_string(),
                    kind: DescriptorKind::N,
                    len: 2,
                    default: None,
                }),
                FieldSpec::Loop(LoopDef {
                    count: "NENTRIES".to_string(),
                    fields: vec![FieldSpec::Field(FieldDef {
                        name: "VALUE".to_string(),
                        kind: DescriptorKind::N,
                        len: 3,
                        default: None,
                    })],
                }),
            ],
        })
    }

    #[test]
    fn test_raw_roundtrips_verbatim() {
        let tre = Tre::raw("FOOBAR", b"\x01\x02payload");
        let bytes = tre.serialize().unwrap();
        assert_eq!(&bytes[..6], b"FOOBAR");
        assert_eq!(&bytes[6..11], b"00009");
        assert_eq!(&bytes[11..], b"\x01\x02payload");
        assert!(tre.is_raw());
        assert_eq!(tre.get(RAW_DATA_FIELD).map(|f| f.bytes()), Some(&b"\x01\x02payload"[..]));
    }

    #[test]
    fn test_short_tag_is_space_padded() {
        let tre = Tre::raw("AB", b"x");
        let bytes = tre.serialize().unwrap();
        assert_eq!(&bytes[..6], b"AB    ");
    }

    #[test]
    fn test_construct_set_grows_loop() {
        let mut tre = Tre::from_descriptor(lut_descriptor()).unwrap();
        assert_eq!(tre.current_size(), 6);

        tre.set_uint("NENTRIES", 2).unwrap();
        assert!(tre.contains("VALUE[0]"));
        assert!(tre.contains("VALUE[1]"));
        assert_eq!(tre.current_size(), 6 + 2 * 3);

        tre.set_uint("VALUE[1]", 42).unwrap();
        assert_eq!(tre.get("VALUE[1]").map(|f| f.bytes()), Some(&b"042"[..]));

        // Shrink the loop; excess rows drop
        tre.set_uint("NENTRIES", 1).unwrap();
        assert!(tre.contains("VALUE[0]"));
        assert!(!tre.contains("VALUE[1]"));
    }

    #[test]
    fn test_parse_serialize_equality() {
        let descriptor = lut_descriptor();
        let mut tre = Tre::from_descriptor(descriptor.clone()).unwrap();
        tre.set_string("NAME", "GAIN").unwrap();
        tre.set_uint("NENTRIES", 2).unwrap();
        tre.set_uint("VALUE[0]", 7).unwrap();
        tre.set_uint("VALUE[1]", 909).unwrap();

        let bytes = tre.serialize().unwrap();
        let payload = &bytes[TRE_TAG_LEN + TRE_LENGTH_LEN..];
        let parsed = Tre::parse(descriptor, payload).unwrap();
        assert_eq!(parsed, tre);
    }

    #[test]
    fn test_parse_length_mismatch() {
        let descriptor = lut_descriptor();
        // NENTRIES = 02 but only one entry present
        let payload = b"GAIN02007";
        let result = Tre::parse(descriptor, payload);
        assert!(matches!(result, Err(TreError::LengthMismatch { .. })));
    }

    #[test]
    fn test_parse_trailing_bytes_rejected() {
        let descriptor = lut_descriptor();
        let payload = b"GAIN00extra";
        let result = Tre::parse(descriptor, payload);
        assert!(matches!(result, Err(TreError::LengthMismatch { .. })));
    }

    #[test]
    fn test_set_unknown_field() {
        let mut tre = Tre::from_descriptor(lut_descriptor()).unwrap();
        let result = tre.set_string("MISSING", "x");
        assert!(matches!(result, Err(TreError::NoSuchField { .. })));
    }

    #[test]
    fn test_set_on_raw_fails() {
        let mut tre = Tre::raw("FOOBAR", b"abc");
        assert!(tre.set_string("anything", "x").is_err());
    }

    #[test]
    fn test_iter_order() {
        let mut tre = Tre::from_descriptor(lut_descriptor()).unwrap();
        tre.set_uint("NENTRIES", 1).unwrap();
        let names: Vec<&str> = tre.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["NAME", "NENTRIES", "VALUE[0]"]);
    }
}
