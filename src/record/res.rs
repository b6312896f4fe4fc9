//! Reserved extension segment subheader (part type "RE").
//!
//! Reserved extensions are a format escape hatch: the subheader fields
//! and data are opaque to this crate and round-trip byte for byte.

use crate::error::{FormatError, RecordError};
use crate::record::cursor::FieldCursor;
use crate::record::field::{Field, FieldKind};
use crate::record::security::SecurityGroup;
use crate::record::versions::Version;

const RESID_SZ: usize = 25;
const RESVER_SZ: usize = 2;
const RESCLAS_SZ: usize = 1;
const RESSHL_SZ: usize = 4;

/// The reserved extension segment subheader.
#[derive(Debug, Clone, PartialEq)]
pub struct ResSubheader {
    version: Version,
    pub type_id: Field,
    pub type_version: Field,
    pub classification: Field,
    pub security: SecurityGroup,
    /// Opaque user-defined subheader fields (RESSHF)
    subheader_fields: Vec<u8>,
}

impl ResSubheader {
    /// A default subheader for the given version.
    pub fn new(version: Version) -> Self {
        Self {
            version,
            type_id: Field::new(FieldKind::BcsA, RESID_SZ),
            type_version: Field::new(FieldKind::BcsN, RESVER_SZ),
            classification: Field::new(FieldKind::BcsA, RESCLAS_SZ),
            security: SecurityGroup::new(version),
            subheader_fields: Vec::new(),
        }
    }

    /// The version this subheader was built or parsed for.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The opaque subheader field bytes.
    pub fn subheader_fields(&self) -> &[u8] {
        &self.subheader_fields
    }

    /// Replace the opaque subheader field bytes.
    ///
    /// # Errors
    /// [`RecordError::Invariant`] when the bytes exceed the 4-digit
    /// length field.
    pub fn set_subheader_fields(&mut self, bytes: Vec<u8>) -> Result<(), RecordError> {
        if bytes.len() > 9999 {
            return Err(RecordError::Invariant(format!(
                "RES subheader fields of {} bytes exceed the 4-digit length field",
                bytes.len()
            )));
        }
        self.subheader_fields = bytes;
        Ok(())
    }

    /// Serialize the subheader, part type first.
    pub fn serialize(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(b"RE");
        out.extend_from_slice(self.type_id.bytes());
        out.extend_from_slice(self.type_version.bytes());
        out.extend_from_slice(self.classification.bytes());
        self.security.write_to(&mut out);
        out.extend_from_slice(format!("{:04}", self.subheader_fields.len()).as_bytes());
        out.extend_from_slice(&self.subheader_fields);
        Ok(out)
    }

    /// Parse a subheader from a buffer, returning it and the bytes
    /// consumed.
    pub fn parse(version: Version, buf: &[u8]) -> Result<(Self, usize), FormatError> {
        let mut cursor = FieldCursor::new(buf);
        let part = cursor.take(FieldKind::BcsA, 2, "RES part type")?;
        if part.bytes() != b"RE" {
            return Err(FormatError::BadPartType {
                expected: "RE",
                actual: part.as_str(),
            });
        }
        let type_id = cursor.take(FieldKind::BcsA, RESID_SZ, "RESID")?;
        let type_version = cursor.take(FieldKind::BcsN, RESVER_SZ, "RESVER")?;
        let classification = cursor.take(FieldKind::BcsA, RESCLAS_SZ, "RESCLAS")?;
        let security = SecurityGroup::parse(version, &mut cursor)?;
        let fields_len = cursor.take_count(RESSHL_SZ, "RESSHL")? as usize;
        let subheader_fields = cursor.take_bytes(fields_len, "RESSHF")?.to_vec();

        let subheader = Self {
            version,
            type_id,
            type_version,
            classification,
            security,
            subheader_fields,
        };
        Ok((subheader, cursor.pos()))
    }

    /// Name-keyed view of the fixed fields in serialization order.
    pub fn field_names(&self) -> Vec<(String, &Field)> {
        let mut fields: Vec<(String, &Field)> = vec![
            ("RESID".to_string(), &self.type_id),
            ("RESVER".to_string(), &self.type_version),
            ("RESCLAS".to_string(), &self.classification),
        ];
        for (name, field) in self.security.field_names() {
            fields.push((format!("RES{name}"), field));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_parse_roundtrip() {
        let mut original = ResSubheader::new(Version::Nitf21);
        original.type_id.set_string("RESERVED_THING").unwrap();
        original.set_subheader_fields(b"opaque".to_vec()).unwrap();

        let bytes = original.serialize().unwrap();
        let (parsed, consumed) = ResSubheader::parse(Version::Nitf21, &bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_oversize_fields_rejected() {
        let mut subheader = ResSubheader::new(Version::Nitf21);
        let result = subheader.set_subheader_fields(vec![0; 10_000]);
        assert!(matches!(result, Err(RecordError::Invariant(_))));
    }
}
