//! Data extension segment subheader (part type "DE").
//!
//! Data extension segments carry arbitrary payloads: XML documents,
//! overflowed TREs, vendor data. The subheader may carry its own
//! user-defined fields (DESSHF), which are decoded through the TRE
//! registry when a handler matches the type id and carried raw otherwise.
//!
//! A DES whose type id names the overflow convention holds TREs that did
//! not fit in some other subheader's extension section; that subheader
//! records a 1-based back-reference to the DES in its overflow field.

use crate::error::{FormatError, RecordError};
use crate::record::cursor::FieldCursor;
use crate::record::field::{Field, FieldKind};
use crate::record::security::SecurityGroup;
use crate::record::versions::Version;
use crate::tre::{Tre, TreRegistry};

const DESID_SZ: usize = 25;
const DESVER_SZ: usize = 2;
const DESCLAS_SZ: usize = 1;
const DESOFLW_SZ: usize = 6;
const DESITEM_SZ: usize = 3;
const DESSHL_SZ: usize = 4;

/// Type id marking a 2.1 overflow DES.
const OVERFLOW_ID_21: &str = "TRE_OVERFLOW";

/// Type ids marking a 2.0 overflow DES.
const OVERFLOW_IDS_20: [&str; 2] = ["Registered Extensions", "Controlled Extensions"];

/// The data extension segment subheader.
#[derive(Debug, Clone, PartialEq)]
pub struct DesSubheader {
    version: Version,
    /// DESID: names the payload convention (e.g. "XML_DATA_CONTENT")
    pub type_id: Field,
    pub type_version: Field,
    pub classification: Field,
    pub security: SecurityGroup,
    /// For overflow segments: which header kind overflowed (UDHD, UDID,
    /// XHD, IXSHD, SXSHD, TXSHD)
    pub overflow_header_type: Field,
    /// For overflow segments: ordinal of the overflowed item
    pub overflowed_item: Field,
    /// User-defined subheader fields, stored without a tag prefix; their
    /// length is the subheader's own DESSHL field
    pub subheader_fields: Option<Tre>,
}

impl DesSubheader {
    /// A default subheader for the given version.
    pub fn new(version: Version) -> Self {
        Self {
            version,
            type_id: Field::new(FieldKind::BcsA, DESID_SZ),
            type_version: Field::new(FieldKind::BcsN, DESVER_SZ),
            classification: Field::new(FieldKind::BcsA, DESCLAS_SZ),
            security: SecurityGroup::new(version),
            overflow_header_type: Field::new(FieldKind::BcsA, DESOFLW_SZ),
            overflowed_item: Field::new(FieldKind::BcsN, DESITEM_SZ),
            subheader_fields: None,
        }
    }

    /// The version this subheader was built or parsed for.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether this segment is a TRE overflow container.
    pub fn is_tre_overflow(&self) -> bool {
        let id = self.type_id.as_str();
        match self.version {
            Version::Nitf21 => id == OVERFLOW_ID_21,
            Version::Nitf20 => OVERFLOW_IDS_20.contains(&id.as_str()),
        }
    }

    /// Install user-defined subheader fields from a registry-constructed
    /// TRE. The TRE's payload becomes the DESSHF bytes.
    pub fn set_subheader_fields(&mut self, tre: Tre) {
        self.subheader_fields = Some(tre);
    }

    /// Serialize the subheader, part type first.
    pub fn serialize(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(b"DE");
        out.extend_from_slice(self.type_id.bytes());
        out.extend_from_slice(self.type_version.bytes());
        out.extend_from_slice(self.classification.bytes());
        self.security.write_to(&mut out);
        if self.is_tre_overflow() {
            out.extend_from_slice(self.overflow_header_type.bytes());
            out.extend_from_slice(self.overflowed_item.bytes());
        }
        let payload = self
            .subheader_fields
            .as_ref()
            .map(Tre::payload_bytes)
            .unwrap_or_default();
        if payload.len() > 9999 {
            return Err(RecordError::Invariant(format!(
                "DES subheader fields of {} bytes exceed the 4-digit length field",
                payload.len()
            )));
        }
        out.extend_from_slice(format!("{:04}", payload.len()).as_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Parse a subheader from a buffer, returning it and the bytes
    /// consumed.
    pub fn parse(
        version: Version,
        buf: &[u8],
        registry: &TreRegistry,
    ) -> Result<(Self, usize), FormatError> {
        let mut cursor = FieldCursor::new(buf);
        let part = cursor.take(FieldKind::BcsA, 2, "DES part type")?;
        if part.bytes() != b"DE" {
            return Err(FormatError::BadPartType {
                expected: "DE",
                actual: part.as_str(),
            });
        }
        let type_id = cursor.take(FieldKind::BcsA, DESID_SZ, "DESID")?;
        let type_version = cursor.take(FieldKind::BcsN, DESVER_SZ, "DESVER")?;
        let classification = cursor.take(FieldKind::BcsA, DESCLAS_SZ, "DESCLAS")?;
        let security = SecurityGroup::parse(version, &mut cursor)?;

        let id = type_id.as_str();
        let is_overflow = match version {
            Version::Nitf21 => id == OVERFLOW_ID_21,
            Version::Nitf20 => OVERFLOW_IDS_20.contains(&id.as_str()),
        };
        let (overflow_header_type, overflowed_item) = if is_overflow {
            (
                cursor.take(FieldKind::BcsA, DESOFLW_SZ, "DESOFLW")?,
                cursor.take(FieldKind::BcsN, DESITEM_SZ, "DESITEM")?,
            )
        } else {
            (
                Field::new(FieldKind::BcsA, DESOFLW_SZ),
                Field::new(FieldKind::BcsN, DESITEM_SZ),
            )
        };

        let fields_len = cursor.take_count(DESSHL_SZ, "DESSHL")? as usize;
        let subheader_fields = if fields_len > 0 {
            let payload = cursor.take_bytes(fields_len, "DESSHF")?;
            // The handler tag is the type id, clipped to tag width
            let tag: String = id.chars().take(6).collect();
            Some(registry.parse_payload(&tag, payload))
        } else {
            None
        };

        let subheader = Self {
            version,
            type_id,
            type_version,
            classification,
            security,
            overflow_header_type,
            overflowed_item,
            subheader_fields,
        };
        Ok((subheader, cursor.pos()))
    }

    /// Name-keyed view of the fixed fields in serialization order.
    pub fn field_names(&self) -> Vec<(String, &Field)> {
        let mut fields: Vec<(String, &Field)> = vec![
            ("DESID".to_string(), &self.type_id),
            ("DESVER".to_string(), &self.type_version),
            ("DESCLAS".to_string(), &self.classification),
        ];
        for (name, field) in self.security.field_names() {
            fields.push((format!("DES{name}"), field));
        }
        if self.is_tre_overflow() {
            fields.push(("DESOFLW".to_string(), &self.overflow_header_type));
            fields.push(("DESITEM".to_string(), &self.overflowed_item));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_parse_roundtrip() {
        let mut original = DesSubheader::new(Version::Nitf21);
        original.type_id.set_string("XML_DATA_CONTENT").unwrap();
        original.type_version.set_uint(1).unwrap();

        let bytes = original.serialize().unwrap();
        let registry = TreRegistry::new();
        let (parsed, consumed) = DesSubheader::parse(Version::Nitf21, &bytes, &registry).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, original);
        assert!(!parsed.is_tre_overflow());
    }

    #[test]
    fn test_overflow_fields_conditional() {
        let mut overflow = DesSubheader::new(Version::Nitf21);
        overflow.type_id.set_string("TRE_OVERFLOW").unwrap();
        overflow.overflow_header_type.set_string("UDHD").unwrap();
        overflow.overflowed_item.set_uint(0).unwrap();
        assert!(overflow.is_tre_overflow());

        let bytes = overflow.serialize().unwrap();
        let plain = DesSubheader::new(Version::Nitf21).serialize().unwrap();
        assert_eq!(bytes.len(), plain.len() + DESOFLW_SZ + DESITEM_SZ);

        let registry = TreRegistry::new();
        let (parsed, _) = DesSubheader::parse(Version::Nitf21, &bytes, &registry).unwrap();
        assert!(parsed.is_tre_overflow());
        assert_eq!(parsed.overflow_header_type.as_str(), "UDHD");
    }

    #[test]
    fn test_20_overflow_names() {
        let mut overflow = DesSubheader::new(Version::Nitf20);
        overflow.type_id.set_string("Registered Extensions").unwrap();
        assert!(overflow.is_tre_overflow());

        let mut not_overflow = DesSubheader::new(Version::Nitf20);
        not_overflow.type_id.set_string("TRE_OVERFLOW").unwrap();
        assert!(!not_overflow.is_tre_overflow());
    }

    #[test]
    fn test_subheader_fields_carried_raw_without_handler() {
        let mut original = DesSubheader::new(Version::Nitf21);
        original.type_id.set_string("SENSRB_DES").unwrap();
        original.set_subheader_fields(Tre::raw("SENSRB", b"user fields"));

        let bytes = original.serialize().unwrap();
        let registry = TreRegistry::new();
        let (parsed, _) = DesSubheader::parse(Version::Nitf21, &bytes, &registry).unwrap();
        let fields = parsed.subheader_fields.as_ref().unwrap();
        assert!(fields.is_raw());
        assert_eq!(fields.payload_bytes(), b"user fields");
        // Re-serialization preserves the payload verbatim
        assert_eq!(parsed.serialize().unwrap(), bytes);
    }
}
