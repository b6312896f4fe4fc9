//! Text segment subheader (part type "TE").

use crate::error::{FormatError, RecordError};
use crate::record::cursor::FieldCursor;
use crate::record::extensions::{parse_extension_section, write_extension_section, Extensions};
use crate::record::field::{Field, FieldKind};
use crate::record::security::SecurityGroup;
use crate::record::versions::Version;
use crate::tre::TreRegistry;

/// TEXTID width: 2.1 shortened the field and added an attachment level.
const TEXTID_21_SZ: usize = 7;
const TEXTID_20_SZ: usize = 10;
const TXTALVL_SZ: usize = 3;
const TXTDT_SZ: usize = 14;
const TXTITL_SZ: usize = 80;
const TSCLAS_SZ: usize = 1;
const ENCRYP_SZ: usize = 1;
const TXTFMT_SZ: usize = 3;
const TXSHDL_SZ: usize = 5;
const TXSOFL_SZ: usize = 3;

/// The text segment subheader.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSubheader {
    version: Version,
    pub text_id: Field,
    /// Attachment level; serialized in 2.1 only
    pub attachment_level: Field,
    pub date_time: Field,
    pub title: Field,
    pub classification: Field,
    pub security: SecurityGroup,
    pub encrypted: Field,
    pub format: Field,
    pub extended: Extensions,
    /// DES back-reference (1-based) for overflowed extended TREs
    pub extended_overflow: Field,
}

impl TextSubheader {
    /// A default subheader for the given version.
    pub fn new(version: Version) -> Self {
        let text_id_len = match version {
            Version::Nitf21 => TEXTID_21_SZ,
            Version::Nitf20 => TEXTID_20_SZ,
        };
        Self {
            version,
            text_id: Field::new(FieldKind::BcsA, text_id_len),
            attachment_level: Field::new(FieldKind::BcsN, TXTALVL_SZ),
            date_time: Field::new(FieldKind::BcsA, TXTDT_SZ),
            title: Field::new(FieldKind::BcsA, TXTITL_SZ),
            classification: Field::new(FieldKind::BcsA, TSCLAS_SZ),
            security: SecurityGroup::new(version),
            encrypted: Field::new(FieldKind::BcsN, ENCRYP_SZ),
            format: Field::new(FieldKind::BcsA, TXTFMT_SZ),
            extended: Extensions::new(),
            extended_overflow: Field::new(FieldKind::BcsN, TXSOFL_SZ),
        }
    }

    /// The version this subheader was built or parsed for.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Serialize the subheader, part type first.
    pub fn serialize(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(b"TE");
        out.extend_from_slice(self.text_id.bytes());
        if self.version == Version::Nitf21 {
            out.extend_from_slice(self.attachment_level.bytes());
        }
        out.extend_from_slice(self.date_time.bytes());
        out.extend_from_slice(self.title.bytes());
        out.extend_from_slice(self.classification.bytes());
        self.security.write_to(&mut out);
        out.extend_from_slice(self.encrypted.bytes());
        out.extend_from_slice(self.format.bytes());
        write_extension_section(&mut out, &self.extended, &self.extended_overflow, TXSHDL_SZ)?;
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
        let part = cursor.take(FieldKind::BcsA, 2, "text part type")?;
        if part.bytes() != b"TE" {
            return Err(FormatError::BadPartType {
                expected: "TE",
                actual: part.as_str(),
            });
        }
        let (text_id, attachment_level) = match version {
            Version::Nitf21 => (
                cursor.take(FieldKind::BcsA, TEXTID_21_SZ, "TEXTID")?,
                cursor.take(FieldKind::BcsN, TXTALVL_SZ, "TXTALVL")?,
            ),
            Version::Nitf20 => (
                cursor.take(FieldKind::BcsA, TEXTID_20_SZ, "TEXTID")?,
                Field::new(FieldKind::BcsN, TXTALVL_SZ),
            ),
        };
        let date_time = cursor.take(FieldKind::BcsA, TXTDT_SZ, "TXTDT")?;
        let title = cursor.take(FieldKind::BcsA, TXTITL_SZ, "TXTITL")?;
        let classification = cursor.take(FieldKind::BcsA, TSCLAS_SZ, "TSCLAS")?;
        let security = SecurityGroup::parse(version, &mut cursor)?;
        let encrypted = cursor.take(FieldKind::BcsN, ENCRYP_SZ, "ENCRYP")?;
        let format = cursor.take(FieldKind::BcsA, TXTFMT_SZ, "TXTFMT")?;
        let (extended, extended_overflow) =
            parse_extension_section(&mut cursor, registry, TXSHDL_SZ, TXSOFL_SZ, "TXSHD")?;

        let subheader = Self {
            version,
            text_id,
            attachment_level,
            date_time,
            title,
            classification,
            security,
            encrypted,
            format,
            extended,
            extended_overflow,
        };
        Ok((subheader, cursor.pos()))
    }

    /// Name-keyed view of the fixed fields in serialization order.
    pub fn field_names(&self) -> Vec<(String, &Field)> {
        let mut fields: Vec<(String, &Field)> =
            vec![("TEXTID".to_string(), &self.text_id)];
        if self.version == Version::Nitf21 {
            fields.push(("TXTALVL".to_string(), &self.attachment_level));
        }
        fields.push(("TXTDT".to_string(), &self.date_time));
        fields.push(("TXTITL".to_string(), &self.title));
        fields.push(("TSCLAS".to_string(), &self.classification));
        for (name, field) in self.security.field_names() {
            fields.push((format!("T{name}"), field));
        }
        fields.push(("ENCRYP".to_string(), &self.encrypted));
        fields.push(("TXTFMT".to_string(), &self.format));
        fields
    }
}
