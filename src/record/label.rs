//! Label segment subheader (part type "LA", 2.0 only).
//!
//! The label segment class exists only in 2.0 files; 2.1 retired it and
//! its count field must read zero there.

use crate::error::{FormatError, RecordError};
use crate::record::cursor::FieldCursor;
use crate::record::extensions::{parse_extension_section, write_extension_section, Extensions};
use crate::record::field::{Field, FieldKind};
use crate::record::security::SecurityGroup;
use crate::record::versions::Version;
use crate::tre::TreRegistry;

const LID_SZ: usize = 10;
const LSCLAS_SZ: usize = 1;
const ENCRYP_SZ: usize = 1;
const LFS_SZ: usize = 1;
const LCW_SZ: usize = 2;
const LCH_SZ: usize = 2;
const LDLVL_SZ: usize = 3;
const LALVL_SZ: usize = 3;
const LLOC_SZ: usize = 10;
const LTC_SZ: usize = 3;
const LBC_SZ: usize = 3;
const LXSHDL_SZ: usize = 5;
const LXSOFL_SZ: usize = 3;

/// The label segment subheader.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSubheader {
    pub label_id: Field,
    pub classification: Field,
    pub security: SecurityGroup,
    pub encrypted: Field,
    pub font_style: Field,
    pub cell_width: Field,
    pub cell_height: Field,
    pub display_level: Field,
    pub attachment_level: Field,
    pub location: Field,
    pub text_color: Field,
    pub background_color: Field,
    pub extended: Extensions,
    /// DES back-reference (1-based) for overflowed extended TREs
    pub extended_overflow: Field,
}

impl LabelSubheader {
    /// A default subheader. Labels are always built against 2.0 tables.
    pub fn new() -> Self {
        Self {
            label_id: Field::new(FieldKind::BcsA, LID_SZ),
            classification: Field::new(FieldKind::BcsA, LSCLAS_SZ),
            security: SecurityGroup::new(Version::Nitf20),
            encrypted: Field::new(FieldKind::BcsN, ENCRYP_SZ),
            font_style: Field::new(FieldKind::BcsA, LFS_SZ),
            cell_width: Field::new(FieldKind::BcsN, LCW_SZ),
            cell_height: Field::new(FieldKind::BcsN, LCH_SZ),
            display_level: Field::new(FieldKind::BcsN, LDLVL_SZ),
            attachment_level: Field::new(FieldKind::BcsN, LALVL_SZ),
            location: Field::new(FieldKind::BcsN, LLOC_SZ),
            text_color: Field::new(FieldKind::Binary, LTC_SZ),
            background_color: Field::new(FieldKind::Binary, LBC_SZ),
            extended: Extensions::new(),
            extended_overflow: Field::new(FieldKind::BcsN, LXSOFL_SZ),
        }
    }

    /// Serialize the subheader, part type first.
    pub fn serialize(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(b"LA");
        out.extend_from_slice(self.label_id.bytes());
        out.extend_from_slice(self.classification.bytes());
        self.security.write_to(&mut out);
        out.extend_from_slice(self.encrypted.bytes());
        out.extend_from_slice(self.font_style.bytes());
        out.extend_from_slice(self.cell_width.bytes());
        out.extend_from_slice(self.cell_height.bytes());
        out.extend_from_slice(self.display_level.bytes());
        out.extend_from_slice(self.attachment_level.bytes());
        out.extend_from_slice(self.location.bytes());
        out.extend_from_slice(self.text_color.bytes());
        out.extend_from_slice(self.background_color.bytes());
        write_extension_section(&mut out, &self.extended, &self.extended_overflow, LXSHDL_SZ)?;
        Ok(out)
    }

    /// Parse a subheader from a buffer, returning it and the bytes
    /// consumed.
    pub fn parse(buf: &[u8], registry: &TreRegistry) -> Result<(Self, usize), FormatError> {
        let mut cursor = FieldCursor::new(buf);
        let part = cursor.take(FieldKind::BcsA, 2, "label part type")?;
        if part.bytes() != b"LA" {
            return Err(FormatError::BadPartType {
                expected: "LA",
                actual: part.as_str(),
            });
        }
        let label_id = cursor.take(FieldKind::BcsA, LID_SZ, "LID")?;
        let classification = cursor.take(FieldKind::BcsA, LSCLAS_SZ, "LSCLAS")?;
        let security = SecurityGroup::parse(Version::Nitf20, &mut cursor)?;
        let encrypted = cursor.take(FieldKind::BcsN, ENCRYP_SZ, "ENCRYP")?;
        let font_style = cursor.take(FieldKind::BcsA, LFS_SZ, "LFS")?;
        let cell_width = cursor.take(FieldKind::BcsN, LCW_SZ, "LCW")?;
        let cell_height = cursor.take(FieldKind::BcsN, LCH_SZ, "LCH")?;
        let display_level = cursor.take(FieldKind::BcsN, LDLVL_SZ, "LDLVL")?;
        let attachment_level = cursor.take(FieldKind::BcsN, LALVL_SZ, "LALVL")?;
        let location = cursor.take(FieldKind::BcsN, LLOC_SZ, "LLOC")?;
        let text_color = cursor.take(FieldKind::Binary, LTC_SZ, "LTC")?;
        let background_color = cursor.take(FieldKind::Binary, LBC_SZ, "LBC")?;
        let (extended, extended_overflow) =
            parse_extension_section(&mut cursor, registry, LXSHDL_SZ, LXSOFL_SZ, "LXSHD")?;

        let subheader = Self {
            label_id,
            classification,
            security,
            encrypted,
            font_style,
            cell_width,
            cell_height,
            display_level,
            attachment_level,
            location,
            text_color,
            background_color,
            extended,
            extended_overflow,
        };
        Ok((subheader, cursor.pos()))
    }

    /// Name-keyed view of the fixed fields in serialization order.
    pub fn field_names(&self) -> Vec<(String, &Field)> {
        let mut fields: Vec<(String, &Field)> = vec![
            ("LID".to_string(), &self.label_id),
            ("LSCLAS".to_string(), &self.classification),
        ];
        for (name, field) in self.security.field_names() {
            fields.push((format!("L{name}"), field));
        }
        fields.push(("ENCRYP".to_string(), &self.encrypted));
        fields.push(("LFS".to_string(), &self.font_style));
        fields.push(("LCW".to_string(), &self.cell_width));
        fields.push(("LCH".to_string(), &self.cell_height));
        fields.push(("LDLVL".to_string(), &self.display_level));
        fields.push(("LALVL".to_string(), &self.attachment_level));
        fields.push(("LLOC".to_string(), &self.location));
        fields.push(("LTC".to_string(), &self.text_color));
        fields.push(("LBC".to_string(), &self.background_color));
        fields
    }
}

impl Default for LabelSubheader {
    fn default() -> Self {
        Self::new()
    }
}
