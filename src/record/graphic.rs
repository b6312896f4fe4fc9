//! Graphic segment subheader (part type "SY").

use crate::error::{FormatError, RecordError};
use crate::record::cursor::FieldCursor;
use crate::record::extensions::{parse_extension_section, write_extension_section, Extensions};
use crate::record::field::{Field, FieldKind};
use crate::record::security::SecurityGroup;
use crate::record::versions::Version;
use crate::tre::TreRegistry;

const SID_SZ: usize = 10;
const SNAME_SZ: usize = 20;
const SSCLAS_SZ: usize = 1;
const ENCRYP_SZ: usize = 1;
const SFMT_SZ: usize = 1;
const SSTRUCT_SZ: usize = 13;
const SDLVL_SZ: usize = 3;
const SALVL_SZ: usize = 3;
const SLOC_SZ: usize = 10;
const SBND1_SZ: usize = 10;
const SCOLOR_SZ: usize = 1;
const SBND2_SZ: usize = 10;
const SRES2_SZ: usize = 2;
const SXSHDL_SZ: usize = 5;
const SXSOFL_SZ: usize = 3;

/// The graphic segment subheader.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicSubheader {
    version: Version,
    pub graphic_id: Field,
    pub name: Field,
    pub classification: Field,
    pub security: SecurityGroup,
    pub encrypted: Field,
    /// Graphic format ("C" for CGM)
    pub format: Field,
    pub res1: Field,
    pub display_level: Field,
    pub attachment_level: Field,
    pub location: Field,
    pub bound1_location: Field,
    pub color: Field,
    pub bound2_location: Field,
    pub res2: Field,
    pub extended: Extensions,
    /// DES back-reference (1-based) for overflowed extended TREs
    pub extended_overflow: Field,
}

impl GraphicSubheader {
    /// A default subheader for the given version.
    pub fn new(version: Version) -> Self {
        let mut subheader = Self {
            version,
            graphic_id: Field::new(FieldKind::BcsA, SID_SZ),
            name: Field::new(FieldKind::BcsA, SNAME_SZ),
            classification: Field::new(FieldKind::BcsA, SSCLAS_SZ),
            security: SecurityGroup::new(version),
            encrypted: Field::new(FieldKind::BcsN, ENCRYP_SZ),
            format: Field::new(FieldKind::BcsA, SFMT_SZ),
            res1: Field::new(FieldKind::BcsN, SSTRUCT_SZ),
            display_level: Field::new(FieldKind::BcsN, SDLVL_SZ),
            attachment_level: Field::new(FieldKind::BcsN, SALVL_SZ),
            location: Field::new(FieldKind::BcsN, SLOC_SZ),
            bound1_location: Field::new(FieldKind::BcsN, SBND1_SZ),
            color: Field::new(FieldKind::BcsA, SCOLOR_SZ),
            bound2_location: Field::new(FieldKind::BcsN, SBND2_SZ),
            res2: Field::new(FieldKind::BcsN, SRES2_SZ),
            extended: Extensions::new(),
            extended_overflow: Field::new(FieldKind::BcsN, SXSOFL_SZ),
        };
        let _ = subheader.format.set_string("C");
        subheader
    }

    /// The version this subheader was built or parsed for.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Serialize the subheader, part type first.
    pub fn serialize(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(b"SY");
        out.extend_from_slice(self.graphic_id.bytes());
        out.extend_from_slice(self.name.bytes());
        out.extend_from_slice(self.classification.bytes());
        self.security.write_to(&mut out);
        out.extend_from_slice(self.encrypted.bytes());
        out.extend_from_slice(self.format.bytes());
        out.extend_from_slice(self.res1.bytes());
        out.extend_from_slice(self.display_level.bytes());
        out.extend_from_slice(self.attachment_level.bytes());
        out.extend_from_slice(self.location.bytes());
        out.extend_from_slice(self.bound1_location.bytes());
        out.extend_from_slice(self.color.bytes());
        out.extend_from_slice(self.bound2_location.bytes());
        out.extend_from_slice(self.res2.bytes());
        write_extension_section(&mut out, &self.extended, &self.extended_overflow, SXSHDL_SZ)?;
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
        let part = cursor.take(FieldKind::BcsA, 2, "graphic part type")?;
        if part.bytes() != b"SY" {
            return Err(FormatError::BadPartType {
                expected: "SY",
                actual: part.as_str(),
            });
        }
        let graphic_id = cursor.take(FieldKind::BcsA, SID_SZ, "SID")?;
        let name = cursor.take(FieldKind::BcsA, SNAME_SZ, "SNAME")?;
        let classification = cursor.take(FieldKind::BcsA, SSCLAS_SZ, "SSCLAS")?;
        let security = SecurityGroup::parse(version, &mut cursor)?;
        let encrypted = cursor.take(FieldKind::BcsN, ENCRYP_SZ, "ENCRYP")?;
        let format = cursor.take(FieldKind::BcsA, SFMT_SZ, "SFMT")?;
        let res1 = cursor.take(FieldKind::BcsN, SSTRUCT_SZ, "SSTRUCT")?;
        let display_level = cursor.take(FieldKind::BcsN, SDLVL_SZ, "SDLVL")?;
        let attachment_level = cursor.take(FieldKind::BcsN, SALVL_SZ, "SALVL")?;
        let location = cursor.take(FieldKind::BcsN, SLOC_SZ, "SLOC")?;
        let bound1_location = cursor.take(FieldKind::BcsN, SBND1_SZ, "SBND1")?;
        let color = cursor.take(FieldKind::BcsA, SCOLOR_SZ, "SCOLOR")?;
        let bound2_location = cursor.take(FieldKind::BcsN, SBND2_SZ, "SBND2")?;
        let res2 = cursor.take(FieldKind::BcsN, SRES2_SZ, "SRES2")?;
        let (extended, extended_overflow) =
            parse_extension_section(&mut cursor, registry, SXSHDL_SZ, SXSOFL_SZ, "SXSHD")?;

        let subheader = Self {
            version,
            graphic_id,
            name,
            classification,
            security,
            encrypted,
            format,
            res1,
            display_level,
            attachment_level,
            location,
            bound1_location,
            color,
            bound2_location,
            res2,
            extended,
            extended_overflow,
        };
        Ok((subheader, cursor.pos()))
    }

    /// Name-keyed view of the fixed fields in serialization order.
    pub fn field_names(&self) -> Vec<(String, &Field)> {
        let mut fields: Vec<(String, &Field)> = vec![
            ("SID".to_string(), &self.graphic_id),
            ("SNAME".to_string(), &self.name),
            ("SSCLAS".to_string(), &self.classification),
        ];
        for (name, field) in self.security.field_names() {
            fields.push((format!("S{name}"), field));
        }
        fields.push(("ENCRYP".to_string(), &self.encrypted));
        fields.push(("SFMT".to_string(), &self.format));
        fields.push(("SSTRUCT".to_string(), &self.res1));
        fields.push(("SDLVL".to_string(), &self.display_level));
        fields.push(("SALVL".to_string(), &self.attachment_level));
        fields.push(("SLOC".to_string(), &self.location));
        fields.push(("SBND1".to_string(), &self.bound1_location));
        fields.push(("SCOLOR".to_string(), &self.color));
        fields.push(("SBND2".to_string(), &self.bound2_location));
        fields.push(("SRES2".to_string(), &self.res2));
        fields
    }
}
