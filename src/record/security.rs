//! Security group shared by every header and subheader.
//!
//! Each header carries a classification field followed by a security
//! group. The group layout is version-specific: 2.1 uses the fifteen-field
//! layout with explicit declassification fields, 2.0 uses the older
//! seven-field layout with a downgrade code and a conditional downgrade
//! event. The two layouts are parsed and serialized by separate routines
//! and never by patching field widths.

use crate::error::FormatError;
use crate::record::cursor::FieldCursor;
use crate::record::field::{Field, FieldKind};
use crate::record::versions::Version;

// =============================================================================
// 2.1 layout
// =============================================================================

/// 2.1 field widths, in declared order.
const CLSY_SZ: usize = 2;
const CODE_SZ: usize = 11;
const CTLH_SZ: usize = 2;
const REL_SZ: usize = 20;
const DCTP_SZ: usize = 2;
const DCDT_SZ: usize = 8;
const DCXM_SZ: usize = 4;
const DG_SZ: usize = 1;
const DGDT_SZ: usize = 8;
const CLTX_SZ: usize = 43;
const CATP_SZ: usize = 1;
const CAUT_SZ: usize = 40;
const CRSN_SZ: usize = 1;
const SRDT_SZ: usize = 8;
const CTLN_SZ: usize = 15;

/// Serialized size of the 2.1 security group.
pub const SECURITY_21_LEN: usize = CLSY_SZ
    + CODE_SZ
    + CTLH_SZ
    + REL_SZ
    + DCTP_SZ
    + DCDT_SZ
    + DCXM_SZ
    + DG_SZ
    + DGDT_SZ
    + CLTX_SZ
    + CATP_SZ
    + CAUT_SZ
    + CRSN_SZ
    + SRDT_SZ
    + CTLN_SZ;

/// The fifteen-field 2.1 security group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityNitf21 {
    pub classification_system: Field,
    pub codewords: Field,
    pub control_and_handling: Field,
    pub releasing_instructions: Field,
    pub declassification_type: Field,
    pub declassification_date: Field,
    pub declassification_exemption: Field,
    pub downgrade: Field,
    pub downgrade_date: Field,
    pub classification_text: Field,
    pub classification_authority_type: Field,
    pub classification_authority: Field,
    pub classification_reason: Field,
    pub security_source_date: Field,
    pub security_control_number: Field,
}

impl SecurityNitf21 {
    fn new() -> Self {
        Self {
            classification_system: Field::new(FieldKind::BcsA, CLSY_SZ),
            codewords: Field::new(FieldKind::BcsA, CODE_SZ),
            control_and_handling: Field::new(FieldKind::BcsA, CTLH_SZ),
            releasing_instructions: Field::new(FieldKind::BcsA, REL_SZ),
            declassification_type: Field::new(FieldKind::BcsA, DCTP_SZ),
            declassification_date: Field::new(FieldKind::BcsA, DCDT_SZ),
            declassification_exemption: Field::new(FieldKind::BcsA, DCXM_SZ),
            downgrade: Field::new(FieldKind::BcsA, DG_SZ),
            downgrade_date: Field::new(FieldKind::BcsA, DGDT_SZ),
            classification_text: Field::new(FieldKind::BcsA, CLTX_SZ),
            classification_authority_type: Field::new(FieldKind::BcsA, CATP_SZ),
            classification_authority: Field::new(FieldKind::BcsA, CAUT_SZ),
            classification_reason: Field::new(FieldKind::BcsA, CRSN_SZ),
            security_source_date: Field::new(FieldKind::BcsA, SRDT_SZ),
            security_control_number: Field::new(FieldKind::BcsA, CTLN_SZ),
        }
    }

    fn parse(cursor: &mut FieldCursor<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            classification_system: cursor.take(FieldKind::BcsA, CLSY_SZ, "security CLSY")?,
            codewords: cursor.take(FieldKind::BcsA, CODE_SZ, "security CODE")?,
            control_and_handling: cursor.take(FieldKind::BcsA, CTLH_SZ, "security CTLH")?,
            releasing_instructions: cursor.take(FieldKind::BcsA, REL_SZ, "security REL")?,
            declassification_type: cursor.take(FieldKind::BcsA, DCTP_SZ, "security DCTP")?,
            declassification_date: cursor.take(FieldKind::BcsA, DCDT_SZ, "security DCDT")?,
            declassification_exemption: cursor.take(FieldKind::BcsA, DCXM_SZ, "security DCXM")?,
            downgrade: cursor.take(FieldKind::BcsA, DG_SZ, "security DG")?,
            downgrade_date: cursor.take(FieldKind::BcsA, DGDT_SZ, "security DGDT")?,
            classification_text: cursor.take(FieldKind::BcsA, CLTX_SZ, "security CLTX")?,
            classification_authority_type: cursor.take(FieldKind::BcsA, CATP_SZ, "security CATP")?,
            classification_authority: cursor.take(FieldKind::BcsA, CAUT_SZ, "security CAUT")?,
            classification_reason: cursor.take(FieldKind::BcsA, CRSN_SZ, "security CRSN")?,
            security_source_date: cursor.take(FieldKind::BcsA, SRDT_SZ, "security SRDT")?,
            security_control_number: cursor.take(FieldKind::BcsA, CTLN_SZ, "security CTLN")?,
        })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        for (_, field) in self.field_names() {
            out.extend_from_slice(field.bytes());
        }
    }

    /// Name-keyed view of the fields in serialization order.
    pub fn field_names(&self) -> Vec<(&'static str, &Field)> {
        vec![
            ("CLSY", &self.classification_system),
            ("CODE", &self.codewords),
            ("CTLH", &self.control_and_handling),
            ("REL", &self.releasing_instructions),
            ("DCTP", &self.declassification_type),
            ("DCDT", &self.declassification_date),
            ("DCXM", &self.declassification_exemption),
            ("DG", &self.downgrade),
            ("DGDT", &self.downgrade_date),
            ("CLTX", &self.classification_text),
            ("CATP", &self.classification_authority_type),
            ("CAUT", &self.classification_authority),
            ("CRSN", &self.classification_reason),
            ("SRDT", &self.security_source_date),
            ("CTLN", &self.security_control_number),
        ]
    }
}

// =============================================================================
// 2.0 layout
// =============================================================================

const CODE_20_SZ: usize = 40;
const CTLH_20_SZ: usize = 40;
const REL_20_SZ: usize = 40;
const CAUT_20_SZ: usize = 20;
const CTLN_20_SZ: usize = 20;
const DWNG_20_SZ: usize = 6;
const DEVT_20_SZ: usize = 40;

/// Downgrade code that makes the downgrade event field present.
const DOWNGRADE_EVENT_CODE: &str = "999998";

/// The seven-field 2.0 security group.
///
/// The downgrade event is serialized only when the downgrade code is
/// `999998`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityNitf20 {
    pub codewords: Field,
    pub control_and_handling: Field,
    pub releasing_instructions: Field,
    pub classification_authority: Field,
    pub security_control_number: Field,
    pub downgrade: Field,
    pub downgrade_event: Field,
}

impl SecurityNitf20 {
    fn new() -> Self {
        Self {
            codewords: Field::new(FieldKind::BcsA, CODE_20_SZ),
            control_and_handling: Field::new(FieldKind::BcsA, CTLH_20_SZ),
            releasing_instructions: Field::new(FieldKind::BcsA, REL_20_SZ),
            classification_authority: Field::new(FieldKind::BcsA, CAUT_20_SZ),
            security_control_number: Field::new(FieldKind::BcsA, CTLN_20_SZ),
            downgrade: Field::new(FieldKind::BcsA, DWNG_20_SZ),
            downgrade_event: Field::new(FieldKind::BcsA, DEVT_20_SZ),
        }
    }

    fn parse(cursor: &mut FieldCursor<'_>) -> Result<Self, FormatError> {
        let codewords = cursor.take(FieldKind::BcsA, CODE_20_SZ, "security CODE")?;
        let control_and_handling = cursor.take(FieldKind::BcsA, CTLH_20_SZ, "security CTLH")?;
        let releasing_instructions = cursor.take(FieldKind::BcsA, REL_20_SZ, "security REL")?;
        let classification_authority = cursor.take(FieldKind::BcsA, CAUT_20_SZ, "security CAUT")?;
        let security_control_number = cursor.take(FieldKind::BcsA, CTLN_20_SZ, "security CTLN")?;
        let downgrade = cursor.take(FieldKind::BcsA, DWNG_20_SZ, "security DWNG")?;

        let downgrade_event = if downgrade.as_str() == DOWNGRADE_EVENT_CODE {
            cursor.take(FieldKind::BcsA, DEVT_20_SZ, "security DEVT")?
        } else {
            Field::new(FieldKind::BcsA, DEVT_20_SZ)
        };

        Ok(Self {
            codewords,
            control_and_handling,
            releasing_instructions,
            classification_authority,
            security_control_number,
            downgrade,
            downgrade_event,
        })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.codewords.bytes());
        out.extend_from_slice(self.control_and_handling.bytes());
        out.extend_from_slice(self.releasing_instructions.bytes());
        out.extend_from_slice(self.classification_authority.bytes());
        out.extend_from_slice(self.security_control_number.bytes());
        out.extend_from_slice(self.downgrade.bytes());
        if self.has_downgrade_event() {
            out.extend_from_slice(self.downgrade_event.bytes());
        }
    }

    fn byte_len(&self) -> usize {
        let base =
            CODE_20_SZ + CTLH_20_SZ + REL_20_SZ + CAUT_20_SZ + CTLN_20_SZ + DWNG_20_SZ;
        if self.has_downgrade_event() {
            base + DEVT_20_SZ
        } else {
            base
        }
    }

    /// Whether the conditional downgrade event field is present.
    pub fn has_downgrade_event(&self) -> bool {
        self.downgrade.as_str() == DOWNGRADE_EVENT_CODE
    }

    /// Name-keyed view of the fields in serialization order.
    pub fn field_names(&self) -> Vec<(&'static str, &Field)> {
        let mut fields = vec![
            ("CODE", &self.codewords),
            ("CTLH", &self.control_and_handling),
            ("REL", &self.releasing_instructions),
            ("CAUT", &self.classification_authority),
            ("CTLN", &self.security_control_number),
            ("DWNG", &self.downgrade),
        ];
        if self.has_downgrade_event() {
            fields.push(("DEVT", &self.downgrade_event));
        }
        fields
    }
}

// =============================================================================
// SecurityGroup
// =============================================================================

/// A version-tagged security group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityGroup {
    Nitf21(SecurityNitf21),
    Nitf20(SecurityNitf20),
}

impl SecurityGroup {
    /// Create an empty group for the given version.
    pub fn new(version: Version) -> Self {
        match version {
            Version::Nitf21 => SecurityGroup::Nitf21(SecurityNitf21::new()),
            Version::Nitf20 => SecurityGroup::Nitf20(SecurityNitf20::new()),
        }
    }

    /// Parse a group from the cursor using the version's layout.
    pub(crate) fn parse(
        version: Version,
        cursor: &mut FieldCursor<'_>,
    ) -> Result<Self, FormatError> {
        match version {
            Version::Nitf21 => Ok(SecurityGroup::Nitf21(SecurityNitf21::parse(cursor)?)),
            Version::Nitf20 => Ok(SecurityGroup::Nitf20(SecurityNitf20::parse(cursor)?)),
        }
    }

    /// Append the serialized group to `out`.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            SecurityGroup::Nitf21(group) => group.write_to(out),
            SecurityGroup::Nitf20(group) => group.write_to(out),
        }
    }

    /// Serialized size in bytes. Constant for 2.1; depends on the
    /// downgrade code for 2.0.
    pub fn byte_len(&self) -> usize {
        match self {
            SecurityGroup::Nitf21(_) => SECURITY_21_LEN,
            SecurityGroup::Nitf20(group) => group.byte_len(),
        }
    }

    /// The version this group was built for.
    pub fn version(&self) -> Version {
        match self {
            SecurityGroup::Nitf21(_) => Version::Nitf21,
            SecurityGroup::Nitf20(_) => Version::Nitf20,
        }
    }

    /// Name-keyed view of the fields in serialization order, for dumps.
    pub fn field_names(&self) -> Vec<(&'static str, &Field)> {
        match self {
            SecurityGroup::Nitf21(group) => group.field_names(),
            SecurityGroup::Nitf20(group) => group.field_names(),
        }
    }

    /// The 2.1 group, if this is one.
    pub fn as_nitf21(&self) -> Option<&SecurityNitf21> {
        match self {
            SecurityGroup::Nitf21(group) => Some(group),
            SecurityGroup::Nitf20(_) => None,
        }
    }

    /// Mutable access to the 2.1 group, if this is one.
    pub fn as_nitf21_mut(&mut self) -> Option<&mut SecurityNitf21> {
        match self {
            SecurityGroup::Nitf21(group) => Some(group),
            SecurityGroup::Nitf20(_) => None,
        }
    }

    /// The 2.0 group, if this is one.
    pub fn as_nitf20(&self) -> Option<&SecurityNitf20> {
        match self {
            SecurityGroup::Nitf20(group) => Some(group),
            SecurityGroup::Nitf21(_) => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
