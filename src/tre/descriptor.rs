//! Tagged-record-extension layout descriptors.
//!
//! A descriptor declares how a tag's payload decomposes into named
//! sub-fields. Descriptors are plain data (loaded from JSON files in the
//! plugin directory, or built in code) and may declare three row kinds:
//!
//! - `field`: a fixed-width sub-field
//! - `loop`: a group repeated N times, where N is the value of a prior
//!   numeric sub-field
//! - `cond`: a group present only when a prior sub-field equals a value
//!
//! Looped sub-fields get indexed names (`LEVEL[0]`, `LEVEL[1]`, ...), so a
//! fully expanded layout is a flat ordered list of `(name, kind, length)`
//! rows.
//!
//! # Example descriptor file
//!
//! ```json
//! {
//!   "tag": "BANDSA",
//!   "fields": [
//!     { "field": { "name": "ROW_SPACING", "kind": "A", "len": 7 } },
//!     { "field": { "name": "BANDCOUNT", "kind": "N", "len": 4 } },
//!     { "loop": { "count": "BANDCOUNT", "fields": [
//!       { "field": { "name": "BANDPEAK", "kind": "A", "len": 5 } }
//!     ] } }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TreError;
use crate::record::{Field, FieldKind};

// =============================================================================
// Descriptor model
// =============================================================================

/// Sub-field kind as written in descriptor files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorKind {
    /// BCS-A text
    A,
    /// BCS-N numeric
    N,
    /// Opaque binary
    B,
}

impl DescriptorKind {
    /// The field kind this descriptor kind produces.
    pub const fn field_kind(self) -> FieldKind {
        match self {
            DescriptorKind::A => FieldKind::BcsA,
            DescriptorKind::N => FieldKind::BcsN,
            DescriptorKind::B => FieldKind::Binary,
        }
    }
}

/// A fixed-width sub-field row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Sub-field name, unique within the descriptor
    pub name: String,
    /// Value kind
    pub kind: DescriptorKind,
    /// Declared length in bytes
    pub len: usize,
    /// Initial content for newly constructed extensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A repeated group of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopDef {
    /// Name of the prior numeric sub-field holding the iteration count
    pub count: String,
    /// Rows repeated per iteration
    pub fields: Vec<FieldSpec>,
}

/// A conditional group of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondDef {
    /// Name of the prior sub-field to test
    pub field: String,
    /// Trimmed value the field must equal for the group to be present
    pub equals: String,
    /// Rows present when the condition holds
    pub fields: Vec<FieldSpec>,
}

/// One row of a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSpec {
    Field(FieldDef),
    Loop(LoopDef),
    Cond(CondDef),
}

/// A complete layout descriptor for one tag (and optionally one variant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreDescriptor {
    /// The 6-character tag this descriptor handles
    pub tag: String,
    /// Optional variant id, for tags with several layouts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Ordered layout rows
    pub fields: Vec<FieldSpec>,
}

impl TreDescriptor {
    /// Parse a descriptor from JSON.
    pub fn from_json(path: &str, json: &str) -> Result<Self, TreError> {
        let descriptor: TreDescriptor =
            serde_json::from_str(json).map_err(|err| TreError::BadDescriptor {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        if descriptor.tag.is_empty() || descriptor.tag.len() > 6 {
            return Err(TreError::BadDescriptor {
                path: path.to_string(),
                message: format!("tag {:?} is not 1-6 characters", descriptor.tag),
            });
        }
        Ok(descriptor)
    }
}

// =============================================================================
// Layout expansion
// =============================================================================

/// A fully expanded layout row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExpandedField {
    pub name: String,
    pub kind: FieldKind,
    pub len: usize,
    pub default: Option<String>,
}

/// Expand a descriptor into its flat row list against a set of known
/// values.
///
/// `lookup` resolves a sub-field name to its current content (used for
/// loop counts and conditions); names expanded earlier in the same pass
/// are resolved before falling back to `lookup`, so a loop whose count
/// field precedes it always sees the in-progress value.
pub(crate) fn expand_layout(
    descriptor: &TreDescriptor,
    lookup: &dyn Fn(&str) -> Option<Field>,
) -> Result<Vec<ExpandedField>, TreError> {
    let mut rows = Vec::new();
    expand_specs(descriptor, &descriptor.fields, "", lookup, &mut rows)?;
    Ok(rows)
}

fn expand_specs(
    descriptor: &TreDescriptor,
    specs: &[FieldSpec],
    suffix: &str,
    lookup: &dyn Fn(&str) -> Option<Field>,
    rows: &mut Vec<ExpandedField>,
) -> Result<(), TreError> {
    for spec in specs {
        match spec {
            FieldSpec::Field(def) => {
                rows.push(ExpandedField {
                    name: format!("{}{}", def.name, suffix),
                    kind: def.kind.field_kind(),
                    len: def.len,
                    default: def.default.clone(),
                });
            }
            FieldSpec::Loop(def) => {
                let count_name = format!("{}{}", def.count, suffix);
                let count = resolve(&count_name, rows, lookup)
                    .ok_or_else(|| TreError::BadLoopCount {
                        tag: descriptor.tag.clone(),
                        field: count_name.clone(),
                    })?
                    .as_u64()
                    .map_err(|_| TreError::BadLoopCount {
                        tag: descriptor.tag.clone(),
                        field: count_name.clone(),
                    })?;
                for index in 0..count {
                    let nested = format!("{}[{}]", suffix, index);
                    expand_specs(descriptor, &def.fields, &nested, lookup, rows)?;
                }
            }
            FieldSpec::Cond(def) => {
                let field_name = format!("{}{}", def.field, suffix);
                let value = resolve(&field_name, rows, lookup).ok_or_else(|| {
                    TreError::BadLoopCount {
                        tag: descriptor.tag.clone(),
                        field: field_name.clone(),
                    }
                })?;
                if value.as_str().trim() == def.equals {
                    expand_specs(descriptor, &def.fields, suffix, lookup, rows)?;
                }
            }
        }
    }
    Ok(())
}

/// Resolve a name against rows expanded so far, then the caller's values.
fn resolve(
    name: &str,
    rows: &[ExpandedField],
    lookup: &dyn Fn(&str) -> Option<Field>,
) -> Option<Field> {
    if let Some(value) = lookup(name) {
        return Some(value);
    }
    // A row with no caller value resolves to its default
    rows.iter().find(|row| row.name == name).map(|row| {
        let mut field = Field::new(row.kind, row.len);
        if let Some(ref default) = row.default {
            // Defaults come from the descriptor author; an oversize
            // default is a descriptor bug and collapses to padding
            let _ = field.set_string(default);
        }
        field
    })
}

// =============================================================================
// Tests
// =============================================================================
