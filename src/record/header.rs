//! File header.
//!
//! The file header opens every file: a fixed field run, then the count
//! and length table for every segment class, then two optional TRE
//! sections. The count fields and the length table are derived from the
//! record's segment lists at serialization time: serialization writes
//! zero placeholders for every length (FL, HL, LISH/LI and friends) and
//! reports their byte offsets so the writer's back-fill pass can rewrite
//! them once the real values are known.

use crate::error::{FormatError, RecordError};
use crate::record::cursor::HandleCursor;
use crate::record::extensions::{write_extension_section, Extensions};
use crate::record::field::{Field, FieldKind};
use crate::record::security::SecurityGroup;
use crate::record::versions::Version;
use crate::record::SegmentKind;
use crate::tre::TreRegistry;

// =============================================================================
// Field widths
// =============================================================================

const FHDR_SZ: usize = 4;
const FVER_SZ: usize = 5;
const CLEVEL_SZ: usize = 2;
const STYPE_SZ: usize = 4;
const OSTAID_SZ: usize = 10;
const FDT_SZ: usize = 14;
const FTITLE_SZ: usize = 80;
const FSCLAS_SZ: usize = 1;
const FSCOP_SZ: usize = 5;
const FSCPYS_SZ: usize = 5;
const ENCRYP_SZ: usize = 1;
const FBKGC_SZ: usize = 3;
const ONAME_21_SZ: usize = 24;
const ONAME_20_SZ: usize = 27;
const OPHONE_SZ: usize = 18;
pub(crate) const FL_SZ: usize = 12;
pub(crate) const HL_SZ: usize = 6;
const NUM_SEGMENTS_SZ: usize = 3;
const UDHDL_SZ: usize = 5;
const UDHOFL_SZ: usize = 3;
const XHDL_SZ: usize = 5;
const XHDLOFL_SZ: usize = 3;

// =============================================================================
// FileHeader
// =============================================================================

/// The file header's stored fields.
///
/// Length and count fields (FL, HL, NUMI..NUMRES, the LISH/LI table) are
/// not stored here: they derive from the record's segment lists and from
/// the write itself.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    version: Version,
    pub compliance_level: Field,
    pub system_type: Field,
    pub origin_station_id: Field,
    pub date_time: Field,
    pub title: Field,
    pub classification: Field,
    pub security: SecurityGroup,
    pub copy_number: Field,
    pub num_copies: Field,
    pub encrypted: Field,
    /// Background color; 2.1 only (2.0 folds these bytes into ONAME)
    pub background_color: Field,
    pub originator_name: Field,
    pub originator_phone: Field,
    pub user_defined: Extensions,
    /// DES back-reference (1-based) for overflowed user-defined TREs
    pub user_defined_overflow: Field,
    pub extended: Extensions,
    /// DES back-reference (1-based) for overflowed extended TREs
    pub extended_overflow: Field,
}

impl FileHeader {
    /// A default header for the given version.
    pub fn new(version: Version) -> Self {
        let oname_len = match version {
            Version::Nitf21 => ONAME_21_SZ,
            Version::Nitf20 => ONAME_20_SZ,
        };
        let mut header = Self {
            version,
            compliance_level: Field::new(FieldKind::BcsN, CLEVEL_SZ),
            system_type: Field::new(FieldKind::BcsA, STYPE_SZ),
            origin_station_id: Field::new(FieldKind::BcsA, OSTAID_SZ),
            date_time: Field::new(FieldKind::BcsA, FDT_SZ),
            title: Field::new(FieldKind::BcsA, FTITLE_SZ),
            classification: Field::new(FieldKind::BcsA, FSCLAS_SZ),
            security: SecurityGroup::new(version),
            copy_number: Field::new(FieldKind::BcsN, FSCOP_SZ),
            num_copies: Field::new(FieldKind::BcsN, FSCPYS_SZ),
            encrypted: Field::new(FieldKind::BcsN, ENCRYP_SZ),
            background_color: Field::new(FieldKind::Binary, FBKGC_SZ),
            originator_name: Field::new(FieldKind::BcsA, oname_len),
            originator_phone: Field::new(FieldKind::BcsA, OPHONE_SZ),
            user_defined: Extensions::new(),
            user_defined_overflow: Field::new(FieldKind::BcsN, UDHOFL_SZ),
            extended: Extensions::new(),
            extended_overflow: Field::new(FieldKind::BcsN, XHDLOFL_SZ),
        };
        let _ = header.system_type.set_string("BF01");
        let _ = header.classification.set_string("U");
        header
    }

    /// The version this header was built or parsed for.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Serialize the header for the given per-class segment counts
    /// (canonical order), writing zero placeholders for every length
    /// field and reporting their offsets.
    pub(crate) fn serialize(
        &self,
        segment_counts: [(SegmentKind, usize); 6],
    ) -> Result<(Vec<u8>, HeaderOffsets), RecordError> {
        let mut out = Vec::with_capacity(512);
        out.extend_from_slice(self.version.file_header_id().as_bytes());
        out.extend_from_slice(self.version.file_version().as_bytes());

        let clevel = out.len();
        out.extend_from_slice(self.compliance_level.bytes());
        out.extend_from_slice(self.system_type.bytes());
        out.extend_from_slice(self.origin_station_id.bytes());
        out.extend_from_slice(self.date_time.bytes());
        out.extend_from_slice(self.title.bytes());
        out.extend_from_slice(self.classification.bytes());
        self.security.write_to(&mut out);
        out.extend_from_slice(self.copy_number.bytes());
        out.extend_from_slice(self.num_copies.bytes());
        out.extend_from_slice(self.encrypted.bytes());
        if self.version == Version::Nitf21 {
            out.extend_from_slice(self.background_color.bytes());
        }
        out.extend_from_slice(self.originator_name.bytes());
        out.extend_from_slice(self.originator_phone.bytes());

        let file_length = out.len();
        out.extend_from_slice("0".repeat(FL_SZ).as_bytes());
        let header_length = out.len();
        out.extend_from_slice("0".repeat(HL_SZ).as_bytes());

        let mut segment_lengths = Vec::new();
        for (kind, count) in segment_counts {
            if kind == SegmentKind::Label && !self.version.supports_labels() {
                // 2.1 keeps the count field but it must be zero
                out.extend_from_slice("0".repeat(NUM_SEGMENTS_SZ).as_bytes());
                continue;
            }
            out.extend_from_slice(
                format!("{:0width$}", count, width = NUM_SEGMENTS_SZ).as_bytes(),
            );
            for _ in 0..count {
                let lish = out.len();
                out.extend_from_slice("0".repeat(kind.subheader_length_width()).as_bytes());
                let li = out.len();
                out.extend_from_slice("0".repeat(kind.data_length_width()).as_bytes());
                segment_lengths.push(SegmentLengthOffsets {
                    kind,
                    subheader_length: lish,
                    data_length: li,
                });
            }
        }

        write_extension_section(
            &mut out,
            &self.user_defined,
            &self.user_defined_overflow,
            UDHDL_SZ,
        )?;
        write_extension_section(&mut out, &self.extended, &self.extended_overflow, XHDL_SZ)?;

        let offsets = HeaderOffsets {
            clevel,
            file_length,
            header_length,
            segment_lengths,
        };
        Ok((out, offsets))
    }

    /// Parse the header from the start of a handle.
    ///
    /// The version signature must already have been consumed. Returns
    /// the header plus the declared length table, which drives the rest
    /// of the parse.
    pub(crate) fn parse(
        version: Version,
        cursor: &mut HandleCursor<'_>,
        registry: &TreRegistry,
    ) -> Result<(Self, HeaderLengths), FormatError> {
        let compliance_level = cursor.take(FieldKind::BcsN, CLEVEL_SZ, "CLEVEL")?;
        let system_type = cursor.take(FieldKind::BcsA, STYPE_SZ, "STYPE")?;
        let origin_station_id = cursor.take(FieldKind::BcsA, OSTAID_SZ, "OSTAID")?;
        let date_time = cursor.take(FieldKind::BcsA, FDT_SZ, "FDT")?;
        let title = cursor.take(FieldKind::BcsA, FTITLE_SZ, "FTITLE")?;
        let classification = cursor.take(FieldKind::BcsA, FSCLAS_SZ, "FSCLAS")?;

        // The security group is fixed-width for 2.1; for 2.0 the trailing
        // downgrade event is conditional on the downgrade code, so the
        // base run is buffered first and extended when the code asks for it
        let security = {
            use crate::record::cursor::FieldCursor;
            let base = 166;
            let mut buf = cursor.take_bytes(base, "security group")?;
            if version == Version::Nitf20 && &buf[160..166] == b"999998" {
                buf.extend_from_slice(&cursor.take_bytes(40, "security DEVT")?);
            }
            let mut field_cursor = FieldCursor::new(&buf);
            SecurityGroup::parse(version, &mut field_cursor)?
        };

        let copy_number = cursor.take(FieldKind::BcsN, FSCOP_SZ, "FSCOP")?;
        let num_copies = cursor.take(FieldKind::BcsN, FSCPYS_SZ, "FSCPYS")?;
        let encrypted = cursor.take(FieldKind::BcsN, ENCRYP_SZ, "ENCRYP")?;
        let (background_color, originator_name) = match version {
            Version::Nitf21 => (
                cursor.take(FieldKind::Binary, FBKGC_SZ, "FBKGC")?,
                cursor.take(FieldKind::BcsA, ONAME_21_SZ, "ONAME")?,
            ),
            Version::Nitf20 => (
                Field::new(FieldKind::Binary, FBKGC_SZ),
                cursor.take(FieldKind::BcsA, ONAME_20_SZ, "ONAME")?,
            ),
        };
        let originator_phone = cursor.take(FieldKind::BcsA, OPHONE_SZ, "OPHONE")?;

        let file_length = cursor.take_count(FL_SZ, "FL")?;
        let header_length = cursor.take_count(HL_SZ, "HL")?;

        let mut lengths = HeaderLengths {
            file_length,
            header_length,
            images: Vec::new(),
            graphics: Vec::new(),
            labels: Vec::new(),
            texts: Vec::new(),
            data_extensions: Vec::new(),
            reserved_extensions: Vec::new(),
        };
        for kind in SegmentKind::CANONICAL {
            let count = cursor.take_count(NUM_SEGMENTS_SZ, kind.count_field_name())? as usize;
            if kind == SegmentKind::Label && !version.supports_labels() && count != 0 {
                return Err(FormatError::LengthMismatch {
                    kind,
                    index: 0,
                    message: format!("a 2.1 file declares {} label segments", count),
                });
            }
            let table = lengths.table_mut(kind);
            for index in 0..count {
                let subheader = cursor.take_count(
                    kind.subheader_length_width(),
                    &format!("{} subheader length {}", kind, index),
                )?;
                let data = cursor.take_count(
                    kind.data_length_width(),
                    &format!("{} data length {}", kind, index),
                )?;
                table.push((subheader, data));
            }
        }

        let (user_defined, user_defined_overflow) =
            parse_handle_extension_section(cursor, registry, UDHDL_SZ, UDHOFL_SZ, "UDHD")?;
        let (extended, extended_overflow) =
            parse_handle_extension_section(cursor, registry, XHDL_SZ, XHDLOFL_SZ, "XHD")?;

        let header = Self {
            version,
            compliance_level,
            system_type,
            origin_station_id,
            date_time,
            title,
            classification,
            security,
            copy_number,
            num_copies,
            encrypted,
            background_color,
            originator_name,
            originator_phone,
            user_defined,
            user_defined_overflow,
            extended,
            extended_overflow,
        };
        Ok((header, lengths))
    }

    /// Name-keyed view of the fixed fields in serialization order.
    pub fn field_names(&self) -> Vec<(String, &Field)> {
        let mut fields: Vec<(String, &Field)> = vec![
            ("CLEVEL".to_string(), &self.compliance_level),
            ("STYPE".to_string(), &self.system_type),
            ("OSTAID".to_string(), &self.origin_station_id),
            ("FDT".to_string(), &self.date_time),
            ("FTITLE".to_string(), &self.title),
            ("FSCLAS".to_string(), &self.classification),
        ];
        for (name, field) in self.security.field_names() {
            fields.push((format!("FS{name}"), field));
        }
        fields.push(("FSCOP".to_string(), &self.copy_number));
        fields.push(("FSCPYS".to_string(), &self.num_copies));
        fields.push(("ENCRYP".to_string(), &self.encrypted));
        if self.version == Version::Nitf21 {
            fields.push(("FBKGC".to_string(), &self.background_color));
        }
        fields.push(("ONAME".to_string(), &self.originator_name));
        fields.push(("OPHONE".to_string(), &self.originator_phone));
        fields
    }
}

/// Read a TRE section from the handle: length, then overflow + TREs.
fn parse_handle_extension_section(
    cursor: &mut HandleCursor<'_>,
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
    let extensions = Extensions::parse(&tre_bytes, registry)?;
    Ok((extensions, overflow))
}

// =============================================================================
// Parsed and serialized layout tables
// =============================================================================

/// The declared length table read from a file header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HeaderLengths {
    pub file_length: u64,
    pub header_length: u64,
    pub images: Vec<(u64, u64)>,
    pub graphics: Vec<(u64, u64)>,
    pub labels: Vec<(u64, u64)>,
    pub texts: Vec<(u64, u64)>,
    pub data_extensions: Vec<(u64, u64)>,
    pub reserved_extensions: Vec<(u64, u64)>,
}

impl HeaderLengths {
    pub fn table_mut(&mut self, kind: SegmentKind) -> &mut Vec<(u64, u64)> {
        match kind {
            SegmentKind::Image => &mut self.images,
            SegmentKind::Graphic => &mut self.graphics,
            SegmentKind::Label => &mut self.labels,
            SegmentKind::Text => &mut self.texts,
            SegmentKind::DataExtension => &mut self.data_extensions,
            SegmentKind::ReservedExtension => &mut self.reserved_extensions,
        }
    }

    pub fn table(&self, kind: SegmentKind) -> &[(u64, u64)] {
        match kind {
            SegmentKind::Image => &self.images,
            SegmentKind::Graphic => &self.graphics,
            SegmentKind::Label => &self.labels,
            SegmentKind::Text => &self.texts,
            SegmentKind::DataExtension => &self.data_extensions,
            SegmentKind::ReservedExtension => &self.reserved_extensions,
        }
    }
}

/// Byte offset of one segment's length pair inside the serialized header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentLengthOffsets {
    pub kind: SegmentKind,
    pub subheader_length: usize,
    pub data_length: usize,
}

/// Byte offsets of every placeholder the back-fill pass rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderOffsets {
    pub clevel: usize,
    pub file_length: usize,
    pub header_length: usize,
    /// One entry per segment, canonical order
    pub segment_lengths: Vec<SegmentLengthOffsets>,
}
