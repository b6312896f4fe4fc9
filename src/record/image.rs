//! Image segment subheader.
//!
//! The image subheader is the richest of the segment subheaders: beyond
//! its fixed field table it owns a dynamic comment list (0-9 entries), a
//! dynamic band-info list (sized by NBANDS or XBANDS), and two TRE
//! sections (user-defined and extended). All of its count fields are
//! derived: serialization recomputes NICOM, NBANDS/XBANDS, and the section
//! lengths from the actual children, so they can never drift.

use crate::error::{FormatError, RecordError};
use crate::record::cursor::FieldCursor;
use crate::record::extensions::{parse_extension_section, write_extension_section, Extensions};
use crate::record::field::{Field, FieldKind};
use crate::record::security::SecurityGroup;
use crate::record::versions::Version;
use crate::tre::TreRegistry;

// =============================================================================
// Field widths
// =============================================================================

const IID1_SZ: usize = 10;
const IDATIM_SZ: usize = 14;
const TGTID_SZ: usize = 17;
const IID2_SZ: usize = 80;
const ISCLAS_SZ: usize = 1;
const ENCRYP_SZ: usize = 1;
const ISORCE_SZ: usize = 42;
const NROWS_SZ: usize = 8;
const NCOLS_SZ: usize = 8;
const PVTYPE_SZ: usize = 3;
const IREP_SZ: usize = 8;
const ICAT_SZ: usize = 8;
const ABPP_SZ: usize = 2;
const PJUST_SZ: usize = 1;
const ICORDS_SZ: usize = 1;
const IGEOLO_SZ: usize = 60;
const NICOM_SZ: usize = 1;
const ICOM_SZ: usize = 80;
const IC_SZ: usize = 2;
const COMRAT_SZ: usize = 4;
const NBANDS_SZ: usize = 1;
const XBANDS_SZ: usize = 5;
const ISYNC_SZ: usize = 1;
const IMODE_SZ: usize = 1;
const NBPR_SZ: usize = 4;
const NBPC_SZ: usize = 4;
const NPPBH_SZ: usize = 4;
const NPPBV_SZ: usize = 4;
const NBPP_SZ: usize = 2;
const IDLVL_SZ: usize = 3;
const IALVL_SZ: usize = 3;
const ILOC_SZ: usize = 10;
const IMAG_SZ: usize = 4;
const UDIDL_SZ: usize = 5;
const UDOFL_SZ: usize = 3;
const IXSHDL_SZ: usize = 5;
const IXSOFL_SZ: usize = 3;

const IREPBAND_SZ: usize = 2;
const ISUBCAT_SZ: usize = 6;
const IFC_SZ: usize = 1;
const IMFLT_SZ: usize = 3;
const NLUTS_SZ: usize = 1;
const NELUT_SZ: usize = 5;

/// Most comments a subheader can carry (NICOM is one digit).
pub const MAX_COMMENTS: usize = 9;

/// Most bands NBANDS can carry before spilling into XBANDS.
const MAX_NBANDS: usize = 9;

/// Most bands XBANDS can carry (five digits).
pub const MAX_BANDS: usize = 99_999;

/// Compression codes that take no COMRAT field and no decompressor.
const UNCOMPRESSED_CODES: [&str; 2] = ["NC", "NM"];

// =============================================================================
// BandInfo
// =============================================================================

/// Per-band metadata, including optional look-up tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandInfo {
    pub representation: Field,
    pub subcategory: Field,
    pub filter_condition: Field,
    pub filter_code: Field,
    /// Look-up tables; all must share one length (NELUT)
    luts: Vec<Vec<u8>>,
}

impl BandInfo {
    /// A default band with no look-up tables.
    pub fn new() -> Self {
        Self {
            representation: Field::new(FieldKind::BcsA, IREPBAND_SZ),
            subcategory: Field::new(FieldKind::BcsA, ISUBCAT_SZ),
            filter_condition: Field::new(FieldKind::BcsA, IFC_SZ),
            filter_code: Field::new(FieldKind::BcsA, IMFLT_SZ),
            luts: Vec::new(),
        }
    }

    /// Number of look-up tables (NLUTS).
    pub fn num_luts(&self) -> usize {
        self.luts.len()
    }

    /// Entries per look-up table (NELUT), zero when there are none.
    pub fn entries_per_lut(&self) -> usize {
        self.luts.first().map(Vec::len).unwrap_or(0)
    }

    /// The look-up tables.
    pub fn luts(&self) -> &[Vec<u8>] {
        &self.luts
    }

    /// Replace the look-up tables.
    ///
    /// # Errors
    /// [`RecordError::Invariant`] if the tables differ in length or a
    /// count field would overflow its width.
    pub fn set_luts(&mut self, luts: Vec<Vec<u8>>) -> Result<(), RecordError> {
        if luts.len() > 9 {
            return Err(RecordError::Invariant(format!(
                "a band holds at most 9 look-up tables, got {}",
                luts.len()
            )));
        }
        if let Some(first) = luts.first() {
            if first.len() > 99_999 {
                return Err(RecordError::Invariant(format!(
                    "look-up tables hold at most 99999 entries, got {}",
                    first.len()
                )));
            }
            if luts.iter().any(|lut| lut.len() != first.len()) {
                return Err(RecordError::Invariant(
                    "all look-up tables in a band must have the same length".to_string(),
                ));
            }
        }
        self.luts = luts;
        Ok(())
    }

    fn parse(cursor: &mut FieldCursor<'_>) -> Result<Self, FormatError> {
        let representation = cursor.take(FieldKind::BcsA, IREPBAND_SZ, "band IREPBAND")?;
        let subcategory = cursor.take(FieldKind::BcsA, ISUBCAT_SZ, "band ISUBCAT")?;
        let filter_condition = cursor.take(FieldKind::BcsA, IFC_SZ, "band IFC")?;
        let filter_code = cursor.take(FieldKind::BcsA, IMFLT_SZ, "band IMFLT")?;
        let num_luts = cursor.take_count(NLUTS_SZ, "band NLUTS")? as usize;
        let mut luts = Vec::with_capacity(num_luts);
        if num_luts > 0 {
            let entries = cursor.take_count(NELUT_SZ, "band NELUT")? as usize;
            for _ in 0..num_luts {
                luts.push(cursor.take_bytes(entries, "band LUT data")?.to_vec());
            }
        }
        Ok(Self {
            representation,
            subcategory,
            filter_condition,
            filter_code,
            luts,
        })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.representation.bytes());
        out.extend_from_slice(self.subcategory.bytes());
        out.extend_from_slice(self.filter_condition.bytes());
        out.extend_from_slice(self.filter_code.bytes());
        out.extend_from_slice(format!("{:01}", self.luts.len()).as_bytes());
        if !self.luts.is_empty() {
            out.extend_from_slice(format!("{:05}", self.entries_per_lut()).as_bytes());
            for lut in &self.luts {
                out.extend_from_slice(lut);
            }
        }
    }
}

impl Default for BandInfo {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ImageSubheader
// =============================================================================

/// The image segment subheader (part type "IM").
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSubheader {
    version: Version,
    pub image_id: Field,
    pub date_time: Field,
    pub target_id: Field,
    pub title: Field,
    pub classification: Field,
    pub security: SecurityGroup,
    pub encrypted: Field,
    pub source: Field,
    pub num_rows: Field,
    pub num_cols: Field,
    pub pixel_value_type: Field,
    pub representation: Field,
    pub category: Field,
    pub actual_bits_per_pixel: Field,
    pub pixel_justification: Field,
    pub coordinate_system: Field,
    /// Serialized only when the coordinate system declares coordinates
    pub corner_coordinates: Field,
    comments: Vec<Field>,
    pub compression: Field,
    /// Serialized only for compressed IC codes
    pub compression_rate: Field,
    bands: Vec<BandInfo>,
    pub sync: Field,
    pub mode: Field,
    pub blocks_per_row: Field,
    pub blocks_per_col: Field,
    pub pixels_per_horiz_block: Field,
    pub pixels_per_vert_block: Field,
    pub bits_per_pixel: Field,
    pub display_level: Field,
    pub attachment_level: Field,
    pub location: Field,
    pub magnification: Field,
    pub user_defined: Extensions,
    /// DES back-reference (1-based) for overflowed user-defined TREs
    pub user_defined_overflow: Field,
    pub extended: Extensions,
    /// DES back-reference (1-based) for overflowed extended TREs
    pub extended_overflow: Field,
}

impl ImageSubheader {
    /// A default subheader for the given version: uncompressed ("NC"),
    /// band-interleaved-by-block mode, no bands, no comments.
    pub fn new(version: Version) -> Self {
        let mut subheader = Self {
            version,
            image_id: Field::new(FieldKind::BcsA, IID1_SZ),
            date_time: Field::new(FieldKind::BcsA, IDATIM_SZ),
            target_id: Field::new(FieldKind::BcsA, TGTID_SZ),
            title: Field::new(FieldKind::BcsA, IID2_SZ),
            classification: Field::new(FieldKind::BcsA, ISCLAS_SZ),
            security: SecurityGroup::new(version),
            encrypted: Field::new(FieldKind::BcsN, ENCRYP_SZ),
            source: Field::new(FieldKind::BcsA, ISORCE_SZ),
            num_rows: Field::new(FieldKind::BcsN, NROWS_SZ),
            num_cols: Field::new(FieldKind::BcsN, NCOLS_SZ),
            pixel_value_type: Field::new(FieldKind::BcsA, PVTYPE_SZ),
            representation: Field::new(FieldKind::BcsA, IREP_SZ),
            category: Field::new(FieldKind::BcsA, ICAT_SZ),
            actual_bits_per_pixel: Field::new(FieldKind::BcsN, ABPP_SZ),
            pixel_justification: Field::new(FieldKind::BcsA, PJUST_SZ),
            coordinate_system: Field::new(FieldKind::BcsA, ICORDS_SZ),
            corner_coordinates: Field::new(FieldKind::BcsA, IGEOLO_SZ),
            comments: Vec::new(),
            compression: Field::new(FieldKind::BcsA, IC_SZ),
            compression_rate: Field::new(FieldKind::BcsA, COMRAT_SZ),
            bands: Vec::new(),
            sync: Field::new(FieldKind::BcsN, ISYNC_SZ),
            mode: Field::new(FieldKind::BcsA, IMODE_SZ),
            blocks_per_row: Field::new(FieldKind::BcsN, NBPR_SZ),
            blocks_per_col: Field::new(FieldKind::BcsN, NBPC_SZ),
            pixels_per_horiz_block: Field::new(FieldKind::BcsN, NPPBH_SZ),
            pixels_per_vert_block: Field::new(FieldKind::BcsN, NPPBV_SZ),
            bits_per_pixel: Field::new(FieldKind::BcsN, NBPP_SZ),
            display_level: Field::new(FieldKind::BcsN, IDLVL_SZ),
            attachment_level: Field::new(FieldKind::BcsN, IALVL_SZ),
            location: Field::new(FieldKind::BcsN, ILOC_SZ),
            magnification: Field::new(FieldKind::BcsA, IMAG_SZ),
            user_defined: Extensions::new(),
            user_defined_overflow: Field::new(FieldKind::BcsN, UDOFL_SZ),
            extended: Extensions::new(),
            extended_overflow: Field::new(FieldKind::BcsN, IXSOFL_SZ),
        };
        // Infallible: all literals fit their widths
        let _ = subheader.compression.set_string("NC");
        let _ = subheader.mode.set_string("B");
        let _ = subheader.magnification.set_string("1.0");
        let _ = subheader.blocks_per_row.set_uint(1);
        let _ = subheader.blocks_per_col.set_uint(1);
        if version == Version::Nitf20 {
            let _ = subheader.coordinate_system.set_string("N");
        }
        subheader
    }

    /// The version this subheader was built or parsed for.
    pub fn version(&self) -> Version {
        self.version
    }

    // -------------------------------------------------------------------------
    // Bands
    // -------------------------------------------------------------------------

    /// Append `n` default band-info records, updating NBANDS/XBANDS.
    ///
    /// # Errors
    /// [`RecordError::Invariant`] if the total would exceed
    /// [`MAX_BANDS`].
    pub fn create_bands(&mut self, n: usize) -> Result<(), RecordError> {
        if self.bands.len() + n > MAX_BANDS {
            return Err(RecordError::Invariant(format!(
                "an image holds at most {} bands, requested {}",
                MAX_BANDS,
                self.bands.len() + n
            )));
        }
        self.bands.extend((0..n).map(|_| BandInfo::new()));
        Ok(())
    }

    /// Number of bands (NBANDS, or XBANDS for multispectral counts).
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Band info at `index`.
    pub fn band_info(&self, index: usize) -> Option<&BandInfo> {
        self.bands.get(index)
    }

    /// Mutable band info at `index`.
    pub fn band_info_mut(&mut self, index: usize) -> Option<&mut BandInfo> {
        self.bands.get_mut(index)
    }

    /// All bands in order.
    pub fn bands(&self) -> &[BandInfo] {
        &self.bands
    }

    // -------------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------------

    /// Insert a comment, appending when `index` is `None`.
    ///
    /// # Errors
    /// [`RecordError::Invariant`] when the subheader already carries
    /// [`MAX_COMMENTS`] comments or `index` is past the end;
    /// [`RecordError::Field`] when the text exceeds 80 characters.
    pub fn insert_comment(&mut self, text: &str, index: Option<usize>) -> Result<(), RecordError> {
        if self.comments.len() >= MAX_COMMENTS {
            return Err(RecordError::Invariant(format!(
                "an image subheader holds at most {} comments",
                MAX_COMMENTS
            )));
        }
        let mut comment = Field::new(FieldKind::BcsA, ICOM_SZ);
        comment.set_string(text)?;
        let at = index.unwrap_or(self.comments.len());
        if at > self.comments.len() {
            return Err(RecordError::Invariant(format!(
                "comment index {} out of range ({} comments)",
                at,
                self.comments.len()
            )));
        }
        self.comments.insert(at, comment);
        Ok(())
    }

    /// Remove the comment at `index`. Out-of-range indices are a no-op.
    pub fn remove_comment(&mut self, index: usize) {
        if index < self.comments.len() {
            self.comments.remove(index);
        }
    }

    /// The comments in order.
    pub fn comments(&self) -> &[Field] {
        &self.comments
    }

    // -------------------------------------------------------------------------
    // Serialization
    // -------------------------------------------------------------------------

    /// Whether the corner-coordinates field is serialized.
    ///
    /// 2.1 marks "no coordinates" with a space, 2.0 with `N`.
    fn has_corner_coordinates(&self) -> bool {
        let icords = self.coordinate_system.as_str();
        match self.version {
            Version::Nitf21 => !icords.is_empty(),
            Version::Nitf20 => icords != "N",
        }
    }

    /// Whether the compression-rate field is serialized.
    fn has_compression_rate(&self) -> bool {
        let code = self.compression.as_str();
        !UNCOMPRESSED_CODES.contains(&code.as_str())
    }

    /// Serialize the subheader, part type first.
    pub fn serialize(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::with_capacity(512);
        out.extend_from_slice(b"IM");
        out.extend_from_slice(self.image_id.bytes());
        out.extend_from_slice(self.date_time.bytes());
        out.extend_from_slice(self.target_id.bytes());
        out.extend_from_slice(self.title.bytes());
        out.extend_from_slice(self.classification.bytes());
        self.security.write_to(&mut out);
        out.extend_from_slice(self.encrypted.bytes());
        out.extend_from_slice(self.source.bytes());
        out.extend_from_slice(self.num_rows.bytes());
        out.extend_from_slice(self.num_cols.bytes());
        out.extend_from_slice(self.pixel_value_type.bytes());
        out.extend_from_slice(self.representation.bytes());
        out.extend_from_slice(self.category.bytes());
        out.extend_from_slice(self.actual_bits_per_pixel.bytes());
        out.extend_from_slice(self.pixel_justification.bytes());
        out.extend_from_slice(self.coordinate_system.bytes());
        if self.has_corner_coordinates() {
            out.extend_from_slice(self.corner_coordinates.bytes());
        }
        out.extend_from_slice(format!("{:01}", self.comments.len()).as_bytes());
        for comment in &self.comments {
            out.extend_from_slice(comment.bytes());
        }
        out.extend_from_slice(self.compression.bytes());
        if self.has_compression_rate() {
            out.extend_from_slice(self.compression_rate.bytes());
        }
        // NBANDS holds 1-9 bands; zero spills to XBANDS, so a band-less
        // subheader still parses symmetrically
        if self.bands.is_empty() || self.bands.len() > MAX_NBANDS {
            out.extend_from_slice(b"0");
            out.extend_from_slice(format!("{:05}", self.bands.len()).as_bytes());
        } else {
            out.extend_from_slice(format!("{:01}", self.bands.len()).as_bytes());
        }
        for band in &self.bands {
            band.write_to(&mut out);
        }
        out.extend_from_slice(self.sync.bytes());
        out.extend_from_slice(self.mode.bytes());
        out.extend_from_slice(self.blocks_per_row.bytes());
        out.extend_from_slice(self.blocks_per_col.bytes());
        out.extend_from_slice(self.pixels_per_horiz_block.bytes());
        out.extend_from_slice(self.pixels_per_vert_block.bytes());
        out.extend_from_slice(self.bits_per_pixel.bytes());
        out.extend_from_slice(self.display_level.bytes());
        out.extend_from_slice(self.attachment_level.bytes());
        out.extend_from_slice(self.location.bytes());
        out.extend_from_slice(self.magnification.bytes());

        write_extension_section(
            &mut out,
            &self.user_defined,
            &self.user_defined_overflow,
            UDIDL_SZ,
        )?;
        write_extension_section(&mut out, &self.extended, &self.extended_overflow, IXSHDL_SZ)?;
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
        let part = cursor.take(FieldKind::BcsA, 2, "image part type")?;
        if part.bytes() != b"IM" {
            return Err(FormatError::BadPartType {
                expected: "IM",
                actual: part.as_str(),
            });
        }
        let image_id = cursor.take(FieldKind::BcsA, IID1_SZ, "IID1")?;
        let date_time = cursor.take(FieldKind::BcsA, IDATIM_SZ, "IDATIM")?;
        let target_id = cursor.take(FieldKind::BcsA, TGTID_SZ, "TGTID")?;
        let title = cursor.take(FieldKind::BcsA, IID2_SZ, "IID2")?;
        let classification = cursor.take(FieldKind::BcsA, ISCLAS_SZ, "ISCLAS")?;
        let security = SecurityGroup::parse(version, &mut cursor)?;
        let encrypted = cursor.take(FieldKind::BcsN, ENCRYP_SZ, "ENCRYP")?;
        let source = cursor.take(FieldKind::BcsA, ISORCE_SZ, "ISORCE")?;
        let num_rows = cursor.take(FieldKind::BcsN, NROWS_SZ, "NROWS")?;
        let num_cols = cursor.take(FieldKind::BcsN, NCOLS_SZ, "NCOLS")?;
        let pixel_value_type = cursor.take(FieldKind::BcsA, PVTYPE_SZ, "PVTYPE")?;
        let representation = cursor.take(FieldKind::BcsA, IREP_SZ, "IREP")?;
        let category = cursor.take(FieldKind::BcsA, ICAT_SZ, "ICAT")?;
        let actual_bits_per_pixel = cursor.take(FieldKind::BcsN, ABPP_SZ, "ABPP")?;
        let pixel_justification = cursor.take(FieldKind::BcsA, PJUST_SZ, "PJUST")?;
        let coordinate_system = cursor.take(FieldKind::BcsA, ICORDS_SZ, "ICORDS")?;

        let icords = coordinate_system.as_str();
        let has_geolo = match version {
            Version::Nitf21 => !icords.is_empty(),
            Version::Nitf20 => icords != "N",
        };
        let corner_coordinates = if has_geolo {
            cursor.take(FieldKind::BcsA, IGEOLO_SZ, "IGEOLO")?
        } else {
            Field::new(FieldKind::BcsA, IGEOLO_SZ)
        };

        let num_comments = cursor.take_count(NICOM_SZ, "NICOM")? as usize;
        let mut comments = Vec::with_capacity(num_comments);
        for index in 0..num_comments {
            comments.push(cursor.take(FieldKind::BcsA, ICOM_SZ, &format!("ICOM[{index}]"))?);
        }

        let compression = cursor.take(FieldKind::BcsA, IC_SZ, "IC")?;
        let code = compression.as_str();
        let compression_rate = if UNCOMPRESSED_CODES.contains(&code.as_str()) {
            Field::new(FieldKind::BcsA, COMRAT_SZ)
        } else {
            cursor.take(FieldKind::BcsA, COMRAT_SZ, "COMRAT")?
        };

        let nbands = cursor.take_count(NBANDS_SZ, "NBANDS")? as usize;
        let band_count = if nbands == 0 {
            cursor.take_count(XBANDS_SZ, "XBANDS")? as usize
        } else {
            nbands
        };
        let mut bands = Vec::with_capacity(band_count);
        for _ in 0..band_count {
            bands.push(BandInfo::parse(&mut cursor)?);
        }

        let sync = cursor.take(FieldKind::BcsN, ISYNC_SZ, "ISYNC")?;
        let mode = cursor.take(FieldKind::BcsA, IMODE_SZ, "IMODE")?;
        let blocks_per_row = cursor.take(FieldKind::BcsN, NBPR_SZ, "NBPR")?;
        let blocks_per_col = cursor.take(FieldKind::BcsN, NBPC_SZ, "NBPC")?;
        let pixels_per_horiz_block = cursor.take(FieldKind::BcsN, NPPBH_SZ, "NPPBH")?;
        let pixels_per_vert_block = cursor.take(FieldKind::BcsN, NPPBV_SZ, "NPPBV")?;
        let bits_per_pixel = cursor.take(FieldKind::BcsN, NBPP_SZ, "NBPP")?;
        let display_level = cursor.take(FieldKind::BcsN, IDLVL_SZ, "IDLVL")?;
        let attachment_level = cursor.take(FieldKind::BcsN, IALVL_SZ, "IALVL")?;
        let location = cursor.take(FieldKind::BcsN, ILOC_SZ, "ILOC")?;
        let magnification = cursor.take(FieldKind::BcsA, IMAG_SZ, "IMAG")?;

        let (user_defined, user_defined_overflow) =
            parse_extension_section(&mut cursor, registry, UDIDL_SZ, UDOFL_SZ, "UDID")?;
        let (extended, extended_overflow) =
            parse_extension_section(&mut cursor, registry, IXSHDL_SZ, IXSOFL_SZ, "IXSHD")?;

        let subheader = Self {
            version,
            image_id,
            date_time,
            target_id,
            title,
            classification,
            security,
            encrypted,
            source,
            num_rows,
            num_cols,
            pixel_value_type,
            representation,
            category,
            actual_bits_per_pixel,
            pixel_justification,
            coordinate_system,
            corner_coordinates,
            comments,
            compression,
            compression_rate,
            bands,
            sync,
            mode,
            blocks_per_row,
            blocks_per_col,
            pixels_per_horiz_block,
            pixels_per_vert_block,
            bits_per_pixel,
            display_level,
            attachment_level,
            location,
            magnification,
            user_defined,
            user_defined_overflow,
            extended,
            extended_overflow,
        };
        Ok((subheader, cursor.pos()))
    }

    /// Name-keyed view of the fixed fields in serialization order, for
    /// dumps and debugging.
    pub fn field_names(&self) -> Vec<(String, &Field)> {
        let mut fields: Vec<(String, &Field)> = vec![
            ("IID1".to_string(), &self.image_id),
            ("IDATIM".to_string(), &self.date_time),
            ("TGTID".to_string(), &self.target_id),
            ("IID2".to_string(), &self.title),
            ("ISCLAS".to_string(), &self.classification),
        ];
        for (name, field) in self.security.field_names() {
            fields.push((format!("IS{name}"), field));
        }
        fields.push(("ENCRYP".to_string(), &self.encrypted));
        fields.push(("ISORCE".to_string(), &self.source));
        fields.push(("NROWS".to_string(), &self.num_rows));
        fields.push(("NCOLS".to_string(), &self.num_cols));
        fields.push(("PVTYPE".to_string(), &self.pixel_value_type));
        fields.push(("IREP".to_string(), &self.representation));
        fields.push(("ICAT".to_string(), &self.category));
        fields.push(("ABPP".to_string(), &self.actual_bits_per_pixel));
        fields.push(("PJUST".to_string(), &self.pixel_justification));
        fields.push(("ICORDS".to_string(), &self.coordinate_system));
        if self.has_corner_coordinates() {
            fields.push(("IGEOLO".to_string(), &self.corner_coordinates));
        }
        for (index, comment) in self.comments.iter().enumerate() {
            fields.push((format!("ICOM[{index}]"), comment));
        }
        fields.push(("IC".to_string(), &self.compression));
        if self.has_compression_rate() {
            fields.push(("COMRAT".to_string(), &self.compression_rate));
        }
        for (index, band) in self.bands.iter().enumerate() {
            fields.push((format!("IREPBAND[{index}]"), &band.representation));
            fields.push((format!("ISUBCAT[{index}]"), &band.subcategory));
            fields.push((format!("IFC[{index}]"), &band.filter_condition));
            fields.push((format!("IMFLT[{index}]"), &band.filter_code));
        }
        fields.push(("ISYNC".to_string(), &self.sync));
        fields.push(("IMODE".to_string(), &self.mode));
        fields.push(("NBPR".to_string(), &self.blocks_per_row));
        fields.push(("NBPC".to_string(), &self.blocks_per_col));
        fields.push(("NPPBH".to_string(), &self.pixels_per_horiz_block));
        fields.push(("NPPBV".to_string(), &self.pixels_per_vert_block));
        fields.push(("NBPP".to_string(), &self.bits_per_pixel));
        fields.push(("IDLVL".to_string(), &self.display_level));
        fields.push(("IALVL".to_string(), &self.attachment_level));
        fields.push(("ILOC".to_string(), &self.location));
        fields.push(("IMAG".to_string(), &self.magnification));
        fields
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn subheader() -> ImageSubheader {
        let mut subheader = ImageSubheader::new(Version::Nitf21);
        subheader.num_rows.set_uint(2).unwrap();
        subheader.num_cols.set_uint(3).unwrap();
        subheader.pixel_value_type.set_string("INT").unwrap();
        subheader.representation.set_string("MONO").unwrap();
        subheader.actual_bits_per_pixel.set_uint(8).unwrap();
        subheader.pixel_justification.set_string("R").unwrap();
        subheader.bits_per_pixel.set_uint(8).unwrap();
        subheader.pixels_per_horiz_block.set_uint(3).unwrap();
        subheader.pixels_per_vert_block.set_uint(2).unwrap();
        subheader.create_bands(1).unwrap();
        subheader
    }

    #[test]
    fn test_serialize_parse_roundtrip() {
        let original = subheader();
        let bytes = original.serialize().unwrap();

        let registry = TreRegistry::new();
        let (parsed, consumed) = ImageSubheader::parse(Version::Nitf21, &bytes, &registry).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_reserialization_is_identical() {
        let original = subheader();
        let bytes = original.serialize().unwrap();
        let registry = TreRegistry::new();
        let (parsed, _) = ImageSubheader::parse(Version::Nitf21, &bytes, &registry).unwrap();
        assert_eq!(parsed.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_bad_part_type() {
        let mut bytes = subheader().serialize().unwrap();
        bytes[0] = b'S';
        bytes[1] = b'Y';
        let registry = TreRegistry::new();
        let result = ImageSubheader::parse(Version::Nitf21, &bytes, &registry);
        assert!(matches!(result, Err(FormatError::BadPartType { .. })));
    }

    #[test]
    fn test_comment_limit() {
        let mut subheader = subheader();
        for index in 0..MAX_COMMENTS {
            subheader
                .insert_comment(&format!("comment {index}"), None)
                .unwrap();
        }
        let result = subheader.insert_comment("one too many", None);
        assert!(matches!(result, Err(RecordError::Invariant(_))));
        assert_eq!(subheader.comments().len(), MAX_COMMENTS);
    }

    #[test]
    fn test_comment_insert_and_remove() {
        let mut subheader = subheader();
        subheader.insert_comment("first", None).unwrap();
        subheader.insert_comment("third", None).unwrap();
        subheader.insert_comment("second", Some(1)).unwrap();

        let texts: Vec<String> = subheader.comments().iter().map(|c| c.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);

        subheader.remove_comment(0);
        assert_eq!(subheader.comments().len(), 2);
        // Out of range is a no-op
        subheader.remove_comment(10);
        assert_eq!(subheader.comments().len(), 2);
    }

    #[test]
    fn test_comment_overflow_is_field_error() {
        let mut subheader = subheader();
        let long = "x".repeat(81);
        let result = subheader.insert_comment(&long, None);
        assert!(matches!(result, Err(RecordError::Field(_))));
    }

    #[test]
    fn test_comments_roundtrip() {
        let mut original = subheader();
        original.insert_comment("collected at dawn", None).unwrap();
        original.insert_comment("cloud cover 10%", None).unwrap();

        let bytes = original.serialize().unwrap();
        let registry = TreRegistry::new();
        let (parsed, _) = ImageSubheader::parse(Version::Nitf21, &bytes, &registry).unwrap();
        assert_eq!(parsed.comments().len(), 2);
        assert_eq!(parsed.comments()[0].as_str(), "collected at dawn");
    }

    #[test]
    fn test_xbands_for_more_than_nine() {
        let mut original = subheader();
        original.create_bands(11).unwrap(); // 12 total with the existing one
        let bytes = original.serialize().unwrap();

        let registry = TreRegistry::new();
        let (parsed, _) = ImageSubheader::parse(Version::Nitf21, &bytes, &registry).unwrap();
        assert_eq!(parsed.band_count(), 12);
    }

    #[test]
    fn test_band_luts_roundtrip() {
        let mut original = subheader();
        original
            .band_info_mut(0)
            .unwrap()
            .set_luts(vec![vec![1, 2, 3], vec![4, 5, 6]])
            .unwrap();

        let bytes = original.serialize().unwrap();
        let registry = TreRegistry::new();
        let (parsed, _) = ImageSubheader::parse(Version::Nitf21, &bytes, &registry).unwrap();
        let band = parsed.band_info(0).unwrap();
        assert_eq!(band.num_luts(), 2);
        assert_eq!(band.entries_per_lut(), 3);
        assert_eq!(band.luts()[1], vec![4, 5, 6]);
    }

    #[test]
    fn test_mismatched_luts_rejected() {
        let mut band = BandInfo::new();
        let result = band.set_luts(vec![vec![1, 2], vec![3]]);
        assert!(matches!(result, Err(RecordError::Invariant(_))));
    }

    #[test]
    fn test_corner_coordinates_conditional() {
        let mut with = subheader();
        with.coordinate_system.set_string("G").unwrap();
        with.corner_coordinates
            .set_string("0000000000000000000000000000000")
            .unwrap();
        let without = subheader();

        let with_bytes = with.serialize().unwrap();
        let without_bytes = without.serialize().unwrap();
        assert_eq!(with_bytes.len(), without_bytes.len() + IGEOLO_SZ);
    }

    #[test]
    fn test_comrat_conditional() {
        let mut compressed = subheader();
        compressed.compression.set_string("C8").unwrap();
        compressed.compression_rate.set_string("N145").unwrap();

        let bytes = compressed.serialize().unwrap();
        let registry = TreRegistry::new();
        let (parsed, _) = ImageSubheader::parse(Version::Nitf21, &bytes, &registry).unwrap();
        assert_eq!(parsed.compression.as_str(), "C8");
        assert_eq!(parsed.compression_rate.as_str(), "N145");
    }

    #[test]
    fn test_extension_section_roundtrip() {
        use crate::tre::Tre;

        let mut original = subheader();
        original.extended.append(Tre::raw("FOOBAR", b"payload"));

        let bytes = original.serialize().unwrap();
        let registry = TreRegistry::new();
        let (parsed, _) = ImageSubheader::parse(Version::Nitf21, &bytes, &registry).unwrap();
        assert_eq!(parsed.extended.len(), 1);
        let tre = parsed.extended.iter().next().unwrap();
        assert_eq!(tre.tag(), "FOOBAR");
        assert!(tre.is_raw());
    }

    #[test]
    fn test_nitf20_subheader_roundtrip() {
        let mut original = ImageSubheader::new(Version::Nitf20);
        original.num_rows.set_uint(10).unwrap();
        original.num_cols.set_uint(10).unwrap();
        original.create_bands(1).unwrap();

        let bytes = original.serialize().unwrap();
        let registry = TreRegistry::new();
        let (parsed, consumed) = ImageSubheader::parse(Version::Nitf20, &bytes, &registry).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, original);
    }
}
