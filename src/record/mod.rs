//! The in-memory file model.
//!
//! A [`Record`] is the whole-file model: a [`FileHeader`] plus ordered
//! segment lists for each of the six segment classes, with a parallel
//! [`ComponentInfo`] table tracking each segment's serialized lengths.
//! The record exclusively owns its subheaders, their extension containers
//! own their TREs, and TRE fields are owned by the TRE.
//!
//! Count fields are derived: the header's NUMI..NUMRES always equal the
//! list lengths because they are computed from them at serialization
//! time, and the `new_*_segment` constructors are the only way the lists
//! grow.

mod cursor;
mod des;
mod extensions;
mod field;
mod graphic;
mod header;
mod image;
mod label;
mod res;
mod security;
mod text;
mod versions;

pub use des::DesSubheader;
pub use extensions::Extensions;
pub use field::{Field, FieldKind};
pub use graphic::GraphicSubheader;
pub use header::FileHeader;
pub use image::{BandInfo, ImageSubheader, MAX_BANDS, MAX_COMMENTS};
pub use label::LabelSubheader;
pub use res::ResSubheader;
pub use security::{SecurityGroup, SecurityNitf20, SecurityNitf21, SECURITY_21_LEN};
pub use text::TextSubheader;
pub use versions::Version;

pub(crate) use cursor::HandleCursor;
pub(crate) use header::{HeaderLengths, HeaderOffsets};

use crate::error::RecordError;

// =============================================================================
// SegmentKind
// =============================================================================

/// The six segment classes, in canonical file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Image,
    Graphic,
    Label,
    Text,
    DataExtension,
    ReservedExtension,
}

impl SegmentKind {
    /// All kinds in canonical file order.
    pub const CANONICAL: [SegmentKind; 6] = [
        SegmentKind::Image,
        SegmentKind::Graphic,
        SegmentKind::Label,
        SegmentKind::Text,
        SegmentKind::DataExtension,
        SegmentKind::ReservedExtension,
    ];

    /// Width of this class's subheader-length field in the file header.
    pub(crate) const fn subheader_length_width(self) -> usize {
        match self {
            SegmentKind::Image => 6,
            _ => 4,
        }
    }

    /// Width of this class's data-length field in the file header.
    pub(crate) const fn data_length_width(self) -> usize {
        match self {
            SegmentKind::Image => 10,
            SegmentKind::Graphic => 6,
            SegmentKind::Label => 3,
            SegmentKind::Text => 5,
            SegmentKind::DataExtension => 9,
            SegmentKind::ReservedExtension => 7,
        }
    }

    /// Name of this class's count field in the file header.
    pub(crate) const fn count_field_name(self) -> &'static str {
        match self {
            SegmentKind::Image => "NUMI",
            SegmentKind::Graphic => "NUMS",
            SegmentKind::Label => "NUMX",
            SegmentKind::Text => "NUMT",
            SegmentKind::DataExtension => "NUMDES",
            SegmentKind::ReservedExtension => "NUMRES",
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SegmentKind::Image => "image",
            SegmentKind::Graphic => "graphic",
            SegmentKind::Label => "label",
            SegmentKind::Text => "text",
            SegmentKind::DataExtension => "data extension",
            SegmentKind::ReservedExtension => "reserved extension",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// ComponentInfo and segments
// =============================================================================

/// The (subheader length, data length) pair the file header keeps for a
/// segment. Both are zero until the segment has been written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentInfo {
    pub subheader_length: u64,
    pub data_length: u64,
}

/// Where a parsed segment's data lives in its source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DataExtent {
    pub offset: u64,
    pub length: u64,
}

/// One segment: a typed subheader plus its component info.
///
/// For parsed records the segment also remembers where its data lives in
/// the source file; segment data is never copied into memory at parse
/// time.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<S> {
    pub subheader: S,
    pub info: ComponentInfo,
    pub(crate) extent: Option<DataExtent>,
}

impl<S> Segment<S> {
    fn new(subheader: S) -> Self {
        Self {
            subheader,
            info: ComponentInfo::default(),
            extent: None,
        }
    }

    /// Length of this segment's data in its source file, if parsed.
    pub fn data_length(&self) -> Option<u64> {
        self.extent.map(|extent| extent.length)
    }
}

pub type ImageSegment = Segment<ImageSubheader>;
pub type GraphicSegment = Segment<GraphicSubheader>;
pub type LabelSegment = Segment<LabelSubheader>;
pub type TextSegment = Segment<TextSubheader>;
pub type DesSegment = Segment<DesSubheader>;
pub type ResSegment = Segment<ResSubheader>;

// =============================================================================
// Record
// =============================================================================

/// The whole-file model.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    version: Version,
    pub header: FileHeader,
    pub(crate) images: Vec<ImageSegment>,
    pub(crate) graphics: Vec<GraphicSegment>,
    pub(crate) labels: Vec<LabelSegment>,
    pub(crate) texts: Vec<TextSegment>,
    pub(crate) data_extensions: Vec<DesSegment>,
    pub(crate) reserved_extensions: Vec<ResSegment>,
}

impl Record {
    /// An empty record for the given version.
    pub fn new(version: Version) -> Self {
        Self {
            version,
            header: FileHeader::new(version),
            images: Vec::new(),
            graphics: Vec::new(),
            labels: Vec::new(),
            texts: Vec::new(),
            data_extensions: Vec::new(),
            reserved_extensions: Vec::new(),
        }
    }

    /// The file format version.
    pub fn version(&self) -> Version {
        self.version
    }

    // -------------------------------------------------------------------------
    // Segment constructors
    // -------------------------------------------------------------------------

    /// Append a default image segment and return it for configuration.
    pub fn new_image_segment(&mut self) -> &mut ImageSegment {
        self.images
            .push(Segment::new(ImageSubheader::new(self.version)));
        self.images.last_mut().expect("just pushed")
    }

    /// Append a default graphic segment.
    pub fn new_graphic_segment(&mut self) -> &mut GraphicSegment {
        self.graphics
            .push(Segment::new(GraphicSubheader::new(self.version)));
        self.graphics.last_mut().expect("just pushed")
    }

    /// Append a default label segment.
    ///
    /// # Errors
    /// [`RecordError::Invariant`] for 2.1 records, which have no label
    /// segment class.
    pub fn new_label_segment(&mut self) -> Result<&mut LabelSegment, RecordError> {
        if !self.version.supports_labels() {
            return Err(RecordError::Invariant(
                "label segments do not exist in 2.1 files".to_string(),
            ));
        }
        self.labels.push(Segment::new(LabelSubheader::new()));
        Ok(self.labels.last_mut().expect("just pushed"))
    }

    /// Append a default text segment.
    pub fn new_text_segment(&mut self) -> &mut TextSegment {
        self.texts
            .push(Segment::new(TextSubheader::new(self.version)));
        self.texts.last_mut().expect("just pushed")
    }

    /// Append a default data extension segment.
    pub fn new_data_extension_segment(&mut self) -> &mut DesSegment {
        self.data_extensions
            .push(Segment::new(DesSubheader::new(self.version)));
        self.data_extensions.last_mut().expect("just pushed")
    }

    /// Append a default reserved extension segment.
    pub fn new_reserved_extension_segment(&mut self) -> &mut ResSegment {
        self.reserved_extensions
            .push(Segment::new(ResSubheader::new(self.version)));
        self.reserved_extensions.last_mut().expect("just pushed")
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn images(&self) -> &[ImageSegment] {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut [ImageSegment] {
        &mut self.images
    }

    pub fn graphics(&self) -> &[GraphicSegment] {
        &self.graphics
    }

    pub fn graphics_mut(&mut self) -> &mut [GraphicSegment] {
        &mut self.graphics
    }

    pub fn labels(&self) -> &[LabelSegment] {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut [LabelSegment] {
        &mut self.labels
    }

    pub fn texts(&self) -> &[TextSegment] {
        &self.texts
    }

    pub fn texts_mut(&mut self) -> &mut [TextSegment] {
        &mut self.texts
    }

    pub fn data_extensions(&self) -> &[DesSegment] {
        &self.data_extensions
    }

    pub fn data_extensions_mut(&mut self) -> &mut [DesSegment] {
        &mut self.data_extensions
    }

    pub fn reserved_extensions(&self) -> &[ResSegment] {
        &self.reserved_extensions
    }

    pub fn reserved_extensions_mut(&mut self) -> &mut [ResSegment] {
        &mut self.reserved_extensions
    }

    /// Number of segments of the given kind.
    pub fn segment_count(&self, kind: SegmentKind) -> usize {
        match kind {
            SegmentKind::Image => self.images.len(),
            SegmentKind::Graphic => self.graphics.len(),
            SegmentKind::Label => self.labels.len(),
            SegmentKind::Text => self.texts.len(),
            SegmentKind::DataExtension => self.data_extensions.len(),
            SegmentKind::ReservedExtension => self.reserved_extensions.len(),
        }
    }

    /// Segment counts for each class in canonical order.
    pub(crate) fn segment_counts(&self) -> [(SegmentKind, usize); 6] {
        SegmentKind::CANONICAL.map(|kind| (kind, self.segment_count(kind)))
    }

    /// Serialize the file header with zero length placeholders,
    /// reporting the placeholder offsets.
    pub(crate) fn serialize_header(&self) -> Result<(Vec<u8>, HeaderOffsets), RecordError> {
        self.header.serialize(self.segment_counts())
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Check the record's structural invariants.
    ///
    /// Verified before every write: version consistency, label absence
    /// for 2.1, and that every TRE overflow back-reference points at an
    /// existing overflow data extension segment.
    pub fn validate(&self) -> Result<(), RecordError> {
        if !self.version.supports_labels() && !self.labels.is_empty() {
            return Err(RecordError::Invariant(format!(
                "a 2.1 record holds {} label segments",
                self.labels.len()
            )));
        }

        let check_overflow = |what: &str, field: &Field| -> Result<(), RecordError> {
            let index = field.as_u64().map_err(RecordError::Field)?;
            if index == 0 {
                return Ok(());
            }
            let des = self
                .data_extensions
                .get(index as usize - 1)
                .ok_or_else(|| {
                    RecordError::Invariant(format!(
                        "{} overflow references data extension {} of {}",
                        what,
                        index,
                        self.data_extensions.len()
                    ))
                })?;
            if !des.subheader.is_tre_overflow() {
                return Err(RecordError::Invariant(format!(
                    "{} overflow references data extension {} which is not an overflow segment",
                    what, index
                )));
            }
            Ok(())
        };

        check_overflow("file header UDHD", &self.header.user_defined_overflow)?;
        check_overflow("file header XHD", &self.header.extended_overflow)?;
        for (index, segment) in self.images.iter().enumerate() {
            check_overflow(
                &format!("image {index} UDID"),
                &segment.subheader.user_defined_overflow,
            )?;
            check_overflow(
                &format!("image {index} IXSHD"),
                &segment.subheader.extended_overflow,
            )?;
        }
        for (index, segment) in self.graphics.iter().enumerate() {
            check_overflow(
                &format!("graphic {index} SXSHD"),
                &segment.subheader.extended_overflow,
            )?;
        }
        for (index, segment) in self.texts.iter().enumerate() {
            check_overflow(
                &format!("text {index} TXSHD"),
                &segment.subheader.extended_overflow,
            )?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
