//! File parsing.
//!
//! The reader materializes a [`Record`] from a handle in one pass:
//!
//! 1. The first nine bytes discriminate the version; everything after is
//!    read against that version's field tables.
//! 2. The file header's counts drive the (subheader length, data length)
//!    table.
//! 3. Segments follow in canonical order (images, graphics, labels,
//!    texts, data extensions, reserved extensions). Each subheader is
//!    parsed from exactly its declared byte count; a parse that consumes
//!    a different amount fails naming the segment kind and index.
//! 4. Segment data is never copied: its file extent is recorded so the
//!    per-segment readers can stream it later.

use std::io::SeekFrom;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::FormatError;
use crate::image::ImageReader;
use crate::io::IoHandle;
use crate::read::segment::SegmentReader;
use crate::record::{
    DataExtent, DesSubheader, FileHeader, GraphicSubheader, HandleCursor, HeaderLengths,
    ImageSubheader, LabelSubheader, Record, ResSubheader, SegmentKind, TextSubheader, Version,
};
use crate::tre::TreRegistry;

// =============================================================================
// Reader
// =============================================================================

/// Parses a file into a [`Record`] and hands out per-segment readers.
///
/// The reader holds a non-owning clone of the caller's handle; closing
/// the handle fails any outstanding reader on its next operation.
pub struct Reader {
    handle: IoHandle,
    record: Option<Record>,
}

impl Reader {
    /// A reader over an open handle. Nothing is read until
    /// [`Reader::read`].
    pub fn new(handle: IoHandle) -> Self {
        Self {
            handle,
            record: None,
        }
    }

    /// Probe a file's version without parsing it.
    pub fn version_of(path: impl AsRef<Path>) -> Result<Version, FormatError> {
        let handle = IoHandle::open_read(path)?;
        let signature = handle.read_exact_at(0, Version::SIGNATURE_LEN).map_err(|_| {
            FormatError::Truncated {
                message: "file is shorter than the nine-byte version signature".to_string(),
            }
        })?;
        handle.close();
        Version::from_signature(&signature)
    }

    /// Parse the file, resolving TREs through the process-wide registry.
    pub fn read(&mut self) -> Result<&Record, FormatError> {
        let registry = TreRegistry::global_read();
        self.read_with_registry(&registry)
    }

    /// Parse the file against an explicit TRE registry.
    pub fn read_with_registry(&mut self, registry: &TreRegistry) -> Result<&Record, FormatError> {
        self.handle.seek(SeekFrom::Start(0))?;
        let mut cursor = HandleCursor::new(&self.handle);

        let signature = cursor.take_bytes(Version::SIGNATURE_LEN, "version signature")?;
        let version = Version::from_signature(&signature)?;
        debug!("parsing {} file {}", version, self.handle.name());

        let (header, lengths) = FileHeader::parse(version, &mut cursor, registry)?;
        let header_end = cursor.pos()?;
        if lengths.header_length != 0 && lengths.header_length != header_end {
            warn!(
                "file header declares {} bytes but spans {}",
                lengths.header_length, header_end
            );
        }

        let mut record = Record::new(version);
        record.header = header;
        let mut offset = header_end;
        offset = self.parse_images(&mut record, &lengths, offset, registry)?;
        offset = self.parse_graphics(&mut record, &lengths, offset, registry)?;
        offset = self.parse_labels(&mut record, &lengths, offset, registry)?;
        offset = self.parse_texts(&mut record, &lengths, offset, registry)?;
        offset = self.parse_data_extensions(&mut record, &lengths, offset, registry)?;
        offset = self.parse_reserved_extensions(&mut record, &lengths, offset)?;

        if lengths.file_length != offset {
            warn!(
                "file header declares {} total bytes but segments end at {}",
                lengths.file_length, offset
            );
        }

        validate_overflow_refs(&record)?;

        self.record = Some(record);
        Ok(self.record.as_ref().expect("just stored"))
    }

    /// The parsed record, if [`Reader::read`] has succeeded.
    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    /// Mutable access to the parsed record.
    pub fn record_mut(&mut self) -> Option<&mut Record> {
        self.record.as_mut()
    }

    /// Consume the reader, keeping the record.
    pub fn into_record(self) -> Option<Record> {
        self.record
    }

    // -------------------------------------------------------------------------
    // Per-segment readers
    // -------------------------------------------------------------------------

    /// A pixel reader for an image segment.
    pub fn image_reader(&self, index: usize) -> Result<ImageReader, FormatError> {
        let record = self.record.as_ref().ok_or(FormatError::NotParsed)?;
        let segment = record
            .images()
            .get(index)
            .ok_or_else(|| missing(SegmentKind::Image, index, record.images().len()))?;
        let extent = segment.extent.unwrap_or_default();
        ImageReader::new(self.handle.clone(), &segment.subheader, extent, index)
    }

    /// A byte reader for a graphic segment's data.
    pub fn graphic_reader(&self, index: usize) -> Result<SegmentReader, FormatError> {
        self.segment_reader(SegmentKind::Graphic, index)
    }

    /// A byte reader for a label segment's data.
    pub fn label_reader(&self, index: usize) -> Result<SegmentReader, FormatError> {
        self.segment_reader(SegmentKind::Label, index)
    }

    /// A byte reader for a text segment's data.
    pub fn text_reader(&self, index: usize) -> Result<SegmentReader, FormatError> {
        self.segment_reader(SegmentKind::Text, index)
    }

    /// A byte reader for a data extension segment's data.
    pub fn des_reader(&self, index: usize) -> Result<SegmentReader, FormatError> {
        self.segment_reader(SegmentKind::DataExtension, index)
    }

    /// A byte reader for a reserved extension segment's data.
    pub fn res_reader(&self, index: usize) -> Result<SegmentReader, FormatError> {
        self.segment_reader(SegmentKind::ReservedExtension, index)
    }

    fn segment_reader(
        &self,
        kind: SegmentKind,
        index: usize,
    ) -> Result<SegmentReader, FormatError> {
        let record = self.record.as_ref().ok_or(FormatError::NotParsed)?;
        let extent = match kind {
            SegmentKind::Graphic => record.graphics().get(index).and_then(|s| s.extent),
            SegmentKind::Label => record.labels().get(index).and_then(|s| s.extent),
            SegmentKind::Text => record.texts().get(index).and_then(|s| s.extent),
            SegmentKind::DataExtension => {
                record.data_extensions().get(index).and_then(|s| s.extent)
            }
            SegmentKind::ReservedExtension => record
                .reserved_extensions()
                .get(index)
                .and_then(|s| s.extent),
            SegmentKind::Image => None,
        };
        let extent = extent.ok_or_else(|| missing(kind, index, record.segment_count(kind)))?;
        Ok(SegmentReader::new(self.handle.clone(), extent))
    }

    // -------------------------------------------------------------------------
    // Segment parsing
    // -------------------------------------------------------------------------

    fn parse_images(
        &self,
        record: &mut Record,
        lengths: &HeaderLengths,
        mut offset: u64,
        registry: &TreRegistry,
    ) -> Result<u64, FormatError> {
        for (index, &(subheader_len, data_len)) in lengths.images.iter().enumerate() {
            let buf = self.subheader_bytes(SegmentKind::Image, index, offset, subheader_len)?;
            let (subheader, consumed) =
                ImageSubheader::parse(record.version(), &buf, registry)
                    .map_err(|err| in_segment(err, SegmentKind::Image, index))?;
            check_consumed(SegmentKind::Image, index, consumed, subheader_len)?;
            let segment = record.new_image_segment();
            segment.subheader = subheader;
            segment.info.subheader_length = subheader_len;
            segment.info.data_length = data_len;
            segment.extent = Some(DataExtent {
                offset: offset + subheader_len,
                length: data_len,
            });
            offset += subheader_len + data_len;
        }
        Ok(offset)
    }

    fn parse_graphics(
        &self,
        record: &mut Record,
        lengths: &HeaderLengths,
        mut offset: u64,
        registry: &TreRegistry,
    ) -> Result<u64, FormatError> {
        for (index, &(subheader_len, data_len)) in lengths.graphics.iter().enumerate() {
            let buf = self.subheader_bytes(SegmentKind::Graphic, index, offset, subheader_len)?;
            let (subheader, consumed) =
                GraphicSubheader::parse(record.version(), &buf, registry)
                    .map_err(|err| in_segment(err, SegmentKind::Graphic, index))?;
            check_consumed(SegmentKind::Graphic, index, consumed, subheader_len)?;
            let segment = record.new_graphic_segment();
            segment.subheader = subheader;
            segment.info.subheader_length = subheader_len;
            segment.info.data_length = data_len;
            segment.extent = Some(DataExtent {
                offset: offset + subheader_len,
                length: data_len,
            });
            offset += subheader_len + data_len;
        }
        Ok(offset)
    }

    fn parse_labels(
        &self,
        record: &mut Record,
        lengths: &HeaderLengths,
        mut offset: u64,
        registry: &TreRegistry,
    ) -> Result<u64, FormatError> {
        for (index, &(subheader_len, data_len)) in lengths.labels.iter().enumerate() {
            let buf = self.subheader_bytes(SegmentKind::Label, index, offset, subheader_len)?;
            let (subheader, consumed) = LabelSubheader::parse(&buf, registry)
                .map_err(|err| in_segment(err, SegmentKind::Label, index))?;
            check_consumed(SegmentKind::Label, index, consumed, subheader_len)?;
            let segment = record
                .new_label_segment()
                .map_err(|_| FormatError::LengthMismatch {
                    kind: SegmentKind::Label,
                    index,
                    message: "label segment in a file version without them".to_string(),
                })?;
            segment.subheader = subheader;
            segment.info.subheader_length = subheader_len;
            segment.info.data_length = data_len;
            segment.extent = Some(DataExtent {
                offset: offset + subheader_len,
                length: data_len,
            });
            offset += subheader_len + data_len;
        }
        Ok(offset)
    }

    fn parse_texts(
        &self,
        record: &mut Record,
        lengths: &HeaderLengths,
        mut offset: u64,
        registry: &TreRegistry,
    ) -> Result<u64, FormatError> {
        for (index, &(subheader_len, data_len)) in lengths.texts.iter().enumerate() {
            let buf = self.subheader_bytes(SegmentKind::Text, index, offset, subheader_len)?;
            let (subheader, consumed) = TextSubheader::parse(record.version(), &buf, registry)
                .map_err(|err| in_segment(err, SegmentKind::Text, index))?;
            check_consumed(SegmentKind::Text, index, consumed, subheader_len)?;
            let segment = record.new_text_segment();
            segment.subheader = subheader;
            segment.info.subheader_length = subheader_len;
            segment.info.data_length = data_len;
            segment.extent = Some(DataExtent {
                offset: offset + subheader_len,
                length: data_len,
            });
            offset += subheader_len + data_len;
        }
        Ok(offset)
    }

    fn parse_data_extensions(
        &self,
        record: &mut Record,
        lengths: &HeaderLengths,
        mut offset: u64,
        registry: &TreRegistry,
    ) -> Result<u64, FormatError> {
        for (index, &(subheader_len, data_len)) in lengths.data_extensions.iter().enumerate() {
            let buf =
                self.subheader_bytes(SegmentKind::DataExtension, index, offset, subheader_len)?;
            let (subheader, consumed) = DesSubheader::parse(record.version(), &buf, registry)
                .map_err(|err| in_segment(err, SegmentKind::DataExtension, index))?;
            check_consumed(SegmentKind::DataExtension, index, consumed, subheader_len)?;
            let segment = record.new_data_extension_segment();
            segment.subheader = subheader;
            segment.info.subheader_length = subheader_len;
            segment.info.data_length = data_len;
            segment.extent = Some(DataExtent {
                offset: offset + subheader_len,
                length: data_len,
            });
            offset += subheader_len + data_len;
        }
        Ok(offset)
    }

    fn parse_reserved_extensions(
        &self,
        record: &mut Record,
        lengths: &HeaderLengths,
        mut offset: u64,
    ) -> Result<u64, FormatError> {
        for (index, &(subheader_len, data_len)) in lengths.reserved_extensions.iter().enumerate()
        {
            let buf = self.subheader_bytes(
                SegmentKind::ReservedExtension,
                index,
                offset,
                subheader_len,
            )?;
            let (subheader, consumed) = ResSubheader::parse(record.version(), &buf)
                .map_err(|err| in_segment(err, SegmentKind::ReservedExtension, index))?;
            check_consumed(SegmentKind::ReservedExtension, index, consumed, subheader_len)?;
            let segment = record.new_reserved_extension_segment();
            segment.subheader = subheader;
            segment.info.subheader_length = subheader_len;
            segment.info.data_length = data_len;
            segment.extent = Some(DataExtent {
                offset: offset + subheader_len,
                length: data_len,
            });
            offset += subheader_len + data_len;
        }
        Ok(offset)
    }

    fn subheader_bytes(
        &self,
        kind: SegmentKind,
        index: usize,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, FormatError> {
        self.handle
            .read_exact_at(offset, len as usize)
            .map(|bytes| bytes.to_vec())
            .map_err(|_| FormatError::LengthMismatch {
                kind,
                index,
                message: format!(
                    "subheader declares {} bytes at offset {} past the end of the file",
                    len, offset
                ),
            })
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("handle", &self.handle)
            .field("parsed", &self.record.is_some())
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn missing(kind: SegmentKind, index: usize, count: usize) -> FormatError {
    FormatError::LengthMismatch {
        kind,
        index,
        message: format!("segment index out of range ({count} segments)"),
    }
}

fn in_segment(err: FormatError, kind: SegmentKind, index: usize) -> FormatError {
    match err {
        // Already carries its context
        err @ (FormatError::LengthMismatch { .. } | FormatError::UnsupportedLayout { .. }) => err,
        other => FormatError::LengthMismatch {
            kind,
            index,
            message: other.to_string(),
        },
    }
}

fn check_consumed(
    kind: SegmentKind,
    index: usize,
    consumed: usize,
    declared: u64,
) -> Result<(), FormatError> {
    if consumed as u64 != declared {
        return Err(FormatError::LengthMismatch {
            kind,
            index,
            message: format!(
                "subheader spans {} bytes but the component table declares {}",
                consumed, declared
            ),
        });
    }
    Ok(())
}

/// Check every TRE overflow back-reference against the DES list.
fn validate_overflow_refs(record: &Record) -> Result<(), FormatError> {
    let des_count = record.data_extensions().len();
    let check = |kind: SegmentKind,
                 index: usize,
                 field: &crate::record::Field|
     -> Result<(), FormatError> {
        let des_index = field.as_u64().unwrap_or(0) as usize;
        if des_index != 0 && des_index > des_count {
            return Err(FormatError::BadOverflowRef {
                kind,
                index,
                des_index,
            });
        }
        Ok(())
    };

    for (index, segment) in record.images().iter().enumerate() {
        check(
            SegmentKind::Image,
            index,
            &segment.subheader.user_defined_overflow,
        )?;
        check(
            SegmentKind::Image,
            index,
            &segment.subheader.extended_overflow,
        )?;
    }
    for (index, segment) in record.graphics().iter().enumerate() {
        check(
            SegmentKind::Graphic,
            index,
            &segment.subheader.extended_overflow,
        )?;
    }
    for (index, segment) in record.texts().iter().enumerate() {
        check(
            SegmentKind::Text,
            index,
            &segment.subheader.extended_overflow,
        )?;
    }
    Ok(())
}
