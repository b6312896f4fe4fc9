//! File assembly.
//!
//! Writing is a two-pass streaming operation with a final back-fill:
//!
//! - **prepare**: validate the record, serialize the file header with
//!   zero placeholders for every length field (recording their offsets),
//!   and serialize every subheader (subheader sizes are fully determined
//!   by their field tables and attached TREs).
//! - **write**: stream each segment in canonical order: subheader bytes,
//!   then data pulled from the attached source, counting as it goes.
//! - **back-fill**: seek to each recorded placeholder and rewrite it with
//!   the final zero-padded value (LISH/LI and friends, then FL and HL).
//!
//! A source that produces fewer bytes than it declared fails the write
//! with `ShortSource`; an I/O failure aborts and leaves the output
//! truncated; there is no partial rollback.

use std::collections::HashMap;
use std::io::SeekFrom;

use tracing::debug;

use crate::cancel::CancelFlag;
use crate::error::{RecordError, WriteError};
use crate::image::{mask_units, BlockLayout, BlockMask, ImageMode, PixelJustification};
use crate::io::IoHandle;
use crate::record::{Record, SegmentKind};
use crate::write::source::{DataSource, ImageSource};

/// Streaming buffer size for segment data.
const STREAM_BUF_SIZE: usize = 64 * 1024;

// =============================================================================
// Writer
// =============================================================================

/// Assembles a file from a [`Record`] plus attached data sources.
pub struct Writer {
    handle: IoHandle,
    record: Option<Record>,
    header_len: u64,
    header_offsets: Option<crate::record::HeaderOffsets>,
    /// Serialized subheaders in canonical order
    subheaders: Vec<(SegmentKind, usize, Vec<u8>)>,
    image_sources: HashMap<usize, ImageSource>,
    image_streams: HashMap<usize, Box<dyn DataSource>>,
    segment_sources: HashMap<(SegmentKind, usize), Box<dyn DataSource>>,
    pad_pixels: HashMap<usize, Vec<u8>>,
    cancel: Option<CancelFlag>,
}

impl Writer {
    /// A writer over an output handle.
    pub fn new(handle: IoHandle) -> Self {
        Self {
            handle,
            record: None,
            header_len: 0,
            header_offsets: None,
            subheaders: Vec::new(),
            image_sources: HashMap::new(),
            image_streams: HashMap::new(),
            segment_sources: HashMap::new(),
            pad_pixels: HashMap::new(),
            cancel: None,
        }
    }

    /// Install a cooperative cancellation flag, checked between
    /// segments.
    pub fn set_cancel_flag(&mut self, flag: CancelFlag) {
        self.cancel = Some(flag);
    }

    // -------------------------------------------------------------------------
    // Source attachment (move-on-attach, at most one per segment)
    // -------------------------------------------------------------------------

    /// Attach per-band pixel sources for an image segment. The writer
    /// interleaves and blocks them per the subheader's image mode.
    pub fn attach_image_source(
        &mut self,
        index: usize,
        source: ImageSource,
    ) -> Result<(), WriteError> {
        if self.image_sources.contains_key(&index) || self.image_streams.contains_key(&index) {
            return Err(WriteError::AlreadyAttached {
                kind: SegmentKind::Image,
                index,
            });
        }
        self.image_sources.insert(index, source);
        Ok(())
    }

    /// Attach a raw stream for an image segment's entire data area
    /// (mask table included), bypassing the blocker. This is the
    /// byte-exact copy path for round-tripping parsed files.
    pub fn attach_image_stream(
        &mut self,
        index: usize,
        source: impl DataSource + 'static,
    ) -> Result<(), WriteError> {
        if self.image_sources.contains_key(&index) || self.image_streams.contains_key(&index) {
            return Err(WriteError::AlreadyAttached {
                kind: SegmentKind::Image,
                index,
            });
        }
        self.image_streams.insert(index, Box::new(source));
        Ok(())
    }

    /// Attach a data source for a graphic segment.
    pub fn attach_graphic_source(
        &mut self,
        index: usize,
        source: impl DataSource + 'static,
    ) -> Result<(), WriteError> {
        self.attach_segment_source(SegmentKind::Graphic, index, Box::new(source))
    }

    /// Attach a data source for a label segment.
    pub fn attach_label_source(
        &mut self,
        index: usize,
        source: impl DataSource + 'static,
    ) -> Result<(), WriteError> {
        self.attach_segment_source(SegmentKind::Label, index, Box::new(source))
    }

    /// Attach a data source for a text segment.
    pub fn attach_text_source(
        &mut self,
        index: usize,
        source: impl DataSource + 'static,
    ) -> Result<(), WriteError> {
        self.attach_segment_source(SegmentKind::Text, index, Box::new(source))
    }

    /// Attach a data source for a data extension segment.
    pub fn attach_des_source(
        &mut self,
        index: usize,
        source: impl DataSource + 'static,
    ) -> Result<(), WriteError> {
        self.attach_segment_source(SegmentKind::DataExtension, index, Box::new(source))
    }

    /// Attach a data source for a reserved extension segment.
    pub fn attach_res_source(
        &mut self,
        index: usize,
        source: impl DataSource + 'static,
    ) -> Result<(), WriteError> {
        self.attach_segment_source(SegmentKind::ReservedExtension, index, Box::new(source))
    }

    fn attach_segment_source(
        &mut self,
        kind: SegmentKind,
        index: usize,
        source: Box<dyn DataSource>,
    ) -> Result<(), WriteError> {
        let key = (kind, index);
        if self.segment_sources.contains_key(&key) {
            return Err(WriteError::AlreadyAttached { kind, index });
        }
        self.segment_sources.insert(key, source);
        Ok(())
    }

    /// Set the pad pixel emitted for block area outside an image's
    /// dimensions (and recorded in the mask table for masked modes).
    pub fn set_pad_pixel(&mut self, index: usize, value: Vec<u8>) {
        self.pad_pixels.insert(index, value);
    }

    // -------------------------------------------------------------------------
    // Pass 0: prepare
    // -------------------------------------------------------------------------

    /// Validate the record and write the file header with zero length
    /// placeholders. Subheaders are serialized now, since their sizes
    /// are fully determined, and written during [`Writer::write`].
    pub fn prepare(&mut self, record: &Record) -> Result<(), WriteError> {
        record.validate()?;

        let (header_bytes, offsets) = record.serialize_header()?;
        self.handle.seek(SeekFrom::Start(0))?;
        self.handle.write(&header_bytes)?;
        self.header_len = header_bytes.len() as u64;
        self.header_offsets = Some(offsets);

        let mut subheaders = Vec::new();
        for (index, segment) in record.images().iter().enumerate() {
            subheaders.push((SegmentKind::Image, index, segment.subheader.serialize()?));
        }
        for (index, segment) in record.graphics().iter().enumerate() {
            subheaders.push((SegmentKind::Graphic, index, segment.subheader.serialize()?));
        }
        for (index, segment) in record.labels().iter().enumerate() {
            subheaders.push((SegmentKind::Label, index, segment.subheader.serialize()?));
        }
        for (index, segment) in record.texts().iter().enumerate() {
            subheaders.push((SegmentKind::Text, index, segment.subheader.serialize()?));
        }
        for (index, segment) in record.data_extensions().iter().enumerate() {
            subheaders.push((
                SegmentKind::DataExtension,
                index,
                segment.subheader.serialize()?,
            ));
        }
        for (index, segment) in record.reserved_extensions().iter().enumerate() {
            subheaders.push((
                SegmentKind::ReservedExtension,
                index,
                segment.subheader.serialize()?,
            ));
        }
        self.subheaders = subheaders;
        self.record = Some(record.clone());

        debug!(
            "prepared {} byte header and {} subheaders",
            self.header_len,
            self.subheaders.len()
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Pass 1 + 2: write and back-fill
    // -------------------------------------------------------------------------

    /// Stream every segment and back-fill the length fields.
    pub fn write(&mut self) -> Result<(), WriteError> {
        let record = self.record.take().ok_or(WriteError::NotPrepared)?;
        let offsets = self
            .header_offsets
            .take()
            .ok_or(WriteError::NotPrepared)?;
        let subheaders = std::mem::take(&mut self.subheaders);

        self.handle.seek(SeekFrom::Start(self.header_len))?;
        let mut written: Vec<(u64, u64)> = Vec::with_capacity(subheaders.len());
        for (kind, index, subheader_bytes) in &subheaders {
            if let Some(ref cancel) = self.cancel {
                if cancel.is_cancelled() {
                    return Err(WriteError::Cancelled);
                }
            }
            self.handle.write(subheader_bytes)?;
            let data_len = match kind {
                SegmentKind::Image => self.write_image_data(&record, *index)?,
                kind => self.write_segment_data(*kind, *index)?,
            };
            check_field_capacity(*kind, *index, subheader_bytes.len() as u64, data_len)?;
            written.push((subheader_bytes.len() as u64, data_len));
        }
        let file_length = self.handle.tell()?;

        // Back-fill the recorded placeholders
        for (entry, &(subheader_len, data_len)) in
            offsets.segment_lengths.iter().zip(written.iter())
        {
            self.write_number(
                entry.subheader_length as u64,
                subheader_len,
                entry.kind.subheader_length_width(),
            )?;
            self.write_number(
                entry.data_length as u64,
                data_len,
                entry.kind.data_length_width(),
            )?;
        }
        self.write_number(offsets.file_length as u64, file_length, 12)?;
        self.write_number(offsets.header_length as u64, self.header_len, 6)?;

        // A zero compliance level means "measure it for me"
        if record.header.compliance_level.as_u64().unwrap_or(0) == 0 {
            let clevel = measure_complexity(&record, file_length);
            self.write_number(offsets.clevel as u64, clevel, 2)?;
        }

        debug!("wrote {} bytes to {}", file_length, self.handle.name());
        Ok(())
    }

    fn write_number(&self, offset: u64, value: u64, width: usize) -> Result<(), WriteError> {
        let text = format!("{:0width$}", value, width = width);
        if text.len() > width {
            return Err(WriteError::Record(RecordError::Invariant(format!(
                "value {} does not fit a {}-digit length field",
                value, width
            ))));
        }
        self.handle.write_at(offset, text.as_bytes())?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Segment data
    // -------------------------------------------------------------------------

    fn write_segment_data(&mut self, kind: SegmentKind, index: usize) -> Result<u64, WriteError> {
        match self.segment_sources.remove(&(kind, index)) {
            Some(mut source) => stream_source(&self.handle, source.as_mut(), kind, index),
            // A segment without a source has no data
            None => Ok(0),
        }
    }

    fn write_image_data(&mut self, record: &Record, index: usize) -> Result<u64, WriteError> {
        if let Some(mut stream) = self.image_streams.remove(&index) {
            return stream_source(&self.handle, stream.as_mut(), SegmentKind::Image, index);
        }
        let Some(mut image_source) = self.image_sources.remove(&index) else {
            return Err(WriteError::MissingSource {
                kind: SegmentKind::Image,
                index,
            });
        };

        let subheader = &record.images()[index].subheader;
        let layout = BlockLayout::from_subheader(subheader, index)?;
        if image_source.band_count() != layout.num_bands as usize {
            return Err(WriteError::Record(RecordError::Invariant(format!(
                "image {} declares {} bands but the source provides {}",
                index,
                layout.num_bands,
                image_source.band_count()
            ))));
        }

        // Pull every band fully; the blocker needs random access to
        // compose blocks in file order
        let per_band = layout.num_rows as u64
            * layout.num_cols as u64
            * if layout.is_sub_byte() {
                1
            } else {
                layout.stored_bytes_per_pixel() as u64
            };
        let mut bands: Vec<Vec<u8>> = Vec::with_capacity(layout.num_bands as usize);
        for source in image_source.bands_mut() {
            let mut band = vec![0u8; per_band as usize];
            let mut produced = 0usize;
            loop {
                let n = source.read(&mut band[produced..])?;
                if n == 0 {
                    break;
                }
                produced += n;
                if produced == band.len() {
                    break;
                }
            }
            if (produced as u64) < per_band {
                return Err(WriteError::ShortSource {
                    kind: SegmentKind::Image,
                    index,
                    declared: per_band,
                    produced: produced as u64,
                });
            }
            bands.push(band);
        }

        let pad = self.pad_pixels.get(&index).cloned().unwrap_or_default();
        let data = compose_image_data(&layout, &bands, &pad);
        self.handle.write(&data)?;
        Ok(data.len() as u64)
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("handle", &self.handle)
            .field("prepared", &self.record.is_some())
            .finish()
    }
}

// =============================================================================
// Streaming
// =============================================================================

/// Drain a source to the handle, enforcing its declared size.
fn stream_source(
    handle: &IoHandle,
    source: &mut dyn DataSource,
    kind: SegmentKind,
    index: usize,
) -> Result<u64, WriteError> {
    let declared = source.total_size();
    let mut buf = vec![0u8; STREAM_BUF_SIZE];
    let mut produced = 0u64;
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        handle.write(&buf[..n])?;
        produced += n as u64;
    }
    if produced < declared {
        return Err(WriteError::ShortSource {
            kind,
            index,
            declared,
            produced,
        });
    }
    if produced > declared {
        return Err(WriteError::Record(RecordError::Invariant(format!(
            "{} segment {} source declared {} bytes but produced {}",
            kind, index, declared, produced
        ))));
    }
    Ok(produced)
}

/// Confirm the measured lengths fit their header fields.
fn check_field_capacity(
    kind: SegmentKind,
    index: usize,
    subheader_len: u64,
    data_len: u64,
) -> Result<(), WriteError> {
    let subheader_max = 10u64.pow(kind.subheader_length_width() as u32) - 1;
    let data_max = 10u64.pow(kind.data_length_width() as u32) - 1;
    if subheader_len > subheader_max || data_len > data_max {
        return Err(WriteError::Record(RecordError::Invariant(format!(
            "{} segment {} lengths ({}, {}) exceed their header fields",
            kind, index, subheader_len, data_len
        ))));
    }
    Ok(())
}

// =============================================================================
// Image blocking
// =============================================================================

/// Assemble band buffers into the segment's stored byte order, with a
/// leading mask table for masked images.
fn compose_image_data(layout: &BlockLayout, bands: &[Vec<u8>], pad: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    if layout.compression == "NM" {
        let unit_bytes = match layout.mode {
            ImageMode::BandSequential => layout.band_block_bytes(),
            _ => layout.full_block_bytes(),
        };
        out.extend_from_slice(&BlockMask::serialize_sequential(
            mask_units(layout),
            unit_bytes,
            pad,
        ));
    }

    match layout.mode {
        ImageMode::BandSequential => {
            for band in 0..layout.num_bands {
                for block_idx in 0..layout.num_blocks() {
                    emit_band_block(layout, bands, band, block_idx, pad, &mut out);
                }
            }
        }
        ImageMode::BlockInterleave => {
            for block_idx in 0..layout.num_blocks() {
                for band in 0..layout.num_bands {
                    emit_band_block(layout, bands, band, block_idx, pad, &mut out);
                }
            }
        }
        ImageMode::PixelInterleave => {
            for block_idx in 0..layout.num_blocks() {
                emit_pixel_interleaved_block(layout, bands, block_idx, pad, &mut out);
            }
        }
        ImageMode::RowInterleave => {
            for block_idx in 0..layout.num_blocks() {
                emit_row_interleaved_block(layout, bands, block_idx, pad, &mut out);
            }
        }
    }
    out
}

/// The pad byte run for one pixel.
fn pad_pixel(pad: &[u8], bpp: usize, scratch: &mut Vec<u8>) {
    scratch.clear();
    if pad.is_empty() {
        scratch.resize(bpp, 0);
        return;
    }
    while scratch.len() < bpp {
        let take = pad.len().min(bpp - scratch.len());
        scratch.extend_from_slice(&pad[..take]);
    }
}

/// One band's pixels for one block, packed for sub-byte depths.
fn emit_band_block(
    layout: &BlockLayout,
    bands: &[Vec<u8>],
    band: u32,
    block_idx: u64,
    pad: &[u8],
    out: &mut Vec<u8>,
) {
    let block_row = (block_idx / layout.blocks_per_row as u64) as u32;
    let block_col = (block_idx % layout.blocks_per_row as u64) as u32;
    let top = block_row * layout.block_height;
    let left = block_col * layout.block_width;
    let band_buf = &bands[band as usize];

    if layout.is_sub_byte() {
        let mut bit_acc: u16 = 0;
        let mut bit_count: u8 = 0;
        let nbpp = layout.bits_per_pixel as u8;
        for r in 0..layout.block_height {
            for c in 0..layout.block_width {
                let row = top + r;
                let col = left + c;
                let value = if row < layout.num_rows && col < layout.num_cols {
                    band_buf[row as usize * layout.num_cols as usize + col as usize]
                } else {
                    pad.first().copied().unwrap_or(0)
                };
                let stored = match layout.justification {
                    PixelJustification::Left => {
                        (value as u16) << (layout.bits_per_pixel - layout.actual_bits.min(layout.bits_per_pixel))
                    }
                    PixelJustification::Right => value as u16,
                } & ((1u16 << nbpp) - 1);
                bit_acc = (bit_acc << nbpp) | stored;
                bit_count += nbpp;
                while bit_count >= 8 {
                    out.push((bit_acc >> (bit_count - 8)) as u8);
                    bit_count -= 8;
                }
            }
        }
        if bit_count > 0 {
            out.push((bit_acc << (8 - bit_count)) as u8);
        }
        return;
    }

    let bpp = layout.stored_bytes_per_pixel();
    let mut pad_bytes = Vec::new();
    pad_pixel(pad, bpp, &mut pad_bytes);
    for r in 0..layout.block_height {
        for c in 0..layout.block_width {
            let row = top + r;
            let col = left + c;
            if row < layout.num_rows && col < layout.num_cols {
                let from = (row as usize * layout.num_cols as usize + col as usize) * bpp;
                out.extend_from_slice(&band_buf[from..from + bpp]);
            } else {
                out.extend_from_slice(&pad_bytes);
            }
        }
    }
}

fn emit_pixel_interleaved_block(
    layout: &BlockLayout,
    bands: &[Vec<u8>],
    block_idx: u64,
    pad: &[u8],
    out: &mut Vec<u8>,
) {
    let block_row = (block_idx / layout.blocks_per_row as u64) as u32;
    let block_col = (block_idx % layout.blocks_per_row as u64) as u32;
    let top = block_row * layout.block_height;
    let left = block_col * layout.block_width;
    let bpp = layout.stored_bytes_per_pixel();
    let mut pad_bytes = Vec::new();
    pad_pixel(pad, bpp, &mut pad_bytes);

    for r in 0..layout.block_height {
        for c in 0..layout.block_width {
            let row = top + r;
            let col = left + c;
            for band_buf in bands {
                if row < layout.num_rows && col < layout.num_cols {
                    let from = (row as usize * layout.num_cols as usize + col as usize) * bpp;
                    out.extend_from_slice(&band_buf[from..from + bpp]);
                } else {
                    out.extend_from_slice(&pad_bytes);
                }
            }
        }
    }
}

fn emit_row_interleaved_block(
    layout: &BlockLayout,
    bands: &[Vec<u8>],
    block_idx: u64,
    pad: &[u8],
    out: &mut Vec<u8>,
) {
    let block_row = (block_idx / layout.blocks_per_row as u64) as u32;
    let block_col = (block_idx % layout.blocks_per_row as u64) as u32;
    let top = block_row * layout.block_height;
    let left = block_col * layout.block_width;
    let bpp = layout.stored_bytes_per_pixel();
    let mut pad_bytes = Vec::new();
    pad_pixel(pad, bpp, &mut pad_bytes);

    for r in 0..layout.block_height {
        for band_buf in bands {
            for c in 0..layout.block_width {
                let row = top + r;
                let col = left + c;
                if row < layout.num_rows && col < layout.num_cols {
                    let from = (row as usize * layout.num_cols as usize + col as usize) * bpp;
                    out.extend_from_slice(&band_buf[from..from + bpp]);
                } else {
                    out.extend_from_slice(&pad_bytes);
                }
            }
        }
    }
}

/// Measure the compliance level the way the format's complexity rules
/// bucket files: by the largest image dimension and the total length.
fn measure_complexity(record: &Record, file_length: u64) -> u64 {
    const MB: u64 = 1024 * 1024;
    let max_dim = record
        .images()
        .iter()
        .filter_map(|segment| {
            let rows = segment.subheader.num_rows.as_u64().ok()?;
            let cols = segment.subheader.num_cols.as_u64().ok()?;
            Some(rows.max(cols))
        })
        .max()
        .unwrap_or(0);

    if max_dim <= 2048 && file_length < 50 * MB {
        3
    } else if max_dim <= 8192 && file_length < 1024 * MB {
        5
    } else if max_dim <= 65_536 && file_length < 2048 * MB {
        6
    } else {
        7
    }
}

// =============================================================================
// Tests
// =============================================================================
