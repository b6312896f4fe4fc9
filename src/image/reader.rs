//! Sub-windowed image reading.
//!
//! An [`ImageReader`] materializes pixel data for one image segment: it
//! maps a [`SubWindow`] onto the segment's block grid, fetches each
//! intersecting block once through an LRU block cache, de-interleaves
//! into per-band output buffers, and optionally feeds the result through
//! a down-sampler. Output is one contiguous byte run per requested band,
//! row-major, no padding.

use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tracing::debug;

use crate::cancel::CancelFlag;
use crate::error::FormatError;
use crate::image::layout::{BlockLayout, BlockMask, ImageMode};
use crate::image::window::{DownSample, SubWindow};
use crate::image::DecompressionRegistry;
use crate::io::IoHandle;
use crate::record::{DataExtent, ImageSubheader, SegmentKind};

/// Fetched block units kept hot across sub-window reads.
///
/// Sub-window requests that walk a region revisit the same blocks many
/// times; the cache turns those into single reads per block.
const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 64;

/// Cache key: (block index, band) for per-band fetch units, with the
/// band slot pinned for whole-block units.
type BlockKey = (u64, u32);

const WHOLE_BLOCK: u32 = u32::MAX;

// =============================================================================
// ImageReader
// =============================================================================

/// Streams sub-windowed pixel data for one image segment.
pub struct ImageReader {
    handle: IoHandle,
    layout: BlockLayout,
    mask: Option<BlockMask>,
    extent: DataExtent,
    index: usize,
    cache: LruCache<BlockKey, Bytes>,
    pad_pixel: Vec<u8>,
    cancel: Option<CancelFlag>,
}

impl ImageReader {
    /// Build a reader over a parsed image segment.
    ///
    /// Fails with [`FormatError::UnsupportedCompression`] when the
    /// segment's IC code is neither uncompressed ("NC"/"NM") nor covered
    /// by a registered decompression handler.
    pub(crate) fn new(
        handle: IoHandle,
        subheader: &ImageSubheader,
        extent: DataExtent,
        index: usize,
    ) -> Result<Self, FormatError> {
        let layout = BlockLayout::from_subheader(subheader, index)?;

        let compression = layout.compression.clone();
        let is_masked = compression == "NM" || compression.starts_with('M');
        if compression != "NC" && compression != "NM" {
            let registry = DecompressionRegistry::global_read();
            if !registry.can_handle(&compression) {
                return Err(FormatError::UnsupportedCompression {
                    code: compression,
                    kind: SegmentKind::Image,
                    index,
                });
            }
        }

        let mask = if is_masked {
            let mask_units = mask_units(&layout);
            Some(BlockMask::parse(&handle, extent.offset, mask_units)?)
        } else {
            None
        };

        let pad_pixel = mask
            .as_ref()
            .map(|mask| mask.pad_pixel.clone())
            .unwrap_or_default();

        debug!(
            "image reader over {} blocks ({} mode, {} bands)",
            layout.num_blocks(),
            layout.mode.code(),
            layout.num_bands
        );

        Ok(Self {
            handle,
            layout,
            mask,
            extent,
            index,
            cache: LruCache::new(NonZeroUsize::new(DEFAULT_BLOCK_CACHE_CAPACITY).unwrap()),
            pad_pixel,
            cancel: None,
        })
    }

    /// The decoded block geometry.
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Install a cooperative cancellation flag, checked between blocks.
    pub fn set_cancel_flag(&mut self, flag: CancelFlag) {
        self.cancel = Some(flag);
    }

    /// Read a sub-window, optionally down-sampled.
    ///
    /// Returns one buffer per entry in `window.bands`, each
    /// `output_rows × output_cols × bytes_per_pixel` bytes, row-major.
    pub fn read(
        &mut self,
        window: &SubWindow,
        downsampler: Option<&dyn DownSample>,
    ) -> Result<Vec<Vec<u8>>, FormatError> {
        self.validate_window(window)?;

        let bpp = self.layout.output_bytes_per_pixel();
        let mut bands_out = Vec::with_capacity(window.bands.len());
        for &band in &window.bands {
            let full = self.read_band_window(window, band)?;
            match downsampler {
                Some(ds) => {
                    let (out_rows, out_cols) = window.output_dims(Some(ds));
                    let mut reduced =
                        Vec::with_capacity(out_rows as usize * out_cols as usize * bpp);
                    ds.apply(
                        &full,
                        window.num_rows,
                        window.num_cols,
                        self.layout.pixel_format(),
                        &mut reduced,
                    )?;
                    bands_out.push(reduced);
                }
                None => bands_out.push(full),
            }
        }
        Ok(bands_out)
    }

    fn validate_window(&self, window: &SubWindow) -> Result<(), FormatError> {
        let invalid = |message: String| FormatError::InvalidWindow {
            kind: SegmentKind::Image,
            index: self.index,
            message,
        };
        if window.num_rows == 0 || window.num_cols == 0 {
            return Err(invalid("window is empty".to_string()));
        }
        let end_row = window.start_row as u64 + window.num_rows as u64;
        let end_col = window.start_col as u64 + window.num_cols as u64;
        if end_row > self.layout.num_rows as u64 || end_col > self.layout.num_cols as u64 {
            return Err(invalid(format!(
                "window {}x{}+{}+{} exceeds image {}x{}",
                window.num_rows,
                window.num_cols,
                window.start_row,
                window.start_col,
                self.layout.num_rows,
                self.layout.num_cols
            )));
        }
        if window.bands.is_empty() {
            return Err(invalid("window names no bands".to_string()));
        }
        for &band in &window.bands {
            if band >= self.layout.num_bands {
                return Err(invalid(format!(
                    "band {} out of range ({} bands)",
                    band, self.layout.num_bands
                )));
            }
        }
        Ok(())
    }

    /// Read one band's full-resolution window.
    fn read_band_window(&mut self, window: &SubWindow, band: u32) -> Result<Vec<u8>, FormatError> {
        let bpp = self.layout.output_bytes_per_pixel();
        let mut out = vec![0u8; window.num_rows as usize * window.num_cols as usize * bpp];

        let block_width = self.layout.block_width;
        let block_height = self.layout.block_height;
        let first_block_row = window.start_row / block_height;
        let last_block_row = (window.start_row + window.num_rows - 1) / block_height;
        let first_block_col = window.start_col / block_width;
        let last_block_col = (window.start_col + window.num_cols - 1) / block_width;

        for block_row in first_block_row..=last_block_row.min(self.layout.blocks_per_col - 1) {
            for block_col in first_block_col..=last_block_col.min(self.layout.blocks_per_row - 1)
            {
                if let Some(ref cancel) = self.cancel {
                    if cancel.is_cancelled() {
                        return Err(FormatError::Cancelled);
                    }
                }
                let unit = self.fetch_unit(self.layout.block_index(block_row, block_col), band)?;

                // Intersection of the window with this block, in image
                // coordinates
                let block_top = block_row * block_height;
                let block_left = block_col * block_width;
                let row_from = window.start_row.max(block_top);
                let row_to = (window.start_row + window.num_rows).min(block_top + block_height);
                let col_from = window.start_col.max(block_left);
                let col_to = (window.start_col + window.num_cols).min(block_left + block_width);

                for row in row_from..row_to {
                    for col in col_from..col_to {
                        let out_index = ((row - window.start_row) as usize
                            * window.num_cols as usize
                            + (col - window.start_col) as usize)
                            * bpp;
                        self.layout.extract_pixel(
                            &unit,
                            row - block_top,
                            col - block_left,
                            band,
                            &mut out[out_index..out_index + bpp],
                        );
                    }
                }
            }
        }
        Ok(out)
    }

    /// Fetch one block unit, through the cache.
    fn fetch_unit(&mut self, block_idx: u64, band: u32) -> Result<Bytes, FormatError> {
        let band_key = if self.layout.fetch_is_per_band() {
            band
        } else {
            WHOLE_BLOCK
        };
        let key = (block_idx, band_key);
        if let Some(unit) = self.cache.get(&key) {
            return Ok(unit.clone());
        }

        let unit = self.fetch_unit_uncached(block_idx, band)?;
        self.cache.put(key, unit.clone());
        Ok(unit)
    }

    fn fetch_unit_uncached(&mut self, block_idx: u64, band: u32) -> Result<Bytes, FormatError> {
        let (arith_offset, unit_len) = self.layout.fetch_extent(block_idx, band);

        let relative = match &self.mask {
            None => arith_offset,
            Some(mask) => {
                let unit_index = self.mask_unit_index(block_idx, band);
                if mask.has_block_records() {
                    match mask.unit_offset(unit_index) {
                        // Absent block: reads as the pad pixel
                        None => return Ok(self.pad_unit(unit_len)),
                        Some(rel) => {
                            // For block-interleaved storage the mask
                            // record names the whole block; step to the
                            // requested band inside it
                            if self.layout.mode == ImageMode::BlockInterleave {
                                rel + band as u64 * self.layout.band_block_bytes()
                            } else {
                                rel
                            }
                        }
                    }
                } else {
                    mask.data_offset as u64 + arith_offset
                }
            }
        };

        if self.is_compressed() {
            return self.fetch_compressed_unit(relative, unit_len);
        }

        if relative + unit_len > self.extent.length {
            return Err(FormatError::LengthMismatch {
                kind: SegmentKind::Image,
                index: self.index,
                message: format!(
                    "block at {} + {} bytes runs past the {}-byte data area",
                    relative, unit_len, self.extent.length
                ),
            });
        }
        Ok(self
            .handle
            .read_exact_at(self.extent.offset + relative, unit_len as usize)?)
    }

    fn is_compressed(&self) -> bool {
        self.layout.compression != "NC" && self.layout.compression != "NM"
    }

    /// Decompress one stored unit through the registered handler.
    ///
    /// The stored length runs to the next stored unit (mask order) or to
    /// the end of the data area.
    fn fetch_compressed_unit(&mut self, relative: u64, unit_len: u64) -> Result<Bytes, FormatError> {
        let stored_end = self
            .mask
            .as_ref()
            .filter(|mask| mask.has_block_records())
            .map(|mask| {
                mask.block_offsets
                    .iter()
                    .filter(|&&offset| offset != crate::image::layout::BLOCK_NOT_RECORDED)
                    .map(|&offset| mask.data_offset as u64 + offset as u64)
                    .filter(|&offset| offset > relative)
                    .min()
                    .unwrap_or(self.extent.length)
            })
            .unwrap_or(self.extent.length);
        let stored_len = (stored_end - relative) as usize;
        let compressed = self
            .handle
            .read_exact_at(self.extent.offset + relative, stored_len)?;

        let registry = DecompressionRegistry::global_read();
        let handler = registry.handler(&self.layout.compression).ok_or_else(|| {
            FormatError::UnsupportedCompression {
                code: self.layout.compression.clone(),
                kind: SegmentKind::Image,
                index: self.index,
            }
        })?;
        let decompressed = handler.decompress(&compressed, unit_len as usize)?;
        Ok(Bytes::from(decompressed))
    }

    /// A synthetic unit filled with the pad pixel.
    fn pad_unit(&self, unit_len: u64) -> Bytes {
        if self.pad_pixel.is_empty() {
            return Bytes::from(vec![0u8; unit_len as usize]);
        }
        let mut unit = Vec::with_capacity(unit_len as usize);
        while unit.len() < unit_len as usize {
            let take = self.pad_pixel.len().min(unit_len as usize - unit.len());
            unit.extend_from_slice(&self.pad_pixel[..take]);
        }
        Bytes::from(unit)
    }

    /// Index of a fetch unit in the block mask.
    fn mask_unit_index(&self, block_idx: u64, band: u32) -> u64 {
        match self.layout.mode {
            ImageMode::BandSequential => band as u64 * self.layout.num_blocks() + block_idx,
            _ => block_idx,
        }
    }
}

impl std::fmt::Debug for ImageReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageReader")
            .field("index", &self.index)
            .field("mode", &self.layout.mode)
            .field("blocks", &self.layout.num_blocks())
            .finish()
    }
}

/// Number of mask records the block mask carries for this layout.
pub(crate) fn mask_units(layout: &BlockLayout) -> u64 {
    match layout.mode {
        ImageMode::BandSequential => layout.num_blocks() * layout.num_bands as u64,
        _ => layout.num_blocks(),
    }
}

// =============================================================================
// Tests
// =============================================================================
