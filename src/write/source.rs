//! Pull data sources for writing.
//!
//! A [`DataSource`] produces the bytes of one band (or one segment's
//! data) on demand. Sources over memory and over a handle window support
//! a start offset and a per-pixel skip, so a single interleaved buffer
//! can feed several band sources.
//!
//! Sources move into the writer on attach: the caller hands over
//! ownership and the writer drains them during its data pass.

use bytes::Bytes;

use crate::error::IoError;
use crate::io::IoHandle;

// =============================================================================
// DataSource
// =============================================================================

/// A pull source of bytes with a declared total size.
///
/// A source that produces fewer bytes than [`DataSource::total_size`]
/// declares fails the write with `ShortSource`.
pub trait DataSource: Send {
    /// Total bytes this source will produce.
    fn total_size(&self) -> u64;

    /// Produce up to `buf.len()` bytes, returning how many were written.
    /// Zero means the source is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;
}

// =============================================================================
// MemorySource
// =============================================================================

/// A source over an in-memory buffer, with optional pixel skipping.
///
/// Reads `pixel_bytes` at a time starting at `start`, stepping
/// `pixel_bytes + pixel_skip` through the buffer. A skip of zero streams
/// the buffer contiguously.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    start: usize,
    pixel_bytes: usize,
    pixel_skip: usize,
    /// Next pixel to produce
    pixel: u64,
    num_pixels: u64,
}

impl MemorySource {
    /// A skipping source over `data`.
    ///
    /// # Arguments
    /// * `data` - The backing buffer
    /// * `start` - Byte offset of the first pixel
    /// * `pixel_bytes` - Bytes per pixel
    /// * `pixel_skip` - Bytes skipped after each pixel
    pub fn new(data: impl Into<Bytes>, start: usize, pixel_bytes: usize, pixel_skip: usize) -> Self {
        let data = data.into();
        let stride = pixel_bytes + pixel_skip;
        let available = data.len().saturating_sub(start);
        let num_pixels = if stride == 0 || pixel_bytes == 0 {
            0
        } else {
            // A trailing pixel needs no skip after it
            ((available + pixel_skip) / stride) as u64
        };
        Self {
            data,
            start,
            pixel_bytes,
            pixel_skip,
            pixel: 0,
            num_pixels,
        }
    }

    /// A contiguous source over the whole buffer.
    pub fn contiguous(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = data.len();
        Self {
            data,
            start: 0,
            pixel_bytes: 1,
            pixel_skip: 0,
            pixel: 0,
            num_pixels: len as u64,
        }
    }
}

impl DataSource for MemorySource {
    fn total_size(&self) -> u64 {
        self.num_pixels * self.pixel_bytes as u64
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        if self.pixel_skip == 0 {
            // Contiguous fast path; take whole pixels only
            let produced = self.pixel * self.pixel_bytes as u64;
            let remaining = (self.total_size() - produced) as usize;
            let mut take = remaining.min(buf.len());
            take -= take % self.pixel_bytes.max(1);
            let from = self.start + produced as usize;
            buf[..take].copy_from_slice(&self.data[from..from + take]);
            self.pixel += (take / self.pixel_bytes.max(1)) as u64;
            return Ok(take);
        }

        let stride = self.pixel_bytes + self.pixel_skip;
        let mut written = 0;
        while self.pixel < self.num_pixels && written + self.pixel_bytes <= buf.len() {
            let from = self.start + self.pixel as usize * stride;
            buf[written..written + self.pixel_bytes]
                .copy_from_slice(&self.data[from..from + self.pixel_bytes]);
            written += self.pixel_bytes;
            self.pixel += 1;
        }
        Ok(written)
    }
}

// =============================================================================
// FileSource
// =============================================================================

/// A source over a window of an [`IoHandle`], with optional pixel
/// skipping.
pub struct FileSource {
    handle: IoHandle,
    start: u64,
    pixel_bytes: usize,
    pixel_skip: usize,
    pixel: u64,
    num_pixels: u64,
}

impl FileSource {
    /// A skipping source over a handle, from `start` to the end.
    pub fn new(
        handle: IoHandle,
        start: u64,
        pixel_bytes: usize,
        pixel_skip: usize,
    ) -> Result<Self, IoError> {
        let stride = (pixel_bytes + pixel_skip) as u64;
        let available = handle.size()?.saturating_sub(start);
        let num_pixels = if stride == 0 || pixel_bytes == 0 {
            0
        } else {
            (available + pixel_skip as u64) / stride
        };
        Ok(Self {
            handle,
            start,
            pixel_bytes,
            pixel_skip,
            pixel: 0,
            num_pixels,
        })
    }

    /// A contiguous source over an explicit window of a handle.
    ///
    /// This is the direct-copy path: it reproduces `length` bytes
    /// verbatim, mask tables and all.
    pub fn window(handle: IoHandle, offset: u64, length: u64) -> Self {
        Self {
            handle,
            start: offset,
            pixel_bytes: 1,
            pixel_skip: 0,
            pixel: 0,
            num_pixels: length,
        }
    }
}

impl DataSource for FileSource {
    fn total_size(&self) -> u64 {
        self.num_pixels * self.pixel_bytes as u64
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        if self.pixel_skip == 0 {
            let produced = self.pixel * self.pixel_bytes as u64;
            let remaining = (self.total_size() - produced) as usize;
            let mut take = remaining.min(buf.len());
            take -= take % self.pixel_bytes.max(1);
            if take == 0 {
                return Ok(0);
            }
            let bytes = self.handle.read_exact_at(self.start + produced, take)?;
            buf[..take].copy_from_slice(&bytes);
            self.pixel += (take / self.pixel_bytes.max(1)) as u64;
            return Ok(take);
        }

        let stride = (self.pixel_bytes + self.pixel_skip) as u64;
        let mut written = 0;
        while self.pixel < self.num_pixels && written + self.pixel_bytes <= buf.len() {
            let from = self.start + self.pixel * stride;
            let bytes = self.handle.read_exact_at(from, self.pixel_bytes)?;
            buf[written..written + self.pixel_bytes].copy_from_slice(&bytes);
            written += self.pixel_bytes;
            self.pixel += 1;
        }
        Ok(written)
    }
}

// =============================================================================
// ImageSource
// =============================================================================

/// An ordered list of band sources, one per band of an image segment.
#[derive(Default)]
pub struct ImageSource {
    bands: Vec<Box<dyn DataSource>>,
}

impl ImageSource {
    /// An image source with no bands yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a band source. Band order is attach order.
    pub fn add_band(&mut self, band: impl DataSource + 'static) {
        self.bands.push(Box::new(band));
    }

    /// Number of attached band sources.
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub(crate) fn bands_mut(&mut self) -> &mut [Box<dyn DataSource>] {
        &mut self.bands
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Drain a source to a vector through a small buffer.
    fn drain(source: &mut dyn DataSource) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 5];
        loop {
            let n = source.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn test_memory_contiguous() {
        let mut source = MemorySource::contiguous(vec![1u8, 2, 3, 4, 5, 6, 7]);
        assert_eq!(source.total_size(), 7);
        assert_eq!(drain(&mut source), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_memory_with_start() {
        let mut source = MemorySource::new(vec![9u8, 9, 1, 2, 3], 2, 1, 0);
        assert_eq!(source.total_size(), 3);
        assert_eq!(drain(&mut source), vec![1, 2, 3]);
    }

    #[test]
    fn test_memory_pixel_skip_deinterleaves() {
        // Two interleaved bands: a0 b0 a1 b1 a2 b2
        let data = vec![0xA0u8, 0xB0, 0xA1, 0xB1, 0xA2, 0xB2];
        let mut band_a = MemorySource::new(data.clone(), 0, 1, 1);
        let mut band_b = MemorySource::new(data, 1, 1, 1);
        assert_eq!(drain(&mut band_a), vec![0xA0, 0xA1, 0xA2]);
        assert_eq!(drain(&mut band_b), vec![0xB0, 0xB1, 0xB2]);
    }

    #[test]
    fn test_memory_multi_byte_pixels_with_skip() {
        // Pixels of 2 bytes with 2-byte gaps
        let data = vec![1u8, 2, 9, 9, 3, 4, 9, 9, 5, 6];
        let mut source = MemorySource::new(data, 0, 2, 2);
        assert_eq!(source.total_size(), 6);
        assert_eq!(drain(&mut source), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_file_window() {
        let handle = IoHandle::from_vec(b"xxPAYLOADyy".to_vec());
        let mut source = FileSource::window(handle, 2, 7);
        assert_eq!(source.total_size(), 7);
        assert_eq!(drain(&mut source), b"PAYLOAD".to_vec());
    }

    #[test]
    fn test_file_skipping() {
        let handle = IoHandle::from_vec(vec![1u8, 9, 2, 9, 3]);
        let mut source = FileSource::new(handle, 0, 1, 1).unwrap();
        assert_eq!(source.total_size(), 3);
        assert_eq!(drain(&mut source), vec![1, 2, 3]);
    }

    #[test]
    fn test_image_source_band_order() {
        let mut image = ImageSource::new();
        image.add_band(MemorySource::contiguous(vec![1u8]));
        image.add_band(MemorySource::contiguous(vec![2u8]));
        assert_eq!(image.band_count(), 2);

        let mut buf = [0u8; 1];
        image.bands_mut()[1].read(&mut buf).unwrap();
        assert_eq!(buf[0], 2);
    }
}
