//! Streaming access to a segment's data area.

use std::io::SeekFrom;

use bytes::Bytes;

use crate::error::IoError;
use crate::io::IoHandle;
use crate::record::DataExtent;

/// A windowed, cursor-based reader over one segment's data.
///
/// Graphic, label, text, data-extension, and reserved-extension data are
/// opaque to the core; this reader exposes the bytes without copying them
/// at parse time. The window is fixed at construction; reads past it
/// fail with [`IoError::RangeOutOfBounds`].
#[derive(Debug)]
pub struct SegmentReader {
    handle: IoHandle,
    extent: DataExtent,
    pos: u64,
}

impl SegmentReader {
    pub(crate) fn new(handle: IoHandle, extent: DataExtent) -> Self {
        Self {
            handle,
            extent,
            pos: 0,
        }
    }

    /// Total size of the segment data in bytes.
    pub fn size(&self) -> u64 {
        self.extent.length
    }

    /// Current position within the segment data.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Move the cursor within the segment window.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
            SeekFrom::End(delta) => self.extent.length as i64 + delta,
        };
        if target < 0 {
            return Err(IoError::Os(format!(
                "seek before start of segment data (to {target})"
            )));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    /// Read exactly `len` bytes from the current position.
    pub fn read(&mut self, len: usize) -> Result<Bytes, IoError> {
        if self.pos + len as u64 > self.extent.length {
            return Err(IoError::RangeOutOfBounds {
                offset: self.pos,
                requested: len as u64,
                size: self.extent.length,
            });
        }
        let bytes = self
            .handle
            .read_exact_at(self.extent.offset + self.pos, len)?;
        self.pos += len as u64;
        Ok(bytes)
    }

    /// Read from the current position to the end of the segment.
    pub fn read_to_end(&mut self) -> Result<Bytes, IoError> {
        let remaining = (self.extent.length - self.pos) as usize;
        self.read(remaining)
    }
}
