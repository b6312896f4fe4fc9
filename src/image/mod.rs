//! Image pixel access.
//!
//! This module turns an image segment's block-structured pixel area into
//! per-band, row-major byte runs:
//!
//! - [`BlockLayout`]: the geometry decoded from the subheader (block
//!   grid, interleave mode, bit depth, compression code)
//! - [`SubWindow`] + [`DownSample`]: what to read and how to reduce it
//! - [`ImageReader`]: the read engine, with an LRU block cache and
//!   block-mask support for masked images
//! - [`DecompressionRegistry`]: plug-in point for compressed IC codes,
//!   following the same discipline as the TRE registry; it ships empty,
//!   so compressed images fail with `UnsupportedCompression` unless the
//!   embedding application registers a handler

mod layout;
mod reader;
mod window;

pub use layout::{
    BlockLayout, BlockMask, ImageMode, PixelFormat, PixelJustification, PixelValueType,
    BLOCK_NOT_RECORDED,
};
pub use reader::ImageReader;
pub use window::{DownSample, MaxDownSample, PixelSkip, SubWindow};

pub(crate) use reader::mask_units;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard};

use crate::error::FormatError;

// =============================================================================
// Decompression handlers
// =============================================================================

/// A block decompressor for one compression code (e.g. "C3" or "M4").
pub trait BlockDecompressor: Send + Sync {
    /// Decompress one stored block into exactly `expected_len` bytes of
    /// block-ordered pixel data.
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>, FormatError>;
}

/// Process-wide store of decompression handlers keyed by IC code.
#[derive(Default)]
pub struct DecompressionRegistry {
    handlers: HashMap<String, Arc<dyn BlockDecompressor>>,
}

impl DecompressionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a compression code.
    pub fn register(&mut self, code: impl Into<String>, handler: Arc<dyn BlockDecompressor>) {
        self.handlers.insert(code.into(), handler);
    }

    /// Whether a handler is registered for this code.
    pub fn can_handle(&self, code: &str) -> bool {
        self.handlers.contains_key(code)
    }

    /// The handler for a code, if any.
    pub fn handler(&self, code: &str) -> Option<Arc<dyn BlockDecompressor>> {
        self.handlers.get(code).cloned()
    }

    /// Remove every handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// The process-wide registry. Registration must happen before any
    /// reader is active; lookups are read-only thereafter.
    pub fn global() -> &'static RwLock<DecompressionRegistry> {
        static GLOBAL: OnceLock<RwLock<DecompressionRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| RwLock::new(DecompressionRegistry::new()))
    }

    /// Read access to the process-wide registry.
    pub fn global_read() -> RwLockReadGuard<'static, DecompressionRegistry> {
        match Self::global().read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
