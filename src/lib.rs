//! # nitf-io
//!
//! A reader/writer for NITF 2.0 and 2.1 files: a tagged, length-prefixed,
//! multi-segment binary container for imagery, graphics, text, and
//! arbitrary data extensions.
//!
//! ## Features
//!
//! - **Full file model**: a [`Record`] owns typed subheaders for every
//!   segment class, with field-level padding and justification rules
//! - **Streaming reads**: pixel and segment data are never copied at
//!   parse time; per-segment readers stream from the handle on demand
//! - **Sub-windowed pixel access**: rectangle × band-list reads with
//!   block-cache-backed de-interleaving and optional down-sampling
//! - **TRE plugin registry**: tagged extensions decode through JSON
//!   layout descriptors discovered in `NITF_PLUGIN_PATH`; unknown tags
//!   round-trip verbatim as raw bytes
//! - **Two-pass writing**: headers go out with zero length placeholders
//!   that are back-filled once every segment's real size is known
//!
//! ## Architecture
//!
//! - [`io`] - seekable byte channel over files or memory
//! - [`record`] - fields, security groups, subheaders, the [`Record`]
//! - [`tre`] - tagged record extensions and their plugin registry
//! - [`image`] - block layout, sub-windows, down-samplers, pixel reads
//! - [`read`] - the file parser and per-segment readers
//! - [`write`] - data sources and the two-pass writer
//! - [`config`] - CLI configuration types
//!
//! ## Example
//!
//! ```no_run
//! use nitf_io::{IoHandle, Reader, SubWindow};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = IoHandle::open_read("scene.ntf")?;
//!     let mut reader = Reader::new(handle);
//!     let record = reader.read()?;
//!     println!("{} image segment(s)", record.images().len());
//!
//!     let window = SubWindow::new(0, 0, 512, 512, vec![0]);
//!     let mut image = reader.image_reader(0)?;
//!     let bands = image.read(&window, None)?;
//!     println!("read {} bytes", bands[0].len());
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod image;
pub mod io;
pub mod read;
pub mod record;
pub mod tre;
pub mod write;

// Re-export commonly used types
pub use cancel::CancelFlag;
pub use error::{FieldError, FormatError, IoError, RecordError, TreError, WriteError};
pub use image::{
    BlockDecompressor, BlockLayout, DecompressionRegistry, DownSample, ImageMode, ImageReader,
    MaxDownSample, PixelFormat, PixelJustification, PixelSkip, PixelValueType, SubWindow,
};
pub use io::{AccessMode, CreateMode, IoHandle};
pub use read::{Reader, SegmentReader};
pub use record::{
    BandInfo, ComponentInfo, DesSubheader, Extensions, Field, FieldKind, FileHeader,
    GraphicSubheader, ImageSubheader, LabelSubheader, Record, ResSubheader, SecurityGroup,
    SegmentKind, TextSubheader, Version,
};
pub use tre::{Tre, TreDescriptor, TreRegistry};
pub use write::{DataSource, FileSource, ImageSource, MemorySource, Writer};

use std::path::Path;

/// Open and parse a file in one call, returning the reader (for
/// per-segment access) and a copy of its record.
pub fn read(path: impl AsRef<Path>) -> Result<(Reader, Record), FormatError> {
    let handle = IoHandle::open_read(path)?;
    let mut reader = Reader::new(handle);
    let record = reader.read()?.clone();
    Ok((reader, record))
}
