mod source;
mod writer;

pub use source::{DataSource, FileSource, ImageSource, MemorySource};
pub use writer::Writer;
