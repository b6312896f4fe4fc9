mod handle;

pub use handle::{AccessMode, CreateMode, IoHandle};
