//! Seekable byte channel abstraction.
//!
//! Readers and writers in this crate operate on an [`IoHandle`], which hides
//! whether bytes live in a file on disk or in a memory buffer. A handle is a
//! cheap clone over shared state, so a `Reader` and the per-segment readers
//! it hands out can all reference the same channel; closing the handle
//! poisons every clone and the next operation on any of them fails with
//! [`IoError::HandleClosed`].
//!
//! The channel is synchronous. A handle belongs to at most one active
//! reader or writer at a time; concurrent reads of the same file require
//! independent handles.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use crate::error::IoError;

// =============================================================================
// Open Modes
// =============================================================================

/// Access mode for opening a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read operations only
    ReadOnly,
    /// Write operations only
    WriteOnly,
    /// Both read and write operations
    ReadWrite,
}

/// Creation behavior for opening a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Open an existing file; fail if it does not exist
    OpenExisting,
    /// Create the file if it does not exist
    Create,
    /// Create the file, truncating any existing contents
    Truncate,
}

// =============================================================================
// IoHandle
// =============================================================================

/// The storage behind a handle.
enum Backend {
    File(File),
    Memory(Vec<u8>),
}

struct HandleState {
    backend: Backend,
    /// Current cursor position for sequential read/write
    pos: u64,
    closed: bool,
}

/// A seekable byte channel over a file or a memory buffer.
///
/// Cloning an `IoHandle` yields another reference to the same channel and
/// cursor. The cursor is shared: a `seek` through one clone moves it for
/// all clones.
#[derive(Clone)]
pub struct IoHandle {
    state: Arc<Mutex<HandleState>>,
    name: Arc<String>,
}

impl IoHandle {
    /// Open a file-backed handle.
    ///
    /// # Arguments
    /// * `path` - File to open
    /// * `access` - Read, write, or both
    /// * `create` - Whether to create or truncate the file
    pub fn open(
        path: impl AsRef<Path>,
        access: AccessMode,
        create: CreateMode,
    ) -> Result<Self, IoError> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        match access {
            AccessMode::ReadOnly => options.read(true),
            AccessMode::WriteOnly => options.write(true),
            AccessMode::ReadWrite => options.read(true).write(true),
        };
        match create {
            CreateMode::OpenExisting => {}
            CreateMode::Create => {
                options.create(true);
            }
            CreateMode::Truncate => {
                options.create(true).truncate(true);
            }
        }
        let file = options.open(path)?;
        Ok(Self {
            state: Arc::new(Mutex::new(HandleState {
                backend: Backend::File(file),
                pos: 0,
                closed: false,
            })),
            name: Arc::new(path.display().to_string()),
        })
    }

    /// Open an existing file read-only. Shorthand for the common case.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self, IoError> {
        Self::open(path, AccessMode::ReadOnly, CreateMode::OpenExisting)
    }

    /// Create (or truncate) a file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, IoError> {
        Self::open(path, AccessMode::ReadWrite, CreateMode::Truncate)
    }

    /// Create an empty memory-backed handle.
    pub fn memory() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a memory-backed handle over existing bytes.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            state: Arc::new(Mutex::new(HandleState {
                backend: Backend::Memory(data),
                pos: 0,
                closed: false,
            })),
            name: Arc::new("memory".to_string()),
        }
    }

    /// A name for this channel, for logging and error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_open<'a>(
        &self,
        guard: &'a mut MutexGuard<'_, HandleState>,
    ) -> Result<&'a mut HandleState, IoError> {
        if guard.closed {
            return Err(IoError::HandleClosed(self.name.to_string()));
        }
        Ok(guard)
    }

    /// Read exactly `len` bytes from the current cursor position.
    pub fn read(&self, len: usize) -> Result<Bytes, IoError> {
        let mut guard = self.lock();
        let state = self.check_open(&mut guard)?;
        let pos = state.pos;
        let bytes = read_at(&mut state.backend, pos, len)?;
        state.pos += len as u64;
        Ok(bytes)
    }

    /// Read exactly `len` bytes starting at `offset`, without moving the
    /// cursor.
    pub fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let mut guard = self.lock();
        let state = self.check_open(&mut guard)?;
        read_at(&mut state.backend, offset, len)
    }

    /// Write all of `buf` at the current cursor position.
    pub fn write(&self, buf: &[u8]) -> Result<(), IoError> {
        let mut guard = self.lock();
        let state = self.check_open(&mut guard)?;
        let pos = state.pos;
        write_at(&mut state.backend, pos, buf)?;
        state.pos += buf.len() as u64;
        Ok(())
    }

    /// Write all of `buf` starting at `offset`, without moving the cursor.
    ///
    /// Used by the writer's length back-fill pass.
    pub fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), IoError> {
        let mut guard = self.lock();
        let state = self.check_open(&mut guard)?;
        write_at(&mut state.backend, offset, buf)
    }

    /// Move the cursor. Returns the new absolute position.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64, IoError> {
        let mut guard = self.lock();
        let state = self.check_open(&mut guard)?;
        let size = backend_size(&state.backend)?;
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => state.pos as i64 + delta,
            SeekFrom::End(delta) => size as i64 + delta,
        };
        if new_pos < 0 {
            return Err(IoError::Os(format!(
                "seek before start of {} (to {})",
                self.name, new_pos
            )));
        }
        state.pos = new_pos as u64;
        Ok(state.pos)
    }

    /// Current cursor position.
    pub fn tell(&self) -> Result<u64, IoError> {
        let mut guard = self.lock();
        let state = self.check_open(&mut guard)?;
        Ok(state.pos)
    }

    /// Total size of the channel in bytes.
    pub fn size(&self) -> Result<u64, IoError> {
        let mut guard = self.lock();
        let state = self.check_open(&mut guard)?;
        backend_size(&state.backend)
    }

    /// Close the channel. Every clone of this handle is closed too; any
    /// subsequent operation fails with [`IoError::HandleClosed`].
    ///
    /// Closing an already-closed handle is a no-op.
    pub fn close(&self) {
        let mut guard = self.lock();
        guard.closed = true;
    }

    /// Whether this handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Copy out the full contents of a memory-backed handle.
    ///
    /// Returns `None` for file-backed handles.
    pub fn memory_contents(&self) -> Option<Vec<u8>> {
        let guard = self.lock();
        match &guard.backend {
            Backend::Memory(data) => Some(data.clone()),
            Backend::File(_) => None,
        }
    }
}

impl std::fmt::Debug for IoHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoHandle")
            .field("name", &self.name)
            .field("closed", &self.lock().closed)
            .finish()
    }
}

// =============================================================================
// Backend operations
// =============================================================================

fn backend_size(backend: &Backend) -> Result<u64, IoError> {
    match backend {
        Backend::File(file) => Ok(file.metadata()?.len()),
        Backend::Memory(data) => Ok(data.len() as u64),
    }
}

fn read_at(backend: &mut Backend, offset: u64, len: usize) -> Result<Bytes, IoError> {
    let size = backend_size(backend)?;
    if offset + len as u64 > size {
        return Err(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size,
        });
    }
    match backend {
        Backend::File(file) => {
            file.seek(SeekFrom::Start(offset))?;
            let mut buf = vec![0u8; len];
            file.read_exact(&mut buf)?;
            Ok(Bytes::from(buf))
        }
        Backend::Memory(data) => {
            let start = offset as usize;
            Ok(Bytes::copy_from_slice(&data[start..start + len]))
        }
    }
}

fn write_at(backend: &mut Backend, offset: u64, buf: &[u8]) -> Result<(), IoError> {
    match backend {
        Backend::File(file) => {
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(buf)?;
            Ok(())
        }
        Backend::Memory(data) => {
            let start = offset as usize;
            let end = start + buf.len();
            if end > data.len() {
                data.resize(end, 0);
            }
            data[start..end].copy_from_slice(buf);
            Ok(())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write_roundtrip() {
        let handle = IoHandle::memory();
        handle.write(b"hello world").unwrap();
        assert_eq!(handle.tell().unwrap(), 11);
        assert_eq!(handle.size().unwrap(), 11);

        handle.seek(SeekFrom::Start(6)).unwrap();
        let bytes = handle.read(5).unwrap();
        assert_eq!(&bytes[..], b"world");
    }

    #[test]
    fn test_memory_positioned_ops_leave_cursor() {
        let handle = IoHandle::from_vec(b"0123456789".to_vec());
        handle.seek(SeekFrom::Start(3)).unwrap();

        let bytes = handle.read_exact_at(5, 3).unwrap();
        assert_eq!(&bytes[..], b"567");
        assert_eq!(handle.tell().unwrap(), 3);

        handle.write_at(0, b"ab").unwrap();
        assert_eq!(handle.tell().unwrap(), 3);
        assert_eq!(&handle.read_exact_at(0, 3).unwrap()[..], b"ab2");
    }

    #[test]
    fn test_memory_write_extends() {
        let handle = IoHandle::memory();
        handle.write_at(4, b"xy").unwrap();
        assert_eq!(handle.size().unwrap(), 6);
        // Gap is zero-filled
        assert_eq!(&handle.read_exact_at(0, 6).unwrap()[..], b"\0\0\0\0xy");
    }

    #[test]
    fn test_read_out_of_bounds() {
        let handle = IoHandle::from_vec(vec![1, 2, 3]);
        let result = handle.read_exact_at(1, 5);
        assert!(matches!(
            result,
            Err(IoError::RangeOutOfBounds {
                offset: 1,
                requested: 5,
                size: 3
            })
        ));
    }

    #[test]
    fn test_seek_from_end() {
        let handle = IoHandle::from_vec(b"0123456789".to_vec());
        let pos = handle.seek(SeekFrom::End(-4)).unwrap();
        assert_eq!(pos, 6);
        assert_eq!(&handle.read(4).unwrap()[..], b"6789");
    }

    #[test]
    fn test_seek_before_start_fails() {
        let handle = IoHandle::from_vec(vec![0; 4]);
        assert!(handle.seek(SeekFrom::Current(-1)).is_err());
    }

    #[test]
    fn test_close_poisons_all_clones() {
        let handle = IoHandle::from_vec(vec![1, 2, 3, 4]);
        let derived = handle.clone();

        derived.read(2).unwrap();
        handle.close();

        let result = derived.read(1);
        assert!(matches!(result, Err(IoError::HandleClosed(_))));
        assert!(handle.is_closed());
    }

    #[test]
    fn test_close_is_idempotent() {
        let handle = IoHandle::memory();
        handle.close();
        handle.close();
        assert!(handle.is_closed());
    }

    #[test]
    fn test_file_backed_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handle.bin");

        let handle = IoHandle::create(&path).unwrap();
        handle.write(b"NITF02.10").unwrap();
        handle.write_at(4, b"99").unwrap();
        handle.close();

        let handle = IoHandle::open_read(&path).unwrap();
        assert_eq!(handle.size().unwrap(), 9);
        assert_eq!(&handle.read(9).unwrap()[..], b"NITF99.10");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let result = IoHandle::open_read("/definitely/not/here.ntf");
        assert!(matches!(result, Err(IoError::Os(_))));
    }
}
