//! Fixed-capacity append buffer over a memory-mapped file.

use crate::error::{StorageError, StorageResult};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Byte written over the whole region by [`MemoryMappedOutputStream::clear`].
///
/// `0xFF` never starts a valid UTF-8 sequence, so bytes left over from an
/// earlier generation of the buffer can never decode as journal text.
pub const SENTINEL: u8 = 0xFF;

/// A bounded, durable append buffer backed by a memory-mapped file.
///
/// Writes land in the OS page cache as soon as they are copied into the
/// mapping, so they survive the process being killed without any explicit
/// flush. [`flush`](Self::flush) additionally forces the pages to disk, which
/// only matters for power loss.
///
/// # Invariants
///
/// - The backing file is exactly `capacity` bytes long
/// - `position() <= capacity()`
/// - `write` either copies all bytes or none of them
///
/// # Example
///
/// ```no_run
/// use journaldoc_storage::MemoryMappedOutputStream;
/// use std::path::Path;
///
/// let mut stream = MemoryMappedOutputStream::open(Path::new("state.journal"), 4096).unwrap();
/// stream.clear().unwrap();
/// stream.write(b"entry\0").unwrap();
/// stream.close().unwrap();
/// ```
#[derive(Debug)]
pub struct MemoryMappedOutputStream {
    path: PathBuf,
    /// Kept open for the lifetime of the mapping.
    _file: File,
    map: MmapMut,
    cursor: usize,
}

impl MemoryMappedOutputStream {
    /// Opens (or creates) the file at `path`, sizes it to `capacity` bytes
    /// and maps it read-write.
    ///
    /// The write cursor starts at 0. Existing file contents are left in place
    /// until the caller [`clear`](Self::clear)s the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is zero, or if the file cannot be
    /// created, resized or mapped.
    pub fn open(path: &Path, capacity: usize) -> StorageResult<Self> {
        if capacity == 0 {
            return Err(StorageError::InvalidCapacity(capacity));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(capacity as u64)?;

        // SAFETY: the file is owned by this stream for as long as the mapping
        // lives. A single writer process owns a journal file at a time, and
        // readers in later processes only look at it after this one is gone.
        #[allow(unsafe_code)]
        let map = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
            map,
            cursor: 0,
        })
    }

    /// Appends `bytes` at the write cursor.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BufferOverflow`] without writing anything if
    /// `bytes` does not fit in the remaining capacity.
    pub fn write(&mut self, bytes: &[u8]) -> StorageResult<()> {
        let remaining = self.remaining();
        if bytes.len() > remaining {
            return Err(StorageError::BufferOverflow {
                requested: bytes.len(),
                remaining,
            });
        }

        let end = self.cursor + bytes.len();
        self.map[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
        Ok(())
    }

    /// Resets the cursor to 0 and overwrites the entire region with
    /// [`SENTINEL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping cannot be flushed afterwards.
    pub fn clear(&mut self) -> StorageResult<()> {
        self.map.fill(SENTINEL);
        self.cursor = 0;
        self.map.flush_async()?;
        Ok(())
    }

    /// Forces all mapped pages to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the `msync` fails.
    pub fn flush(&mut self) -> StorageResult<()> {
        self.map.flush()?;
        Ok(())
    }

    /// Flushes and unmaps the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails. The mapping is released
    /// either way.
    pub fn close(mut self) -> StorageResult<()> {
        self.flush()
    }

    /// Returns the current write cursor.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Returns the fixed size of the buffer in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.map.len()
    }

    /// Returns the number of bytes that can still be written.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.cursor
    }

    /// Returns the bytes written since the last clear.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.map[..self.cursor]
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MemoryMappedOutputStream {
    fn drop(&mut self) {
        let _ = self.map.flush();
    }
}
