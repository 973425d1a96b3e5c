//! Byte sources an index can be opened on.
//!
//! The reader only ever needs positioned reads, so an index file can live
//! behind a shared mutex (the owner of a dictionary typically keeps one file
//! handle for its index and article data) or be memory-mapped.

use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Positioned, read-only access to index bytes
pub trait IndexStorage: Send + Sync {
    /// Fill `buf` with the bytes starting at `offset`
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Total number of bytes available
    fn len(&self) -> io::Result<u64>;

    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// An index file behind a mutex shared with other users of the same handle.
///
/// Every read is a seek plus a read done under the lock; the lock is never
/// held across reads.
#[derive(Clone)]
pub struct FileStorage {
    file: Arc<Mutex<File>>,
}

impl FileStorage {
    pub fn new(file: Arc<Mutex<File>>) -> Self {
        Self { file }
    }

    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::new(Arc::new(Mutex::new(File::open(path)?))))
    }

    /// The shared handle, for callers that read other data from the same file
    pub fn handle(&self) -> Arc<Mutex<File>> {
        Arc::clone(&self.file)
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("index file mutex poisoned"))
    }
}

impl IndexStorage for FileStorage {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.lock()?.metadata()?.len())
    }
}

/// A read-only memory map of an index file
pub struct MmapStorage {
    map: Mmap,
}

impl MmapStorage {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        // The index is write-once; nothing modifies the file while mapped
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }
}

impl IndexStorage for MmapStorage {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        copy_range(&self.map, offset, buf)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.map.len() as u64)
    }
}

/// Index bytes held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    bytes: Vec<u8>,
}

impl MemoryStorage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl IndexStorage for MemoryStorage {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        copy_range(&self.bytes, offset, buf)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.bytes.len() as u64)
    }
}

fn copy_range(src: &[u8], offset: u64, buf: &mut [u8]) -> io::Result<()> {
    let start = usize::try_from(offset).map_err(|_| io::ErrorKind::UnexpectedEof)?;
    let end = start
        .checked_add(buf.len())
        .filter(|&end| end <= src.len())
        .ok_or(io::ErrorKind::UnexpectedEof)?;
    buf.copy_from_slice(&src[start..end]);
    Ok(())
}
