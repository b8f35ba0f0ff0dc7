use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use log::error;

use crate::error::{FsError, Result};

/// Raw block device. Transfers are whole blocks at block-aligned positions.
pub trait BlockDevice: Send + Sync {
    /// Size of a single transfer unit in bytes.
    fn block_size(&self) -> usize {
        crate::config::DEFAULT_BLOCK_SIZE
    }

    /// Total device capacity in bytes.
    fn capacity(&self) -> usize;

    /// Reads `buf.len() / block_size()` blocks starting at `block_id`.
    /// buf.len() must be a multiple of block_size().
    fn read_blocks(&self, block_id: usize, buf: &mut [u8]) -> Result<()>;

    /// Writes `buf.len() / block_size()` blocks starting at `block_id`.
    /// buf.len() must be a multiple of block_size().
    fn write_blocks(&self, block_id: usize, buf: &[u8]) -> Result<()>;

    /// Flushes any cached data to the block device.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> usize {
        self.capacity() / self.block_size()
    }
}

/// A block device backed by a regular file (a disk image).
/// The file is closed when the last handle is dropped.
pub struct FileDisk {
    inner: Mutex<File>,
    block_size: usize,
    capacity: usize,
}

impl FileDisk {
    /// Opens an existing image. Its length, rounded down to whole blocks, is the capacity.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(FsError::InvalidArgument);
        }
        let file = File::options()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .map_err(|e| {
                error!("failed to open {}: {}", path.as_ref().display(), e);
                FsError::IoError
            })?;
        let len = file.metadata().map_err(|e| {
            error!("failed to stat {}: {}", path.as_ref().display(), e);
            FsError::IoError
        })?.len() as usize;
        Ok(Self {
            inner: Mutex::new(file),
            block_size,
            capacity: len / block_size * block_size,
        })
    }

    /// Creates (or truncates) an image of `capacity` zero bytes.
    pub fn create(path: impl AsRef<Path>, capacity: usize, block_size: usize) -> Result<Self> {
        if block_size == 0 || capacity % block_size != 0 {
            return Err(FsError::InvalidArgument);
        }
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())
            .map_err(|e| {
                error!("failed to create {}: {}", path.as_ref().display(), e);
                FsError::IoError
            })?;
        file.set_len(capacity as u64).map_err(|e| {
            error!("failed to size {}: {}", path.as_ref().display(), e);
            FsError::IoError
        })?;
        Ok(Self {
            inner: Mutex::new(file),
            block_size,
            capacity,
        })
    }

    fn check_transfer(&self, block_id: usize, len: usize) -> Result<u64> {
        if len % self.block_size != 0 {
            return Err(FsError::InvalidArgument);
        }
        let start = block_id * self.block_size;
        if start + len > self.capacity {
            return Err(FsError::IoError);
        }
        Ok(start as u64)
    }
}

impl BlockDevice for FileDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_blocks(&self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        let start = self.check_transfer(block_id, buf.len())?;
        let mut inner = self.inner.lock().map_err(|_| FsError::IoError)?;
        inner
            .seek(SeekFrom::Start(start))
            .and_then(|_| inner.read_exact(buf))
            .map_err(|e| {
                error!("read of block {} failed: {}", block_id, e);
                FsError::IoError
            })
    }

    fn write_blocks(&self, block_id: usize, buf: &[u8]) -> Result<()> {
        let start = self.check_transfer(block_id, buf.len())?;
        let mut inner = self.inner.lock().map_err(|_| FsError::IoError)?;
        inner
            .seek(SeekFrom::Start(start))
            .and_then(|_| inner.write_all(buf))
            .map_err(|e| {
                error!("write of block {} failed: {}", block_id, e);
                FsError::IoError
            })
    }

    fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| FsError::IoError)?;
        inner.flush().and_then(|_| inner.sync_data()).map_err(|e| {
            error!("flush failed: {}", e);
            FsError::IoError
        })
    }
}

/// In-memory device for unit tests.
#[cfg(test)]
pub(crate) struct MemDisk {
    inner: Mutex<Vec<u8>>,
    block_size: usize,
}

#[cfg(test)]
impl MemDisk {
    pub fn new(capacity: usize, block_size: usize) -> Self {
        Self {
            inner: Mutex::new(vec![0u8; capacity]),
            block_size,
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.inner.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl BlockDevice for MemDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn capacity(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    fn read_blocks(&self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        assert_eq!(buf.len() % self.block_size, 0, "unaligned read length");
        let data = self.inner.lock().unwrap();
        let start = block_id * self.block_size;
        let end = start + buf.len();
        if end > data.len() {
            return Err(FsError::IoError);
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_blocks(&self, block_id: usize, buf: &[u8]) -> Result<()> {
        assert_eq!(buf.len() % self.block_size, 0, "unaligned write length");
        let mut data = self.inner.lock().unwrap();
        let start = block_id * self.block_size;
        let end = start + buf.len();
        if end > data.len() {
            return Err(FsError::IoError);
        }
        data[start..end].copy_from_slice(buf);
        Ok(())
    }
}
