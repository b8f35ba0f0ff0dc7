//! Common utilities for tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use slotfs::BlockDevice;
use slotfs::Error;
use slotfs::DEFAULT_BLOCK_SIZE;

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

pub const MIB: usize = 1024 * 1024;

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> [test] placeholder
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        log::info!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        log::info!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    block_size: usize,
    fail_writes: AtomicBool,
}

impl RamDisk {
    /// Creates a zeroed RamDisk of `capacity` bytes.
    pub fn new(capacity: usize, block_size: usize) -> Self {
        RamDisk {
            inner: Mutex::new(vec![0u8; capacity]),
            block_size,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn with_default_blocks(num_blocks: usize) -> Self {
        Self::new(num_blocks * DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_SIZE)
    }

    /// Makes every following write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        self.inner.lock().unwrap()[offset..offset + len].to_vec()
    }

    pub fn scribble(&self, offset: usize, bytes: &[u8]) {
        self.inner.lock().unwrap()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl BlockDevice for RamDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn capacity(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    fn read_blocks(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        if buf.len() % self.block_size != 0 {
            return Err(Error::InvalidArgument);
        }
        let data = self.inner.lock().unwrap();
        let start = block_id * self.block_size;
        let end = start + buf.len();
        if end > data.len() {
            return Err(Error::IoError);
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_blocks(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::IoError);
        }
        if buf.len() % self.block_size != 0 {
            return Err(Error::InvalidArgument);
        }
        let mut data = self.inner.lock().unwrap();
        let start = block_id * self.block_size;
        let end = start + buf.len();
        if end > data.len() {
            return Err(Error::IoError);
        }
        data[start..end].copy_from_slice(buf);
        Ok(())
    }
}
