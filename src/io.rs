//! Byte-granular access on top of a block-granular device.
//! Every transfer is widened to the enclosing block-aligned window; writes
//! read that window first so the bytes around the requested range survive.

use alloc::sync::Arc;
use alloc::vec;

use crate::block_dev::BlockDevice;
use crate::error::{FsError, Result};

pub(crate) fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

pub(crate) fn round_down(value: usize, align: usize) -> usize {
    value / align * align
}

pub struct AlignedIo<D: BlockDevice> {
    device: Arc<D>,
    block_size: usize,
    capacity: usize,
}

impl<D: BlockDevice> AlignedIo<D> {
    pub fn new(device: Arc<D>) -> Result<Self> {
        let block_size = device.block_size();
        let capacity = device.capacity();
        if block_size == 0 {
            return Err(FsError::InvalidArgument);
        }
        Ok(Self {
            device,
            block_size,
            capacity,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }

    /// Returns (aligned offset, bias of `offset` inside the window, aligned length).
    fn window(&self, offset: u64, len: usize) -> Result<(usize, usize, usize)> {
        let offset = usize::try_from(offset).map_err(|_| FsError::InvalidArgument)?;
        let aligned_offset = round_down(offset, self.block_size);
        let bias = offset - aligned_offset;
        let aligned_len = round_up(bias + len, self.block_size);
        if aligned_offset + aligned_len > self.capacity {
            return Err(FsError::InvalidArgument);
        }
        Ok((aligned_offset, bias, aligned_len))
    }

    /// Fills `dst` with the bytes at `offset..offset + dst.len()`.
    pub fn read(&self, offset: u64, dst: &mut [u8]) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        let (aligned_offset, bias, aligned_len) = self.window(offset, dst.len())?;
        let mut scratch = vec![0u8; aligned_len];
        self.device
            .read_blocks(aligned_offset / self.block_size, &mut scratch)?;
        dst.copy_from_slice(&scratch[bias..bias + dst.len()]);
        Ok(())
    }

    /// Stores `src` at `offset..offset + src.len()`.
    pub fn write(&self, offset: u64, src: &[u8]) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        let (aligned_offset, bias, aligned_len) = self.window(offset, src.len())?;
        let block_id = aligned_offset / self.block_size;
        let mut scratch = vec![0u8; aligned_len];
        self.device.read_blocks(block_id, &mut scratch)?;
        scratch[bias..bias + src.len()].copy_from_slice(src);
        self.device.write_blocks(block_id, &scratch)
    }

    pub fn flush(&self) -> Result<()> {
        self.device.flush()
    }
}
