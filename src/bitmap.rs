//! Management of the metadata bitmap and the data bitmap.
//! Each slot owns one metadata record and one data extent under the same index,
//! so both bitmaps are always set and cleared together.
//! The bitmaps stay resident for the whole mount and are written back on sync.

use alloc::vec;
use alloc::vec::Vec;

use log::debug;

use crate::error::{FsError, Result};
use crate::io::AlignedIo;
use crate::{BlockDevice, SuperBlock};

/// Finds the first clear bit below `total_items` and sets it.
/// Returns the item ID of the bit that was set.
fn set_first_fit_bit(bitmap: &mut [u8], total_items: u32) -> Option<u32> {
    for (j, byte) in bitmap.iter_mut().enumerate() {
        if *byte == u8::MAX {
            continue;
        }
        let k = byte.trailing_ones();
        let item_id = j as u32 * 8 + k;
        if item_id >= total_items {
            return None;
        }
        *byte |= 1 << k;
        return Some(item_id);
    }
    None
}

/// Sets a specific bit to `set_value`.
/// Returns previously set value of the bit.
fn set_bit_at(bitmap: &mut [u8], item_id: u32, set_value: bool) -> bool {
    let byte_offset = (item_id / 8) as usize;
    let bit_offset = item_id % 8;
    let pre_value = (bitmap[byte_offset] & (1 << bit_offset)) != 0;
    if set_value {
        bitmap[byte_offset] |= 1 << bit_offset;
    } else {
        bitmap[byte_offset] &= !(1 << bit_offset);
    }
    pre_value
}

#[derive(Debug, Clone)]
pub struct SlotBitmap {
    meta: Vec<u8>,
    data: Vec<u8>,
    max_slots: u32,
}

impl SlotBitmap {
    /// All slots free, sized for `superblock`'s layout.
    pub fn empty(superblock: &SuperBlock, block_size: usize) -> Self {
        let len = superblock.bitmap_bytes(block_size);
        Self {
            meta: vec![0; len],
            data: vec![0; len],
            max_slots: superblock.max_slots,
        }
    }

    /// Reads both bitmap regions in full.
    pub fn load<D: BlockDevice>(io: &AlignedIo<D>, superblock: &SuperBlock) -> Result<Self> {
        let mut bitmap = Self::empty(superblock, io.block_size());
        io.read(superblock.meta_bitmap_offset, &mut bitmap.meta)?;
        io.read(superblock.data_bitmap_offset, &mut bitmap.data)?;
        Ok(bitmap)
    }

    /// Writes both bitmap regions back.
    pub fn flush<D: BlockDevice>(&self, io: &AlignedIo<D>, superblock: &SuperBlock) -> Result<()> {
        io.write(superblock.meta_bitmap_offset, &self.meta)?;
        io.write(superblock.data_bitmap_offset, &self.data)?;
        Ok(())
    }

    /// Claims the lowest free slot.
    pub fn alloc(&mut self) -> Result<u32> {
        let slot = set_first_fit_bit(&mut self.meta, self.max_slots).ok_or(FsError::NoSpace)?;
        set_bit_at(&mut self.data, slot, true);
        debug!("allocated slot {}", slot);
        Ok(slot)
    }

    /// Releases `slot`. Freeing a free slot is a no-op.
    pub fn free(&mut self, slot: u32) -> Result<()> {
        if slot >= self.max_slots {
            return Err(FsError::InvalidArgument);
        }
        let was_used = set_bit_at(&mut self.meta, slot, false);
        set_bit_at(&mut self.data, slot, false);
        if was_used {
            debug!("freed slot {}", slot);
        }
        Ok(())
    }

    pub fn is_used(&self, slot: u32) -> bool {
        slot < self.max_slots && self.meta[(slot / 8) as usize] & (1 << (slot % 8)) != 0
    }

    pub fn used(&self) -> u32 {
        (0..self.max_slots).filter(|&slot| self.is_used(slot)).count() as u32
    }

    pub fn max_slots(&self) -> u32 {
        self.max_slots
    }

    #[cfg(test)]
    fn data_is_used(&self, slot: u32) -> bool {
        self.data[(slot / 8) as usize] & (1 << (slot % 8)) != 0
    }
}
