//! Region layout and the persisted superblock.
//!
//! ```text
//! | super | meta bitmap | data bitmap | metadata table | data extents |
//! ```

use core::mem::size_of;

use log::warn;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::io::{round_up, AlignedIo};
use crate::structs::{as_bytes, from_bytes, SuperBlock};
use crate::BlockDevice;

impl SuperBlock {
    /// Derives a fresh layout from the device geometry.
    /// The same capacity and block size always yield the same layout.
    pub fn format(capacity: usize, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(FsError::InvalidArgument);
        }
        let super_blocks = round_up(size_of::<SuperBlock>(), block_size) / block_size;
        let raw_slots = capacity / (block_size * (META_BLOCKS_PER_SLOT + DATA_BLOCKS_PER_SLOT));
        let bitmap_blocks =
            round_up(round_up(raw_slots, BITMAP_ALIGN_BITS), block_size) / block_size;

        let max_slots = raw_slots
            .checked_sub(super_blocks + 2 * bitmap_blocks)
            .filter(|&slots| slots > 0)
            .ok_or(FsError::InvalidArgument)?;
        let max_slots = u32::try_from(max_slots).map_err(|_| FsError::InvalidArgument)?;

        let block_bytes = |blocks: usize| (blocks * block_size) as u64;
        let inode_table_blocks = max_slots as usize * META_BLOCKS_PER_SLOT;
        let data_blocks = max_slots as usize * DATA_BLOCKS_PER_SLOT;

        let meta_bitmap_offset = SUPERBLOCK_OFFSET + block_bytes(super_blocks);
        let data_bitmap_offset = meta_bitmap_offset + block_bytes(bitmap_blocks);
        let inode_table_offset = data_bitmap_offset + block_bytes(bitmap_blocks);
        let data_offset = inode_table_offset + block_bytes(inode_table_blocks);

        Ok(Self {
            magic: MAGIC,
            max_slots,
            max_extents: max_slots,
            meta_bitmap_blocks: bitmap_blocks as u32,
            data_bitmap_blocks: bitmap_blocks as u32,
            inode_table_blocks: inode_table_blocks as u32,
            data_blocks: data_blocks as u32,
            reserved: 0,
            meta_bitmap_offset,
            data_bitmap_offset,
            inode_table_offset,
            data_offset,
            usage: 0,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    /// Byte offset one past the data region.
    pub fn end_offset(&self, block_size: usize) -> u64 {
        self.data_offset + self.data_blocks as u64 * block_size as u64
    }

    pub fn extent_size(&self, block_size: usize) -> usize {
        DATA_BLOCKS_PER_SLOT * block_size
    }

    /// Byte offset of the metadata record for `slot`.
    pub fn inode_offset(&self, slot: u32, block_size: usize) -> u64 {
        self.inode_table_offset + (slot as usize * META_BLOCKS_PER_SLOT * block_size) as u64
    }

    /// Byte offset of the data extent for `slot`.
    pub fn extent_offset(&self, slot: u32, block_size: usize) -> u64 {
        self.data_offset + (slot as usize * DATA_BLOCKS_PER_SLOT * block_size) as u64
    }

    pub fn bitmap_bytes(&self, block_size: usize) -> usize {
        self.meta_bitmap_blocks as usize * block_size
    }
}

/// Reads the stored superblock. Returns `None` when the magic does not match,
/// i.e. the device carries no filesystem yet.
pub fn read_superblock<D: BlockDevice>(io: &AlignedIo<D>) -> Result<Option<SuperBlock>> {
    let mut buf = [0u8; size_of::<SuperBlock>()];
    io.read(SUPERBLOCK_OFFSET, &mut buf)?;
    let superblock: SuperBlock = from_bytes(&buf)?;

    if !superblock.is_valid() {
        return Ok(None);
    }
    // A valid tag with a layout that does not fit is damage, not a blank device.
    if superblock.end_offset(io.block_size()) > io.capacity() as u64
        || superblock.meta_bitmap_blocks != superblock.data_bitmap_blocks
        || superblock.max_slots as usize > superblock.bitmap_bytes(io.block_size()) * 8
    {
        warn!("superblock magic matches but layout does not fit the device");
        return Err(FsError::Corrupted);
    }
    Ok(Some(superblock))
}

pub fn write_superblock<D: BlockDevice>(io: &AlignedIo<D>, superblock: &SuperBlock) -> Result<()> {
    io.write(SUPERBLOCK_OFFSET, as_bytes(superblock))
}
