//! Reading and writing metadata table records.

use core::mem::size_of;

use crate::error::{FsError, Result};
use crate::io::AlignedIo;
use crate::structs::{as_bytes, from_bytes, DiskInode};
use crate::tree::Inode;
use crate::{BlockDevice, SuperBlock};

pub fn get_inode<D: BlockDevice>(
    io: &AlignedIo<D>,
    superblock: &SuperBlock,
    slot: u32,
) -> Result<DiskInode> {
    if slot >= superblock.max_slots {
        return Err(FsError::InvalidArgument);
    }
    let mut buf = [0u8; size_of::<DiskInode>()];
    io.read(superblock.inode_offset(slot, io.block_size()), &mut buf)?;
    from_bytes(&buf)
}

pub fn write_inode<D: BlockDevice>(
    io: &AlignedIo<D>,
    superblock: &SuperBlock,
    disk_inode: &DiskInode,
) -> Result<()> {
    if disk_inode.slot >= superblock.max_slots {
        return Err(FsError::InvalidArgument);
    }
    io.write(
        superblock.inode_offset(disk_inode.slot, io.block_size()),
        as_bytes(disk_inode),
    )
}

impl From<&Inode> for DiskInode {
    fn from(inode: &Inode) -> Self {
        Self {
            slot: inode.slot,
            child_count: inode.children.len() as u32,
            size: inode.size,
            kind: inode.kind as u32,
        }
    }
}
