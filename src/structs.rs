use core::mem::size_of;

use crate::config::*;
use crate::error::{FsError, Result};

/// Plain on-disk records: `repr(C)`, no padding, every bit pattern valid.
pub(crate) unsafe trait OnDisk: Copy {}

pub(crate) fn as_bytes<T: OnDisk>(value: &T) -> &[u8] {
    unsafe { core::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>()) }
}

pub(crate) fn from_bytes<T: OnDisk>(buf: &[u8]) -> Result<T> {
    if buf.len() < size_of::<T>() {
        return Err(FsError::InvalidArgument);
    }
    Ok(unsafe { core::ptr::read_unaligned(buf.as_ptr() as *const T) })
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,              // Magic number to identify the filesystem
    pub max_slots: u32,          // Allocatable metadata slots
    pub max_extents: u32,        // Data extents, one per slot
    pub meta_bitmap_blocks: u32, // Size of the metadata bitmap in blocks
    pub data_bitmap_blocks: u32, // Size of the data bitmap in blocks
    pub inode_table_blocks: u32, // Size of the metadata table in blocks
    pub data_blocks: u32,        // Size of the data region in blocks
    pub reserved: u32,

    pub meta_bitmap_offset: u64, // Byte offset of the metadata bitmap
    pub data_bitmap_offset: u64, // Byte offset of the data bitmap
    pub inode_table_offset: u64, // Byte offset of the metadata table
    pub data_offset: u64,        // Byte offset of the data region

    pub usage: u64, // Bytes held by regular files
}

unsafe impl OnDisk for SuperBlock {}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular = 0,
    Directory = 1,
}

impl TryFrom<u32> for FileType {
    type Error = FsError;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(FileType::Regular),
            1 => Ok(FileType::Directory),
            _ => Err(FsError::Corrupted),
        }
    }
}

/// Metadata table record. One per slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskInode {
    pub slot: u32,
    pub child_count: u32,
    pub size: u32,
    pub kind: u32,
}

unsafe impl OnDisk for DiskInode {}

/// Directory entry record, stored in the owning directory's extent.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskDirEntry {
    pub name: [u8; MAX_NAME_LEN],
    pub slot: u32,
    pub kind: u32,
}

unsafe impl OnDisk for DiskDirEntry {}

const _: () = assert!(size_of::<SuperBlock>() == 72);
const _: () = assert!(size_of::<DiskInode>() == INODE_SIZE);
const _: () = assert!(size_of::<DiskDirEntry>() == DIR_ENTRY_SIZE);
