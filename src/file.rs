//! Byte access to resident regular-file records.

use crate::error::{FsError, Result};
use crate::structs::FileType;
use crate::tree::{Inode, Tree};

fn file_record(tree: &Tree, slot: u32) -> Result<&Inode> {
    let inode = tree.record(slot)?;
    if inode.kind != FileType::Regular {
        return Err(FsError::Unsupported);
    }
    Ok(inode)
}

fn file_record_mut(tree: &mut Tree, slot: u32) -> Result<&mut Inode> {
    let inode = tree.record_mut(slot)?;
    if inode.kind != FileType::Regular {
        return Err(FsError::Unsupported);
    }
    Ok(inode)
}

/// Reads data from a file into the provided buffer.
/// The read stops at the end of the file; returns the number of bytes read.
pub fn fread(tree: &Tree, slot: u32, offset: usize, buffer: &mut [u8]) -> Result<usize> {
    let inode = file_record(tree, slot)?;
    let data = inode.data.as_deref().ok_or(FsError::NullArgument)?;
    let size = inode.size as usize;
    if offset >= size {
        return Ok(0);
    }
    let len = buffer.len().min(size - offset);
    buffer[..len].copy_from_slice(&data[offset..offset + len]);
    Ok(len)
}

/// Writes data from the provided buffer to a file at the specified offset.
/// `offset` may not lie past the current end of the file. Data beyond the
/// extent is dropped; returns the number of bytes written.
pub fn fwrite(tree: &mut Tree, slot: u32, offset: usize, buffer: &[u8]) -> Result<usize> {
    let inode = file_record_mut(tree, slot)?;
    if offset > inode.size as usize {
        return Err(FsError::InvalidArgument);
    }
    if buffer.is_empty() {
        return Ok(0);
    }
    let data = inode.data.as_deref_mut().ok_or(FsError::NullArgument)?;
    if offset >= data.len() {
        return Err(FsError::NoSpace);
    }
    let len = buffer.len().min(data.len() - offset);
    data[offset..offset + len].copy_from_slice(&buffer[..len]);
    inode.size = inode.size.max((offset + len) as u32);
    Ok(len)
}

/// Sets the file size. Bytes past the new end read back as zero.
pub fn ftruncate(tree: &mut Tree, slot: u32, len: usize) -> Result<()> {
    let inode = file_record_mut(tree, slot)?;
    let data = inode.data.as_deref_mut().ok_or(FsError::NullArgument)?;
    if len > data.len() {
        return Err(FsError::NoSpace);
    }
    let size = inode.size as usize;
    if len < size {
        data[len..size].fill(0);
    }
    inode.size = len as u32;
    Ok(())
}
