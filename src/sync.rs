//! Moving records between the resident tree and the device.

use alloc::vec;
use alloc::vec::Vec;
use core::mem::size_of;

use log::{debug, trace, warn};

use crate::config::*;
use crate::error::{FsError, Result};
use crate::inode::{get_inode, write_inode};
use crate::io::AlignedIo;
use crate::structs::{as_bytes, from_bytes, DiskDirEntry, DiskInode, FileType};
use crate::tree::{Binding, EntryId, Inode, Tree};
use crate::{BlockDevice, SuperBlock};

/// Writes the record at `slot` and, for directories, every resident record below it.
/// Unloaded children are skipped: nothing about them changed since they were read.
pub fn sync_subtree<D: BlockDevice>(
    io: &AlignedIo<D>,
    superblock: &SuperBlock,
    tree: &Tree,
    slot: u32,
) -> Result<()> {
    let inode = tree.record(slot)?;
    trace!("syncing slot {} ({:?})", slot, inode.kind);
    write_inode(io, superblock, &DiskInode::from(inode))?;

    let extent_offset = superblock.extent_offset(slot, io.block_size());
    match inode.kind {
        FileType::Regular => {
            let data = inode.data.as_deref().ok_or(FsError::NullArgument)?;
            io.write(extent_offset, data)
        }
        FileType::Directory => {
            let mut table = Vec::with_capacity(inode.children.len() * DIR_ENTRY_SIZE);
            for &child in &inode.children {
                let dentry = tree.entry(child)?;
                let record = DiskDirEntry::new(&dentry.name, dentry.slot(), dentry.kind)?;
                table.extend_from_slice(as_bytes(&record));
            }
            io.write(extent_offset, &table)?;

            for &child in &inode.children {
                if let Binding::Loaded(child_slot) = tree.entry(child)?.binding {
                    sync_subtree(io, superblock, tree, child_slot)?;
                }
            }
            Ok(())
        }
    }
}

/// Reads the record at `slot` from the device and binds it to `entry`.
/// Directory children come back as unloaded entries, in stored order.
pub fn load_record<D: BlockDevice>(
    io: &AlignedIo<D>,
    superblock: &SuperBlock,
    tree: &mut Tree,
    entry: EntryId,
    slot: u32,
) -> Result<()> {
    if let Binding::Loaded(_) = tree.entry(entry)?.binding {
        return Err(FsError::InvalidArgument);
    }
    if tree.has_record(slot) {
        warn!("slot {} is already resident under another entry", slot);
        return Err(FsError::Corrupted);
    }
    let disk_inode = get_inode(io, superblock, slot)?;
    let kind = FileType::try_from(disk_inode.kind)?;
    if disk_inode.slot != slot || kind != tree.entry(entry)?.kind {
        warn!(
            "slot {} holds record for slot {} ({:?}), expected {:?}",
            slot,
            disk_inode.slot,
            kind,
            tree.entry(entry)?.kind
        );
        return Err(FsError::Corrupted);
    }
    debug!("loading slot {} ({:?})", slot, kind);

    let extent_size = tree.extent_size();
    let extent_offset = superblock.extent_offset(slot, io.block_size());
    let mut inode = Inode {
        slot,
        kind,
        size: 0,
        children: Vec::new(),
        data: None,
        owner: entry,
    };

    match kind {
        FileType::Regular => {
            if disk_inode.size as usize > extent_size {
                return Err(FsError::Corrupted);
            }
            let mut data = vec![0u8; extent_size];
            io.read(extent_offset, &mut data)?;
            inode.size = disk_inode.size;
            inode.data = Some(data);
        }
        FileType::Directory => {
            let count = disk_inode.child_count as usize;
            if count > tree.dir_capacity() {
                return Err(FsError::Corrupted);
            }
            let mut table = vec![0u8; count * DIR_ENTRY_SIZE];
            io.read(extent_offset, &mut table)?;
            // Every record is decoded before any entry joins the arena.
            let decoded = table
                .chunks_exact(size_of::<DiskDirEntry>())
                .map(|raw| {
                    let record: DiskDirEntry = from_bytes(raw)?;
                    Ok((record.name_str()?, record.file_type()?, record.binding()))
                })
                .collect::<Result<Vec<_>>>()?;
            for (name, child_kind, binding) in decoded {
                let child = tree.create_loaded_child(entry, name, child_kind, binding);
                inode.children.push(child);
            }
        }
    }

    tree.install_record(entry, inode)
}

/// Returns the slot of `entry`'s record, reading it from disk on first touch.
pub fn ensure_loaded<D: BlockDevice>(
    io: &AlignedIo<D>,
    superblock: &SuperBlock,
    tree: &mut Tree,
    entry: EntryId,
) -> Result<u32> {
    match tree.entry(entry)?.binding {
        Binding::Loaded(slot) => Ok(slot),
        Binding::Unloaded(slot) => {
            load_record(io, superblock, tree, entry, slot)?;
            Ok(slot)
        }
        Binding::Unbound => Err(FsError::NullArgument),
    }
}
