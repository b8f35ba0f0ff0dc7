use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::bitmap::SlotBitmap;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::file::{fread, ftruncate, fwrite};
use crate::io::AlignedIo;
use crate::path::{resolve, split, Lookup};
use crate::structs::{FileType, SuperBlock};
use crate::superblock::{read_superblock, write_superblock};
use crate::sync::{ensure_loaded, sync_subtree};
use crate::tree::{destroy_record, Binding, Dentry, EntryId, Inode, Tree};
use crate::BlockDevice;

/// File attributes as reported to an OS-facing adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub kind: FileType,
    pub size: u64,
    pub nlink: u32,
    pub perm: u16,
    pub block_size: u32,
    pub blocks: u64,
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub kind: FileType,
}

/// A mounted filesystem: device handle, superblock, bitmaps and resident tree.
/// Operations run one at a time; callers sharing it across threads wrap it in a lock.
/// Changes reach the device on [`FileSystem::sync`] and [`FileSystem::unmount`].
pub struct FileSystem<D: BlockDevice> {
    io: AlignedIo<D>,
    superblock: SuperBlock,
    bitmap: SlotBitmap,
    tree: Tree,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Mounts the filesystem on `device`, formatting it first if it carries none.
    pub fn mount(device: Arc<D>) -> Result<Self> {
        let io = AlignedIo::new(device)?;
        let block_size = io.block_size();

        let fs_inst = match read_superblock(&io)? {
            Some(superblock) => {
                let bitmap = SlotBitmap::load(&io, &superblock)?;
                if !bitmap.is_used(ROOT_SLOT) {
                    warn!("slot bitmap does not mark the root slot as used");
                    return Err(FsError::Corrupted);
                }
                let mut tree = Tree::new(superblock.extent_size(block_size));
                let root = tree.root();
                tree.entry_mut(root)?.binding = Binding::Unloaded(ROOT_SLOT);
                ensure_loaded(&io, &superblock, &mut tree, root)?;
                info!(
                    "mounted: {} of {} slots in use, {} bytes used",
                    bitmap.used(),
                    superblock.max_slots,
                    superblock.usage
                );
                Self {
                    io,
                    superblock,
                    bitmap,
                    tree,
                }
            }
            None => Self::format(io)?,
        };
        Ok(fs_inst)
    }

    /// Lays out a fresh filesystem and persists its superblock, bitmaps and root.
    fn format(io: AlignedIo<D>) -> Result<Self> {
        let block_size = io.block_size();
        let superblock = SuperBlock::format(io.capacity(), block_size)?;
        info!(
            "formatting: {} bytes, {}-byte blocks, {} slots",
            io.capacity(),
            block_size,
            superblock.max_slots
        );

        let mut bitmap = SlotBitmap::empty(&superblock, block_size);
        let mut tree = Tree::new(superblock.extent_size(block_size));
        let root = tree.root();
        let root_slot = tree.allocate_record(&mut bitmap, root)?;
        if root_slot != ROOT_SLOT {
            return Err(FsError::Corrupted);
        }

        let fs_inst = Self {
            io,
            superblock,
            bitmap,
            tree,
        };
        fs_inst.sync_all()?;
        Ok(fs_inst)
    }

    fn sync_all(&self) -> Result<()> {
        sync_subtree(&self.io, &self.superblock, &self.tree, ROOT_SLOT)?;
        self.bitmap.flush(&self.io, &self.superblock)?;
        write_superblock(&self.io, &self.superblock)?;
        self.io.flush()
    }

    /// Writes the resident tree, both bitmaps and the superblock to the device.
    pub fn sync(&mut self) -> Result<()> {
        debug!("sync");
        self.sync_all()
    }

    /// Flushes everything and releases the device handle.
    pub fn unmount(self) -> Result<()> {
        self.sync_all()?;
        info!(
            "unmounted: {} of {} slots in use",
            self.bitmap.used(),
            self.superblock.max_slots
        );
        Ok(())
    }

    // Following methods directly operate on the fs instance.

    pub fn resolve(&mut self, path: &str) -> Result<Lookup> {
        resolve(&self.io, &self.superblock, &mut self.tree, path)
    }

    /// Resolves `path` to an entry with a resident record.
    pub fn lookup(&mut self, path: &str) -> Result<EntryId> {
        let lookup = self.resolve(path)?;
        if !lookup.found {
            return Err(FsError::NotFound);
        }
        Ok(lookup.entry)
    }

    fn slot_of(&mut self, entry: EntryId) -> Result<u32> {
        ensure_loaded(&self.io, &self.superblock, &mut self.tree, entry)
    }

    /// Creates `name` under the directory `parent` and binds it to a fresh slot.
    pub fn create_entry(&mut self, parent: EntryId, name: &str, kind: FileType) -> Result<EntryId> {
        if self.tree.entry(parent)?.kind != FileType::Directory {
            return Err(FsError::Unsupported);
        }
        let parent_slot = self.slot_of(parent)?;
        if self.tree.find_child(parent_slot, name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        if self.tree.record(parent_slot)?.child_count() >= self.tree.dir_capacity() {
            return Err(FsError::NoSpace);
        }

        let entry = self.tree.create_detached_entry(name, kind)?;
        let slot = match self.tree.allocate_record(&mut self.bitmap, entry) {
            Ok(slot) => slot,
            Err(e) => {
                self.tree.discard_entry(entry)?;
                return Err(e);
            }
        };
        if let Err(e) = self.tree.attach_child(parent_slot, entry) {
            destroy_record(
                &self.io,
                &mut self.superblock,
                &mut self.bitmap,
                &mut self.tree,
                slot,
            )?;
            return Err(e);
        }
        debug!("created {:?} {} in slot {}", kind, name, slot);
        Ok(entry)
    }

    /// Creates the final component of `path`; its parent must already exist.
    pub fn create(&mut self, path: &str, kind: FileType) -> Result<EntryId> {
        let (parent_path, name) = split(path);
        if name.is_empty() {
            return Err(FsError::AlreadyExists);
        }
        let parent = self.lookup(parent_path)?;
        self.create_entry(parent, name, kind)
    }

    pub fn mkdir(&mut self, path: &str) -> Result<EntryId> {
        self.create(path, FileType::Directory)
    }

    pub fn mknod(&mut self, path: &str) -> Result<EntryId> {
        self.create(path, FileType::Regular)
    }

    /// Destroys `entry` and everything beneath it, releasing their slots.
    pub fn destroy(&mut self, entry: EntryId) -> Result<()> {
        if entry == self.tree.root() {
            return Err(FsError::InvalidArgument);
        }
        match self.tree.entry(entry)?.binding {
            Binding::Unbound => {
                if self.tree.entry(entry)?.parent.is_some() {
                    self.tree.detach_child(entry)?;
                }
                self.tree.discard_entry(entry)
            }
            _ => {
                let slot = self.slot_of(entry)?;
                let freed = destroy_record(
                    &self.io,
                    &mut self.superblock,
                    &mut self.bitmap,
                    &mut self.tree,
                    slot,
                )?;
                debug!("destroyed slot {}, {} slots freed", slot, freed);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, path: &str) -> Result<()> {
        let lookup = self.resolve(path)?;
        if !lookup.found {
            return Err(FsError::NotFound);
        }
        if lookup.is_root {
            return Err(FsError::InvalidArgument);
        }
        self.destroy(lookup.entry)
    }

    /// Moves the entry at `from` to `to`, taking `to`'s final component as its name.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let source = self.resolve(from)?;
        if !source.found {
            return Err(FsError::NotFound);
        }
        if source.is_root {
            return Err(FsError::Unsupported);
        }
        let entry = source.entry;

        if self.resolve(to)?.found {
            return Err(FsError::AlreadyExists);
        }
        let (parent_path, name) = split(to);
        crate::tree::validate_name(name)?;
        let new_parent = self.lookup(parent_path)?;
        if self.tree.entry(new_parent)?.kind != FileType::Directory {
            return Err(FsError::Unsupported);
        }
        if self.tree.is_ancestor(entry, new_parent) {
            return Err(FsError::InvalidArgument);
        }
        let new_parent_slot = self.slot_of(new_parent)?;
        let old_parent = self.tree.entry(entry)?.parent.ok_or(FsError::InvalidArgument)?;
        if old_parent != new_parent
            && self.tree.record(new_parent_slot)?.child_count() >= self.tree.dir_capacity()
        {
            return Err(FsError::NoSpace);
        }

        self.tree.detach_child(entry)?;
        if let Err(e) = self.tree.attach_child(new_parent_slot, entry) {
            let old_parent_slot = self.tree.loaded_slot(old_parent)?;
            self.tree.attach_child(old_parent_slot, entry)?;
            return Err(e);
        }
        self.tree.rename_entry(entry, name)?;
        debug!("renamed {} -> {}", from, to);
        Ok(())
    }

    pub fn read_bytes(&mut self, entry: EntryId, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let slot = self.slot_of(entry)?;
        fread(&self.tree, slot, offset, buf)
    }

    pub fn write_bytes(&mut self, entry: EntryId, offset: usize, buf: &[u8]) -> Result<usize> {
        let slot = self.slot_of(entry)?;
        let before = self.tree.record(slot)?.size;
        let written = fwrite(&mut self.tree, slot, offset, buf)?;
        let after = self.tree.record(slot)?.size;
        self.superblock.usage += (after - before) as u64;
        Ok(written)
    }

    pub fn read(&mut self, path: &str, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let entry = self.lookup(path)?;
        self.read_bytes(entry, offset, buf)
    }

    pub fn write(&mut self, path: &str, offset: usize, buf: &[u8]) -> Result<usize> {
        let entry = self.lookup(path)?;
        self.write_bytes(entry, offset, buf)
    }

    pub fn truncate(&mut self, path: &str, len: usize) -> Result<()> {
        let entry = self.lookup(path)?;
        let slot = self.slot_of(entry)?;
        let before = self.tree.record(slot)?.size as u64;
        ftruncate(&mut self.tree, slot, len)?;
        self.superblock.usage = self.superblock.usage.saturating_sub(before) + len as u64;
        Ok(())
    }

    pub fn stat(&mut self, path: &str) -> Result<Stat> {
        let lookup = self.resolve(path)?;
        if !lookup.found {
            return Err(FsError::NotFound);
        }
        let slot = self.slot_of(lookup.entry)?;
        let inode = self.tree.record(slot)?;
        let block_size = self.io.block_size();
        let size = match inode.kind {
            FileType::Regular => inode.size as u64,
            FileType::Directory => (inode.child_count() * DIR_ENTRY_SIZE) as u64,
        };
        let mut stat = Stat {
            kind: inode.kind,
            size,
            nlink: 1,
            perm: DEFAULT_PERM,
            block_size: block_size as u32,
            blocks: size.div_ceil(block_size as u64),
            slot,
        };
        if lookup.is_root {
            stat.size = self.superblock.usage;
            stat.blocks = (self.io.capacity() / block_size) as u64;
            stat.nlink = 2;
        }
        Ok(stat)
    }

    /// Lists a directory in child order, most recently attached first.
    pub fn read_dir(&mut self, path: &str) -> Result<Vec<DirEntryInfo>> {
        let slot = self.dir_slot(path)?;
        self.tree
            .record(slot)?
            .children
            .iter()
            .map(|&child| {
                let dentry = self.tree.entry(child)?;
                Ok(DirEntryInfo {
                    name: dentry.name.clone(),
                    kind: dentry.kind,
                })
            })
            .collect()
    }

    /// The index-th entry of a directory, or `None` past the end.
    pub fn dir_entry_at(&mut self, path: &str, index: usize) -> Result<Option<DirEntryInfo>> {
        let slot = self.dir_slot(path)?;
        match self.tree.child_at(slot, index) {
            Some(child) => {
                let dentry = self.tree.entry(child)?;
                Ok(Some(DirEntryInfo {
                    name: dentry.name.clone(),
                    kind: dentry.kind,
                }))
            }
            None => Ok(None),
        }
    }

    fn dir_slot(&mut self, path: &str) -> Result<u32> {
        let entry = self.open_dir(path)?;
        self.slot_of(entry)
    }

    /// Resolves a regular file.
    pub fn open(&mut self, path: &str) -> Result<EntryId> {
        let entry = self.lookup(path)?;
        if self.tree.entry(entry)?.kind != FileType::Regular {
            return Err(FsError::Unsupported);
        }
        Ok(entry)
    }

    /// Resolves a directory.
    pub fn open_dir(&mut self, path: &str) -> Result<EntryId> {
        let entry = self.lookup(path)?;
        if self.tree.entry(entry)?.kind != FileType::Directory {
            return Err(FsError::Unsupported);
        }
        Ok(entry)
    }

    /// Succeeds if `path` exists. Every entry grants full access.
    pub fn access(&mut self, path: &str) -> Result<()> {
        self.lookup(path).map(|_| ())
    }

    pub fn root(&self) -> EntryId {
        self.tree.root()
    }

    pub fn entry(&self, entry: EntryId) -> Result<&Dentry> {
        self.tree.entry(entry)
    }

    /// The resident record of `entry`, loading it if needed.
    pub fn record(&mut self, entry: EntryId) -> Result<&Inode> {
        let slot = self.slot_of(entry)?;
        self.tree.record(slot)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn block_size(&self) -> usize {
        self.io.block_size()
    }

    pub fn used_slots(&self) -> u32 {
        self.bitmap.used()
    }

    pub fn free_slots(&self) -> u32 {
        self.superblock.max_slots - self.bitmap.used()
    }

    pub fn is_slot_used(&self, slot: u32) -> bool {
        self.bitmap.is_used(slot)
    }

    pub fn device(&self) -> Arc<D> {
        self.io.device()
    }

    pub fn dump(&self) -> String {
        let sb = &self.superblock;
        format!(
            "block size {}, capacity {}, slots {}/{} used, usage {} bytes, \
             meta bitmap @{} ({} blks), data bitmap @{} ({} blks), \
             inode table @{} ({} blks), data @{} ({} blks), {} resident records",
            self.io.block_size(),
            self.io.capacity(),
            self.bitmap.used(),
            sb.max_slots,
            sb.usage,
            sb.meta_bitmap_offset,
            sb.meta_bitmap_blocks,
            sb.data_bitmap_offset,
            sb.data_bitmap_blocks,
            sb.inode_table_offset,
            sb.inode_table_blocks,
            sb.data_offset,
            sb.data_blocks,
            self.tree.record_count(),
        )
    }
}
