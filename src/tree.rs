//! Resident namespace: directory entries and metadata records in an arena.
//!
//! Entries are addressed by [`EntryId`], records by their slot index.
//! A record owns its children (as an ordered list of entry ids) and its data
//! buffer; an entry owns the record bound to it. Parent links are plain ids
//! used for traversal and unlinking only.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use log::warn;

use crate::bitmap::SlotBitmap;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::io::AlignedIo;
use crate::structs::{FileType, SuperBlock};
use crate::sync::load_record;
use crate::BlockDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(usize);

/// How an entry relates to its metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// No slot allocated yet.
    Unbound,
    /// Slot known, record still on disk only.
    Unloaded(u32),
    /// Record resident in the arena.
    Loaded(u32),
}

impl Binding {
    pub fn slot(&self) -> Option<u32> {
        match *self {
            Binding::Unbound => None,
            Binding::Unloaded(slot) | Binding::Loaded(slot) => Some(slot),
        }
    }
}

#[derive(Debug)]
pub struct Dentry {
    pub(crate) name: String,
    pub(crate) kind: FileType,
    pub(crate) binding: Binding,
    pub(crate) parent: Option<EntryId>,
}

impl Dentry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FileType {
        self.kind
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn slot(&self) -> Option<u32> {
        self.binding.slot()
    }

    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }
}

/// Resident metadata record.
#[derive(Debug)]
pub struct Inode {
    pub(crate) slot: u32,
    pub(crate) kind: FileType,
    pub(crate) size: u32,
    pub(crate) children: Vec<EntryId>,
    pub(crate) data: Option<Vec<u8>>,
    pub(crate) owner: EntryId,
}

impl Inode {
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn kind(&self) -> FileType {
        self.kind
    }

    /// Byte size of a regular file; zero for directories.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> &[EntryId] {
        &self.children
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn owner(&self) -> EntryId {
        self.owner
    }
}

/// Checks a name for use as a directory entry.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.len() >= MAX_NAME_LEN
        || name.contains('/')
        || name.contains('\0')
        || name == "."
        || name == ".."
    {
        return Err(FsError::InvalidArgument);
    }
    Ok(())
}

#[derive(Debug)]
pub struct Tree {
    entries: BTreeMap<EntryId, Dentry>,
    records: BTreeMap<u32, Inode>,
    next_id: usize,
    root: EntryId,
    extent_size: usize,
}

impl Tree {
    /// An arena holding only the root entry, not yet bound to a slot.
    pub fn new(extent_size: usize) -> Self {
        let root = EntryId(0);
        let mut entries = BTreeMap::new();
        entries.insert(
            root,
            Dentry {
                name: ROOT_NAME.to_string(),
                kind: FileType::Directory,
                binding: Binding::Unbound,
                parent: None,
            },
        );
        Self {
            entries,
            records: BTreeMap::new(),
            next_id: 1,
            root,
            extent_size,
        }
    }

    pub fn root(&self) -> EntryId {
        self.root
    }

    pub fn extent_size(&self) -> usize {
        self.extent_size
    }

    /// Maximum number of children one directory extent can describe.
    pub fn dir_capacity(&self) -> usize {
        self.extent_size / DIR_ENTRY_SIZE
    }

    pub fn entry(&self, id: EntryId) -> Result<&Dentry> {
        self.entries.get(&id).ok_or(FsError::NullArgument)
    }

    pub(crate) fn entry_mut(&mut self, id: EntryId) -> Result<&mut Dentry> {
        self.entries.get_mut(&id).ok_or(FsError::NullArgument)
    }

    pub fn record(&self, slot: u32) -> Result<&Inode> {
        self.records.get(&slot).ok_or(FsError::NullArgument)
    }

    pub(crate) fn record_mut(&mut self, slot: u32) -> Result<&mut Inode> {
        self.records.get_mut(&slot).ok_or(FsError::NullArgument)
    }

    /// Slot of the resident record bound to `id`.
    pub fn loaded_slot(&self, id: EntryId) -> Result<u32> {
        match self.entry(id)?.binding {
            Binding::Loaded(slot) => Ok(slot),
            _ => Err(FsError::NullArgument),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    fn insert_entry(&mut self, dentry: Dentry) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, dentry);
        id
    }

    /// Builds an entry with no parent and no bound slot.
    pub fn create_detached_entry(&mut self, name: &str, kind: FileType) -> Result<EntryId> {
        validate_name(name)?;
        Ok(self.insert_entry(Dentry {
            name: name.to_string(),
            kind,
            binding: Binding::Unbound,
            parent: None,
        }))
    }

    /// Builds an entry read back from a directory extent, linked under `parent`
    /// but not yet listed in the parent's children.
    pub(crate) fn create_loaded_child(
        &mut self,
        parent: EntryId,
        name: String,
        kind: FileType,
        binding: Binding,
    ) -> EntryId {
        self.insert_entry(Dentry {
            name,
            kind,
            binding,
            parent: Some(parent),
        })
    }

    /// Drops a detached entry whose record, if any, is already gone.
    pub fn discard_entry(&mut self, id: EntryId) -> Result<()> {
        if id == self.root {
            return Err(FsError::InvalidArgument);
        }
        let dentry = self.entry(id)?;
        if dentry.parent.is_some() || matches!(dentry.binding, Binding::Loaded(_)) {
            return Err(FsError::InvalidArgument);
        }
        self.entries.remove(&id);
        Ok(())
    }

    /// Renames an entry in place.
    pub(crate) fn rename_entry(&mut self, id: EntryId, name: &str) -> Result<()> {
        validate_name(name)?;
        self.entry_mut(id)?.name = name.to_string();
        Ok(())
    }

    /// Prepends `entry` to the children of the directory record at `parent_slot`.
    pub fn attach_child(&mut self, parent_slot: u32, entry: EntryId) -> Result<()> {
        if self.entry(entry)?.parent.is_some() || entry == self.root {
            return Err(FsError::InvalidArgument);
        }
        let capacity = self.dir_capacity();
        let parent = self.record_mut(parent_slot)?;
        if parent.kind != FileType::Directory {
            return Err(FsError::Unsupported);
        }
        if parent.children.len() >= capacity {
            return Err(FsError::NoSpace);
        }
        parent.children.insert(0, entry);
        let owner = parent.owner;
        self.entry_mut(entry)?.parent = Some(owner);
        Ok(())
    }

    /// Unlinks `entry` from its parent. The entry itself survives.
    pub fn detach_child(&mut self, entry: EntryId) -> Result<()> {
        if entry == self.root {
            return Err(FsError::InvalidArgument);
        }
        let parent = self.entry(entry)?.parent.ok_or(FsError::InvalidArgument)?;
        let parent_slot = self.loaded_slot(parent)?;
        let siblings = &mut self.record_mut(parent_slot)?.children;
        let pos = siblings
            .iter()
            .position(|&child| child == entry)
            .ok_or(FsError::NotFound)?;
        siblings.remove(pos);
        self.entry_mut(entry)?.parent = None;
        Ok(())
    }

    /// Obtains a slot and binds a fresh, empty record of the entry's kind to it.
    pub fn allocate_record(&mut self, bitmap: &mut SlotBitmap, entry: EntryId) -> Result<u32> {
        let dentry = self.entry(entry)?;
        if dentry.binding != Binding::Unbound {
            return Err(FsError::InvalidArgument);
        }
        let kind = dentry.kind;
        let slot = bitmap.alloc()?;
        let data = match kind {
            FileType::Regular => Some(vec![0u8; self.extent_size]),
            FileType::Directory => None,
        };
        self.install_record(
            entry,
            Inode {
                slot,
                kind,
                size: 0,
                children: Vec::new(),
                data,
                owner: entry,
            },
        )?;
        Ok(slot)
    }

    /// Whether a record is resident at `slot`.
    pub fn has_record(&self, slot: u32) -> bool {
        self.records.contains_key(&slot)
    }

    /// Makes `inode` resident and binds it to `entry`.
    /// A slot already holding a resident record means the bitmap or a
    /// directory table lied about it.
    pub(crate) fn install_record(&mut self, entry: EntryId, inode: Inode) -> Result<()> {
        let slot = inode.slot;
        if self.records.contains_key(&slot) {
            warn!("slot {} already holds a resident record", slot);
            return Err(FsError::Corrupted);
        }
        self.entry_mut(entry)?.binding = Binding::Loaded(slot);
        self.records.insert(slot, inode);
        Ok(())
    }

    /// The index-th child of a directory, most recently attached first.
    pub fn child_at(&self, slot: u32, index: usize) -> Option<EntryId> {
        self.records.get(&slot)?.children.get(index).copied()
    }

    pub fn find_child(&self, slot: u32, name: &str) -> Option<EntryId> {
        self.records
            .get(&slot)?
            .children
            .iter()
            .copied()
            .find(|child| self.entries.get(child).is_some_and(|d| d.name == name))
    }

    /// True if `ancestor` is `id` or lies on the parent chain of `id`.
    pub fn is_ancestor(&self, ancestor: EntryId, id: EntryId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.entries.get(&current).and_then(|d| d.parent);
        }
        false
    }
}

/// Tears down the record at `slot` and everything beneath it, loading unloaded
/// children on the way. Each destroyed record's entry is unlinked and discarded
/// and its slot returned to the bitmap.
/// Returns the number of slots freed.
pub fn destroy_record<D: BlockDevice>(
    io: &AlignedIo<D>,
    superblock: &mut SuperBlock,
    bitmap: &mut SlotBitmap,
    tree: &mut Tree,
    slot: u32,
) -> Result<u32> {
    let owner = tree.record(slot)?.owner;
    if owner == tree.root() {
        return Err(FsError::InvalidArgument);
    }

    let mut freed = 0;
    let children = tree.record(slot)?.children.clone();
    for child in children {
        match tree.entry(child)?.binding {
            Binding::Loaded(child_slot) => {
                freed += destroy_record(io, superblock, bitmap, tree, child_slot)?;
            }
            Binding::Unloaded(child_slot) => {
                load_record(io, superblock, tree, child, child_slot)?;
                freed += destroy_record(io, superblock, bitmap, tree, child_slot)?;
            }
            Binding::Unbound => {
                tree.detach_child(child)?;
                tree.discard_entry(child)?;
            }
        }
    }

    let inode = tree.records.remove(&slot).ok_or(FsError::NullArgument)?;
    if inode.kind == FileType::Regular {
        superblock.usage = superblock.usage.saturating_sub(inode.size as u64);
    }

    tree.entry_mut(owner)?.binding = Binding::Unbound;
    if tree.entry(owner)?.parent.is_some() {
        tree.detach_child(owner)?;
    }
    tree.discard_entry(owner)?;
    bitmap.free(slot)?;
    Ok(freed + 1)
}
