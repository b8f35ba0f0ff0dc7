//! Path resolution and manipulation utilities.

use log::trace;

use crate::error::{FsError, Result};
use crate::io::AlignedIo;
use crate::sync::ensure_loaded;
use crate::tree::{EntryId, Tree};
use crate::{BlockDevice, SuperBlock};

/// Outcome of walking a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    /// The matched entry, or the last entry reached before the first miss.
    pub entry: EntryId,
    pub found: bool,
    pub is_root: bool,
}

/// Walks `path` from the root, loading records as it descends.
/// On a miss, `found` is false and `entry` is the deepest ancestor that matched.
/// On a full match, the final entry's record is resident.
pub fn resolve<D: BlockDevice>(
    io: &AlignedIo<D>,
    superblock: &SuperBlock,
    tree: &mut Tree,
    path: &str,
) -> Result<Lookup> {
    if path.is_empty() {
        return Err(FsError::InvalidArgument);
    }

    let root = tree.root();
    let mut components = path.split('/').filter(|s| !s.is_empty()).peekable();
    if components.peek().is_none() {
        ensure_loaded(io, superblock, tree, root)?;
        return Ok(Lookup {
            entry: root,
            found: true,
            is_root: true,
        });
    }

    let mut current = root;
    let mut found = false;
    for component in components {
        let slot = ensure_loaded(io, superblock, tree, current)?;
        match tree.find_child(slot, component) {
            Some(child) => {
                trace!("[resolve] {} -> {:?}", component, child);
                current = child;
                found = true;
            }
            None => {
                trace!("[resolve] {} not found", component);
                found = false;
                break;
            }
        }
    }

    if found {
        ensure_loaded(io, superblock, tree, current)?;
    }
    Ok(Lookup {
        entry: current,
        found,
        is_root: false,
    })
}

/// Splits a path into its parent path and final component.
/// Trailing slashes are ignored; a path with no parent component has "/" as parent.
pub fn split(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => {
            let parent = trimmed[..idx].trim_end_matches('/');
            let parent = if parent.is_empty() { "/" } else { parent };
            (parent, &trimmed[idx + 1..])
        }
        None => ("/", trimmed),
    }
}
