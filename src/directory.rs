//! Directory entry records and name handling.

use alloc::string::String;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::{DiskDirEntry, FileType};
use crate::tree::Binding;

pub fn trim_zero(name: &[u8]) -> &[u8] {
    let end = name.iter().position(|&c| c == 0).unwrap_or(name.len());
    &name[..end]
}

fn name_cmp(n1: &[u8], n2: &[u8]) -> bool {
    trim_zero(n1) == trim_zero(n2)
}

impl DiskDirEntry {
    pub const NULL: Self = Self {
        name: [0; MAX_NAME_LEN],
        slot: NO_SLOT,
        kind: FileType::Regular as u32,
    };

    pub fn new(name: &str, slot: Option<u32>, kind: FileType) -> Result<Self> {
        let bytes = name.as_bytes();
        // One byte is kept for the terminator.
        if bytes.is_empty() || bytes.len() >= MAX_NAME_LEN {
            return Err(FsError::InvalidArgument);
        }
        let mut entry = Self::NULL;
        entry.name[..bytes.len()].copy_from_slice(bytes);
        entry.slot = slot.unwrap_or(NO_SLOT);
        entry.kind = kind as u32;
        Ok(entry)
    }

    pub fn name_eq(&self, name: &str) -> bool {
        name_cmp(&self.name, name.as_bytes())
    }

    pub fn name_str(&self) -> Result<String> {
        let bytes = trim_zero(&self.name);
        if bytes.is_empty() {
            return Err(FsError::Corrupted);
        }
        String::from_utf8(bytes.to_vec()).map_err(|_| FsError::Corrupted)
    }

    pub fn file_type(&self) -> Result<FileType> {
        FileType::try_from(self.kind)
    }

    /// Binding of an entry read back from disk. Its record is never resident yet.
    pub fn binding(&self) -> Binding {
        match self.slot {
            NO_SLOT => Binding::Unbound,
            slot => Binding::Unloaded(slot),
        }
    }
}
