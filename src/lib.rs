//! Slotfs is a tiny single-user file system over a raw block device.
//! Every file or directory occupies one slot: a metadata record plus a
//! fixed-size data extent under the same index.
//! No support for permissions, timestamps, links, or journaling.
//!
//! Slotfs's linear layout:
//! - Superblock
//! - Metadata Bitmap
//! - Data Bitmap (mirrors the metadata bitmap)
//! - Metadata Table (one record per slot)
//! - Data Extents (one extent per slot)
//!
//! Slotfs's layers (from bottom to top):
//! 1. Block Device: whole-block transfers.                    | User implemented (or `FileDisk`)
//! 2. Aligned I/O: byte ranges over block transfers.          | Fs implemented
//! 3. Superblock/Bitmap: layout and slot allocation.          | Fs implemented
//! 4. Tree: resident entries and records, loaded lazily.      | Fs implemented
//! 5. Path/File: resolution and byte access.                  | Fs implemented
//! 6. FileSystem: the mount session driven by an OS adapter.  | Adapter implemented (FUSE, VFS, etc.)

extern crate alloc;

mod config;
mod block_dev;
mod io;
mod structs;
mod superblock;
mod bitmap;
mod inode;
mod directory;
mod tree;
mod sync;
mod path;
mod file;
mod fs;
mod error;

pub use block_dev::{BlockDevice, FileDisk};
pub use config::*;
pub use io::AlignedIo;
pub use structs::{DiskDirEntry, DiskInode, FileType, SuperBlock};
pub use superblock::{read_superblock, write_superblock};
pub use bitmap::SlotBitmap;
pub use inode::{get_inode, write_inode};
pub use tree::{destroy_record, validate_name, Binding, Dentry, EntryId, Inode, Tree};
pub use sync::{ensure_loaded, load_record, sync_subtree};
pub use path::{resolve, split, Lookup};
pub use file::{fread, ftruncate, fwrite};
pub use fs::{DirEntryInfo, FileSystem, Stat};
pub use error::FsError as Error;
pub use error::Result;
