pub const MAGIC: u32 = 0x12345678;

pub const DEFAULT_BLOCK_SIZE: usize = 512;
pub const SUPERBLOCK_OFFSET: u64 = 0; // Byte offset of the superblock
pub const ROOT_SLOT: u32 = 0; // Slot bound to the root directory
pub const ROOT_NAME: &str = "/";

pub const META_BLOCKS_PER_SLOT: usize = 1; // Metadata table blocks owned by one slot
pub const DATA_BLOCKS_PER_SLOT: usize = 4; // Data blocks in one extent
pub const BITMAP_ALIGN_BITS: usize = 32; // Bitmaps are sized in whole 32-bit words

pub const MAX_NAME_LEN: usize = 128; // Name buffer, NUL terminator included
pub const DIR_ENTRY_SIZE: usize = MAX_NAME_LEN + 8; // Name + slot + kind
pub const INODE_SIZE: usize = 16; // Slot + child count + size + kind
pub const NO_SLOT: u32 = u32::MAX; // On-disk slot of an entry never bound to a record

pub const DEFAULT_PERM: u16 = 0o777;
