use std::sync::Arc;

mod common;

use common::{init_logger, RamDisk, MIB};
use slotfs::{Error, FileSystem, FileType, DIR_ENTRY_SIZE, ROOT_SLOT};

fn fresh_fs() -> FileSystem<RamDisk> {
    init_logger();
    FileSystem::mount(Arc::new(RamDisk::new(MIB, 512))).unwrap()
}

#[test]
fn test_format_fresh_device() {
    let fs = fresh_fs();
    log!("{}", fs.dump());
    assert_eq!(fs.superblock().max_slots, 406);
    assert_eq!(fs.used_slots(), 1);
    assert!(fs.is_slot_used(ROOT_SLOT));
    assert_eq!(fs.tree().dir_capacity(), 15);
}

#[test]
fn test_root_resolve() {
    let mut fs = fresh_fs();
    for path in ["/", "//", "///"] {
        let lookup = fs.resolve(path).unwrap();
        assert!(lookup.found);
        assert!(lookup.is_root);
        assert_eq!(lookup.entry, fs.root());
    }
    assert_eq!(fs.resolve(""), Err(Error::InvalidArgument));
}

#[test]
fn test_mkdir_mknod() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    let b = fs.mknod("/a/b").unwrap();
    assert_eq!(fs.entry(b).unwrap().kind(), FileType::Regular);
    assert_eq!(fs.entry(b).unwrap().name(), "b");
    assert_eq!(fs.used_slots(), 3);

    let lookup = fs.resolve("/a/b").unwrap();
    assert!(lookup.found);
    assert!(!lookup.is_root);
    assert_eq!(lookup.entry, b);
    // Repeated separators collapse.
    assert_eq!(fs.lookup("//a///b/").unwrap(), b);
}

#[test]
fn test_create_errors() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    fs.mknod("/f").unwrap();
    assert_eq!(fs.mkdir("/a"), Err(Error::AlreadyExists));
    assert_eq!(fs.mknod("/a"), Err(Error::AlreadyExists));
    assert_eq!(fs.mkdir("/"), Err(Error::AlreadyExists));
    assert_eq!(fs.mknod("/f/x"), Err(Error::Unsupported));
    assert_eq!(fs.mknod("/missing/x"), Err(Error::NotFound));
    assert_eq!(fs.mknod("/a/."), Err(Error::InvalidArgument));
    let long = format!("/{}", "n".repeat(200));
    assert_eq!(fs.mknod(&long), Err(Error::InvalidArgument));
    // Failed creations leave no slot behind.
    assert_eq!(fs.used_slots(), 3);
}

#[test]
fn test_miss_returns_deepest_ancestor() {
    let mut fs = fresh_fs();
    let a = fs.mkdir("/a").unwrap();
    let lookup = fs.resolve("/a/nope/deeper").unwrap();
    assert!(!lookup.found);
    assert_eq!(lookup.entry, a);

    let lookup = fs.resolve("/nope").unwrap();
    assert!(!lookup.found);
    assert_eq!(lookup.entry, fs.root());
    assert_eq!(fs.lookup("/nope"), Err(Error::NotFound));
}

#[test]
fn test_write_read() {
    let mut fs = fresh_fs();
    fs.mknod("/f").unwrap();
    assert_eq!(fs.write("/f", 0, b"0123456789").unwrap(), 10);
    assert_eq!(fs.write("/f", 10, b"ab").unwrap(), 2);
    assert_eq!(fs.superblock().usage, 12);

    let mut buf = [0u8; 64];
    assert_eq!(fs.read("/f", 0, &mut buf).unwrap(), 12);
    assert_eq!(&buf[..12], b"0123456789ab");
    assert_eq!(fs.read("/f", 8, &mut buf).unwrap(), 4);
    assert_eq!(&buf[..4], b"89ab");
    assert_eq!(fs.read("/f", 12, &mut buf).unwrap(), 0);

    // Writes may not leave a hole.
    assert_eq!(fs.write("/f", 13, b"x"), Err(Error::InvalidArgument));
    assert_eq!(fs.stat("/f").unwrap().size, 12);
}

#[test]
fn test_write_clamped_at_extent() {
    let mut fs = fresh_fs();
    let f = fs.mknod("/f").unwrap();
    let big = vec![0x5Au8; 4096];
    assert_eq!(fs.write_bytes(f, 0, &big).unwrap(), 2048);
    assert_eq!(fs.record(f).unwrap().size(), 2048);
    assert_eq!(fs.write_bytes(f, 2048, b"x"), Err(Error::NoSpace));
    assert_eq!(fs.superblock().usage, 2048);
}

#[test]
fn test_data_ops_on_directory() {
    let mut fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(fs.read("/d", 0, &mut buf), Err(Error::Unsupported));
    assert_eq!(fs.write("/d", 0, b"x"), Err(Error::Unsupported));
    assert_eq!(fs.open("/d"), Err(Error::Unsupported));
    assert!(fs.open_dir("/d").is_ok());
    fs.mknod("/f").unwrap();
    assert_eq!(fs.open_dir("/f"), Err(Error::Unsupported));
    assert_eq!(fs.read_dir("/f"), Err(Error::Unsupported));
}

#[test]
fn test_truncate() {
    let mut fs = fresh_fs();
    fs.mknod("/f").unwrap();
    fs.write("/f", 0, b"hello world").unwrap();
    fs.truncate("/f", 5).unwrap();
    assert_eq!(fs.stat("/f").unwrap().size, 5);
    assert_eq!(fs.superblock().usage, 5);
    fs.truncate("/f", 8).unwrap();
    let mut buf = [0xFFu8; 8];
    assert_eq!(fs.read("/f", 0, &mut buf).unwrap(), 8);
    assert_eq!(&buf, b"hello\0\0\0");
    assert_eq!(fs.truncate("/f", 4096), Err(Error::NoSpace));
}

#[test]
fn test_remove_subtree() {
    let mut fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    fs.mkdir("/d/e").unwrap();
    fs.mknod("/d/e/f").unwrap();
    fs.mknod("/d/g").unwrap();
    fs.write("/d/e/f", 0, b"1234").unwrap();
    fs.mknod("/keep").unwrap();
    assert_eq!(fs.used_slots(), 6);

    fs.remove("/d").unwrap();
    assert_eq!(fs.used_slots(), 2);
    assert_eq!(fs.superblock().usage, 0);
    assert_eq!(fs.lookup("/d"), Err(Error::NotFound));
    let names: Vec<_> = fs.read_dir("/").unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["keep"]);

    // Freed slots are handed out again.
    let again = fs.mknod("/again").unwrap();
    assert_eq!(fs.entry(again).unwrap().slot(), Some(1));
}

#[test]
fn test_remove_errors() {
    let mut fs = fresh_fs();
    assert_eq!(fs.remove("/"), Err(Error::InvalidArgument));
    assert_eq!(fs.remove("/nope"), Err(Error::NotFound));
    let root = fs.root();
    assert_eq!(fs.destroy(root), Err(Error::InvalidArgument));
}

#[test]
fn test_read_dir_order() {
    let mut fs = fresh_fs();
    fs.mknod("/a").unwrap();
    fs.mkdir("/b").unwrap();
    fs.mknod("/c").unwrap();
    let listing = fs.read_dir("/").unwrap();
    let names: Vec<_> = listing.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["c", "b", "a"]);
    assert_eq!(listing[1].kind, FileType::Directory);

    assert_eq!(fs.dir_entry_at("/", 0).unwrap().unwrap().name, "c");
    assert_eq!(fs.dir_entry_at("/", 2).unwrap().unwrap().name, "a");
    assert_eq!(fs.dir_entry_at("/", 3).unwrap(), None);
}

#[test]
fn test_stat() {
    let mut fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    fs.mknod("/d/x").unwrap();
    fs.mknod("/d/y").unwrap();
    fs.write("/d/x", 0, &[1u8; 700]).unwrap();

    let dir = fs.stat("/d").unwrap();
    assert_eq!(dir.kind, FileType::Directory);
    assert_eq!(dir.size, 2 * DIR_ENTRY_SIZE as u64);
    assert_eq!(dir.nlink, 1);

    let file = fs.stat("/d/x").unwrap();
    assert_eq!(file.kind, FileType::Regular);
    assert_eq!(file.size, 700);
    assert_eq!(file.blocks, 2);
    assert_eq!(file.block_size, 512);

    let root = fs.stat("/").unwrap();
    assert_eq!(root.nlink, 2);
    assert_eq!(root.size, 700);
    assert_eq!(root.blocks, (MIB / 512) as u64);
    assert_eq!(root.slot, ROOT_SLOT);

    assert_eq!(fs.stat("/d/z"), Err(Error::NotFound));
    assert!(fs.access("/d/y").is_ok());
    assert_eq!(fs.access("/d/z"), Err(Error::NotFound));
}

#[test]
fn test_rename() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/b").unwrap();
    let f = fs.mknod("/a/f").unwrap();
    fs.write("/a/f", 0, b"payload").unwrap();

    fs.rename("/a/f", "/b/g").unwrap();
    assert_eq!(fs.lookup("/a/f"), Err(Error::NotFound));
    assert_eq!(fs.lookup("/b/g").unwrap(), f);
    assert_eq!(fs.entry(f).unwrap().name(), "g");
    let mut buf = [0u8; 7];
    fs.read("/b/g", 0, &mut buf).unwrap();
    assert_eq!(&buf, b"payload");

    // Same directory, new name.
    fs.rename("/b/g", "/b/h").unwrap();
    assert!(fs.lookup("/b/h").is_ok());
    assert_eq!(fs.read_dir("/b").unwrap().len(), 1);
    assert_eq!(fs.used_slots(), 4);
}

#[test]
fn test_rename_errors() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/sub").unwrap();
    fs.mknod("/f").unwrap();
    fs.mknod("/g").unwrap();

    assert_eq!(fs.rename("/nope", "/x"), Err(Error::NotFound));
    assert_eq!(fs.rename("/", "/x"), Err(Error::Unsupported));
    assert_eq!(fs.rename("/f", "/g"), Err(Error::AlreadyExists));
    assert_eq!(fs.rename("/f", "/g/x"), Err(Error::Unsupported));
    assert_eq!(fs.rename("/f", "/nope/x"), Err(Error::NotFound));
    assert_eq!(fs.rename("/a", "/a/sub/a"), Err(Error::InvalidArgument));
    assert_eq!(fs.rename("/a", "/a/b"), Err(Error::InvalidArgument));

    // Nothing moved.
    assert!(fs.lookup("/a/sub").is_ok());
    assert!(fs.lookup("/f").is_ok());
}

#[test]
fn test_directory_full() {
    let mut fs = fresh_fs();
    let capacity = fs.tree().dir_capacity();
    for i in 0..capacity {
        fs.mknod(&format!("/f{}", i)).unwrap();
    }
    assert_eq!(fs.mknod("/overflow"), Err(Error::NoSpace));
    assert_eq!(fs.used_slots(), capacity as u32 + 1);

    assert_eq!(fs.mkdir("/d"), Err(Error::NoSpace));
    fs.remove("/f0").unwrap();
    fs.mkdir("/d").unwrap();
    fs.mknod("/d/x").unwrap();
    assert_eq!(fs.rename("/d/x", "/x"), Err(Error::NoSpace));
    assert!(fs.lookup("/d/x").is_ok());
}

#[test]
fn test_slots_exhausted() {
    init_logger();
    let mut fs = FileSystem::mount(Arc::new(RamDisk::with_default_blocks(64))).unwrap();
    assert_eq!(fs.superblock().max_slots, 9);
    for i in 0..8 {
        fs.mknod(&format!("/f{}", i)).unwrap();
    }
    assert_eq!(fs.free_slots(), 0);
    assert_eq!(fs.mknod("/one_more"), Err(Error::NoSpace));
    assert_eq!(fs.read_dir("/").unwrap().len(), 8);

    fs.remove("/f3").unwrap();
    assert_eq!(fs.free_slots(), 1);
    fs.mknod("/one_more").unwrap();
}

#[test]
fn test_device_too_small() {
    init_logger();
    let result = FileSystem::mount(Arc::new(RamDisk::with_default_blocks(4)));
    assert!(matches!(result, Err(Error::InvalidArgument)));
}
