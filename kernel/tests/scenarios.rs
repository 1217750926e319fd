use std::sync::{Arc, Mutex};

use kernel_fs::define::fs::{BSIZE, CONSOLE, FSSIZE, ROOTDEV};
use kernel_fs::{
    Device, File, FileName, FileSystem, FsError, FsParams, InodeType, OpenMode, RamDisk,
};

fn setup() -> (Arc<RamDisk>, FileSystem) {
    let _ = env_logger::builder().is_test(true).try_init();
    let disk = Arc::new(RamDisk::new(FSSIZE as u32));
    let fs = FileSystem::format(ROOTDEV, disk.clone(), &FsParams::default()).unwrap();
    (disk, fs)
}

#[test]
fn write_read_and_extend_past_end() {
    let (_disk, fs) = setup();
    let data: Vec<u8> = (0..2000u32).map(|i| (i * 7 % 256) as u8).collect();

    let op = fs.begin_op();
    let ip = fs.ialloc(InodeType::File);
    let mut file = ip.lock();
    file.dinode_mut().nlink = 1;
    file.update();
    assert_eq!(file.write(&data, 0), Ok(2000));
    drop(file);
    drop(op);

    let mut out = vec![0; 2000];
    assert_eq!(ip.lock().read(&mut out, 0), Ok(2000));
    assert_eq!(out, data);

    let op = fs.begin_op();
    assert_eq!(ip.lock().write(&[0x5a; 100], 5000), Ok(100));
    drop(op);

    let file = ip.lock();
    assert_eq!(file.size(), 5100);
    let mut out = vec![0xff; 5100];
    assert_eq!(file.read(&mut out, 0), Ok(5100));
    assert_eq!(&out[..2000], &data[..]);
    assert!(out[2000..5000].iter().all(|&b| b == 0));
    assert!(out[5000..].iter().all(|&b| b == 0x5a));
}

#[test]
fn nested_path_round_trip() {
    let (_disk, fs) = setup();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    let c = fs.create("/a/b/c").unwrap();

    assert_eq!(fs.namei("/a/b/c").unwrap().inum(), c.inum());
    assert_eq!(fs.namei("a//b/./c").unwrap().inum(), c.inum());
    assert_eq!(fs.namei("/a/b/../b/c").unwrap().inum(), c.inum());

    let b = fs.namei("/a/b").unwrap();
    let (dir, name) = fs.nameiparent("/a/b/c").unwrap();
    assert_eq!(dir.inum(), b.inum());
    assert_eq!(name, "c");

    // a trailing slash names the directory itself
    let a = fs.namei("/a").unwrap();
    let (dir, name) = fs.nameiparent("/a/b/").unwrap();
    assert_eq!(dir.inum(), a.inum());
    assert_eq!(name, "b");

    // relative to a working directory
    let (found, _) = fs.resolve_path(Some(&b), "c", false).unwrap();
    assert_eq!(found.inum(), c.inum());
    let (found, _) = fs.resolve_path(Some(&b), "..", false).unwrap();
    assert_eq!(found.inum(), a.inum());
    let (found, _) = fs.resolve_path(Some(&b), "/a", false).unwrap();
    assert_eq!(found.inum(), a.inum());

    assert_eq!(fs.namei("/a/b/c/d").err(), Some(FsError::NotDirectory));
    assert_eq!(fs.namei("/a/x/c").err(), Some(FsError::NotFound));
}

#[test]
fn long_names_are_truncated_consistently() {
    let (_disk, fs) = setup();
    let f = fs.create("/abcdefghijklmnopqrstuvwxyz").unwrap();
    assert_eq!(fs.namei("/abcdefghijklmn").unwrap().inum(), f.inum());
    assert_eq!(fs.namei("/abcdefghijklmnXYZ").unwrap().inum(), f.inum());
    let entries = fs.root().lock().entries();
    assert!(entries.contains(&(FileName::new("abcdefghijklmn"), f.inum())));
}

#[test]
fn last_unlink_frees_blocks_and_inode() {
    let (_disk, fs) = setup();
    let free = fs.free_blocks();

    let f = fs.open("/victim", OpenMode::CREATE | OpenMode::WRONLY).unwrap();
    f.write(&vec![3; 20 * BSIZE]).unwrap();
    let inum = f.inode().inum();
    drop(f);
    // 20 data blocks and one indirect block
    assert_eq!(fs.free_blocks(), free - 21);

    fs.unlink("/victim").unwrap();
    assert_eq!(fs.free_blocks(), free);
    assert_eq!(fs.icache().refs(fs.dev(), inum), 0);

    // the on-disk inode is free again
    let op = fs.begin_op();
    let reused = fs.ialloc(InodeType::File);
    assert_eq!(reused.inum(), inum);
    let mut guard = reused.lock();
    assert_eq!(guard.size(), 0);
    guard.dinode_mut().nlink = 1;
    guard.update();
    drop(guard);
    drop(reused);
    drop(op);
}

#[test]
fn directory_entries_stay_unique() {
    let (_disk, fs) = setup();
    for name in ["x", "y", "z"] {
        drop(fs.create(&format!("/{}", name)).unwrap());
    }
    fs.unlink("/y").unwrap();
    drop(fs.create("/w").unwrap());
    assert_eq!(fs.link("/x", "/z"), Err(FsError::AlreadyExists));

    let entries = fs.root().lock().entries();
    let mut names: Vec<_> = entries.iter().map(|(n, _)| n.to_string()).collect();
    assert_eq!(names, [".", "..", "x", "w", "z"]);
    names.sort();
    names.dedup();
    assert_eq!(names.len(), entries.len());
}

/// Collects everything written to it.
#[derive(Default)]
struct Sink(Mutex<Vec<u8>>);

impl Device for Sink {
    fn read(&self, _dst: &mut [u8]) -> kernel_fs::Result<usize> {
        Ok(0)
    }

    fn write(&self, src: &[u8]) -> kernel_fs::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(src);
        Ok(src.len())
    }
}

#[test]
fn device_inodes_dispatch_to_the_driver() {
    let (_disk, fs) = setup();
    let sink = Arc::new(Sink::default());
    fs.devices().register(CONSOLE, sink.clone()).unwrap();
    fs.mknod("/console", CONSOLE, 0).unwrap();

    let console = fs.open("/console", OpenMode::RDWR).unwrap();
    assert_eq!(console.write(b"hello"), Ok(5));
    assert_eq!(&*sink.0.lock().unwrap(), b"hello");
    let mut out = [0; 4];
    assert_eq!(console.read(&mut out), Ok(0));
    // nothing stored on disk
    assert_eq!(console.stat().size, 0);
    assert_eq!(console.stat().itype, InodeType::Device);

    fs.mknod("/nodev", 7, 0).unwrap();
    let nodev = fs.open("/nodev", OpenMode::WRONLY).unwrap();
    assert_eq!(nodev.write(b"x"), Err(FsError::NoDevice(7)));
}

#[test]
fn data_survives_remount() {
    let (disk, fs) = setup();
    fs.mkdir("/etc").unwrap();
    let f = fs.open("/etc/motd", OpenMode::CREATE | OpenMode::WRONLY).unwrap();
    f.write(b"welcome").unwrap();
    drop(f);
    drop(fs);

    let fs = FileSystem::mount(ROOTDEV, disk).unwrap();
    let f = fs.open("/etc/motd", OpenMode::RDONLY).unwrap();
    let mut out = [0; 16];
    assert_eq!(f.read(&mut out), Ok(7));
    assert_eq!(&out[..7], b"welcome");
    assert_eq!(fs.stat("/etc").unwrap().itype, InodeType::Directory);
}
