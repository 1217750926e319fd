//! Power cuts at each step of a commit, followed by a reboot from
//! whatever reached the disk.

use std::sync::Arc;

use kernel_fs::define::fs::{BSIZE, FSSIZE, ROOTDEV};
use kernel_fs::{FileSystem, FsParams, RamDisk};

fn setup() -> (Arc<RamDisk>, FileSystem) {
    let _ = env_logger::builder().is_test(true).try_init();
    let disk = Arc::new(RamDisk::new(FSSIZE as u32));
    let fs = FileSystem::format(ROOTDEV, disk.clone(), &FsParams::default()).unwrap();
    (disk, fs)
}

fn reboot(disk: &RamDisk) -> (Arc<RamDisk>, FileSystem) {
    let rebooted = Arc::new(RamDisk::from_image(&disk.image()));
    let fs = FileSystem::mount(ROOTDEV, rebooted.clone()).unwrap();
    (rebooted, fs)
}

/// Write two blocks of 0xab to /f in one transaction, letting only
/// `survive(k)` disk writes of the commit through, where k is the
/// number of blocks in the transaction. Returns the disk and the
/// free block count seen before the transaction.
fn crash_during_commit(survive: impl Fn(usize) -> usize) -> (Arc<RamDisk>, u32) {
    let (disk, fs) = setup();
    let f = fs.create("/f").unwrap();
    let free = fs.free_blocks();

    let op = fs.begin_op();
    let mut ip = f.lock();
    ip.write(&[0xab; 2 * BSIZE], 0).unwrap();
    drop(ip);
    let k = fs.log().pending();
    // two data blocks, the bitmap block and the inode block
    assert_eq!(k, 4);
    disk.cut_power_after(survive(k));
    drop(op);

    (disk, free)
}

fn contents(fs: &FileSystem, path: &str) -> Vec<u8> {
    let ip = fs.namei(path).unwrap();
    let guard = ip.lock();
    let mut out = vec![0; guard.size() as usize];
    let n = guard.read(&mut out, 0).unwrap();
    out.truncate(n);
    out
}

#[test]
fn commit_writes_slots_header_installs_then_clear() {
    let (disk, fs) = setup();
    let f = fs.create("/f").unwrap();
    let op = fs.begin_op();
    f.lock().write(&[1; 3 * BSIZE], 0).unwrap();
    let k = fs.log().pending();
    let before = disk.writes();
    drop(op);
    assert_eq!(disk.writes() - before, 2 * k + 2);
}

#[test]
fn cut_before_header_leaves_home_blocks_untouched() {
    let (disk, free) = crash_during_commit(|k| k);
    let (_disk, fs) = reboot(&disk);
    assert!(contents(&fs, "/f").is_empty());
    assert_eq!(fs.free_blocks(), free);
}

#[test]
fn cut_after_header_is_redone_on_mount() {
    let (disk, free) = crash_during_commit(|k| k + 1);
    let (_disk, fs) = reboot(&disk);
    assert_eq!(contents(&fs, "/f"), vec![0xab; 2 * BSIZE]);
    assert_eq!(fs.free_blocks(), free - 2);
}

#[test]
fn cut_midway_through_install_is_redone_on_mount() {
    let (disk, free) = crash_during_commit(|k| k + 3);
    let (_disk, fs) = reboot(&disk);
    assert_eq!(contents(&fs, "/f"), vec![0xab; 2 * BSIZE]);
    assert_eq!(fs.free_blocks(), free - 2);
}

#[test]
fn recovery_is_idempotent() {
    let (disk, _free) = crash_during_commit(|k| k + 1);
    // crash again while recovering, right after the first install
    let again = Arc::new(RamDisk::from_image(&disk.image()));
    again.cut_power_after(1);
    drop(FileSystem::mount(ROOTDEV, again.clone()).unwrap());

    let (_disk, fs) = reboot(&again);
    assert_eq!(contents(&fs, "/f"), vec![0xab; 2 * BSIZE]);
    let (_disk, fs) = reboot(&again);
    assert_eq!(contents(&fs, "/f"), vec![0xab; 2 * BSIZE]);
}

#[test]
fn chunked_write_leaves_a_committed_prefix() {
    use kernel_fs::define::fs::MAXWRITE;
    use kernel_fs::{File, OpenMode};

    let (disk, fs) = setup();
    let f = fs.open("/big", OpenMode::CREATE | OpenMode::WRONLY).unwrap();
    // let exactly the first chunk's commit through
    let before = disk.writes();
    f.write(&[5; MAXWRITE]).unwrap();
    let per_chunk = disk.writes() - before;
    disk.cut_power_after(0);
    f.write(&[6; 4 * MAXWRITE]).unwrap();

    let (_disk, fs) = reboot(&disk);
    assert_eq!(contents(&fs, "/big"), vec![5; MAXWRITE]);
    assert!(per_chunk > 0);
}
