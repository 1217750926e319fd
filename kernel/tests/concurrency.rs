use std::sync::Arc;
use std::thread;

use kernel_fs::define::fs::{BSIZE, FSSIZE, ROOTDEV};
use kernel_fs::{File, FileSystem, FsParams, OpenMode, RamDisk};

const THREADS: usize = 4;
const FILES: usize = 8;

fn setup() -> (Arc<RamDisk>, FileSystem) {
    let _ = env_logger::builder().is_test(true).try_init();
    let disk = Arc::new(RamDisk::new(FSSIZE as u32));
    let fs = FileSystem::format(ROOTDEV, disk.clone(), &FsParams::default()).unwrap();
    (disk, fs)
}

#[test]
fn parallel_creates_in_one_directory() {
    let (disk, fs) = setup();
    fs.mkdir("/shared").unwrap();

    thread::scope(|s| {
        for t in 0..THREADS {
            let fs = &fs;
            s.spawn(move || {
                for i in 0..FILES {
                    let path = format!("/shared/t{}-{}", t, i);
                    let f = fs.open(&path, OpenMode::CREATE | OpenMode::WRONLY).unwrap();
                    let body = vec![t as u8; BSIZE + i];
                    assert_eq!(f.write(&body), Ok(body.len()));
                }
            });
        }
    });

    let dir = fs.namei("/shared").unwrap();
    assert_eq!(dir.lock().entries().len(), 2 + THREADS * FILES);
    assert_eq!(fs.log().pending(), 0);
    assert_eq!(fs.icache().in_use(), 1);
    drop(dir);

    // everything is on disk
    drop(fs);
    let fs = FileSystem::mount(ROOTDEV, disk).unwrap();
    for t in 0..THREADS {
        for i in 0..FILES {
            let st = fs.stat(&format!("/shared/t{}-{}", t, i)).unwrap();
            assert_eq!(st.size, (BSIZE + i) as u64);
        }
    }
}

#[test]
fn parallel_appends_to_one_file() {
    let (_disk, fs) = setup();
    drop(fs.create("/log").unwrap());

    thread::scope(|s| {
        for t in 0..THREADS {
            let fs = &fs;
            s.spawn(move || {
                let f = fs.open("/log", OpenMode::WRONLY).unwrap();
                for i in 0..FILES {
                    // each thread owns its own region of the file
                    f.seek(((t * FILES + i) * 100) as u32);
                    assert_eq!(f.write(&[t as u8 + 1; 100]), Ok(100));
                }
            });
        }
    });

    let f = fs.open("/log", OpenMode::RDONLY).unwrap();
    let mut out = vec![0; THREADS * FILES * 100];
    assert_eq!(f.read(&mut out), Ok(out.len()));
    for (region, chunk) in out.chunks(FILES * 100).enumerate() {
        assert!(chunk.iter().all(|&b| b == region as u8 + 1));
    }
}

#[test]
fn create_and_unlink_race_leaves_no_leaks() {
    let (_disk, fs) = setup();
    let free = fs.free_blocks();

    thread::scope(|s| {
        for t in 0..THREADS {
            let fs = &fs;
            s.spawn(move || {
                for i in 0..FILES {
                    let path = format!("/tmp{}-{}", t, i);
                    let f = fs.open(&path, OpenMode::CREATE | OpenMode::RDWR).unwrap();
                    f.write(&[0; 2 * BSIZE]).unwrap();
                    fs.unlink(&path).unwrap();
                }
            });
        }
    });

    // the root directory may have grown by a block
    let root_size = fs.root().lock().size() as usize;
    let root_growth = ((root_size + BSIZE - 1) / BSIZE - 1) as u32;
    assert_eq!(fs.free_blocks() + root_growth, free);
    assert_eq!(fs.icache().in_use(), 0);
}
