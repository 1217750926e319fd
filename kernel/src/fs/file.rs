//! Open files backed by inodes.

use fs_lib::InodeType;

use crate::define::fs::{OpenMode, MAXWRITE};
use crate::error::{FsError, Result};
use crate::lock::spinlock::Spinlock;
use super::inode::Inode;
use super::stat::Stat;
use super::FileSystem;

/// A byte stream a caller can read from or write to.
pub trait File {
    fn read(&self, dst: &mut [u8]) -> Result<usize>;
    fn write(&self, src: &[u8]) -> Result<usize>;
    fn readable(&self) -> bool;
    fn writeable(&self) -> bool;
}

/// An inode opened for reading and/or writing at a moving offset.
pub struct InodeFile<'a> {
    /// Guaranteed to be Some until the file is dropped.
    inode: Option<Inode<'a>>,
    readable: bool,
    writeable: bool,
    off: Spinlock<u32>,
}

impl<'a> InodeFile<'a> {
    pub fn new(inode: Inode<'a>, readable: bool, writeable: bool) -> Self {
        Self {
            inode: Some(inode),
            readable,
            writeable,
            off: Spinlock::new(0, "file offset"),
        }
    }

    pub fn inode(&self) -> &Inode<'a> {
        match self.inode.as_ref() {
            Some(inode) => inode,
            None => unreachable!("file used after close"),
        }
    }

    pub fn offset(&self) -> u32 {
        *self.off.acquire()
    }

    /// Move the offset. Seeking past the end is allowed;
    /// a later write leaves a hole.
    pub fn seek(&self, off: u32) {
        *self.off.acquire() = off;
    }

    pub fn stat(&self) -> Stat {
        self.inode().lock().stat()
    }
}

impl<'a> File for InodeFile<'a> {
    fn read(&self, dst: &mut [u8]) -> Result<usize> {
        if !self.readable {
            return Err(FsError::NotReadable)
        }
        let ip = self.inode().lock();
        let off = self.offset();
        let n = ip.read(dst, off)?;
        if ip.itype() != InodeType::Device {
            self.seek(off + n as u32);
        }
        Ok(n)
    }

    /// Write `src` at the current offset.
    ///
    /// Writes a few blocks at a time to avoid exceeding the maximum log
    /// transaction size, so a large write is not atomic: after a crash a
    /// prefix of it may be on disk.
    fn write(&self, src: &[u8]) -> Result<usize> {
        if !self.writeable {
            return Err(FsError::NotWritable)
        }
        let fs = self.inode().fs();

        let mut i = 0;
        while i < src.len() {
            let n = (src.len() - i).min(MAXWRITE);
            let _op = fs.begin_op();
            let mut ip = self.inode().lock();
            if ip.itype() == InodeType::Device {
                // no log involved, hand the whole buffer to the driver
                return ip.write(src, 0)
            }
            let off = self.offset();
            let r = ip.write(&src[i..i + n], off)?;
            self.seek(off + r as u32);
            drop(ip);
            i += r;
            if r != n {
                break
            }
        }
        Ok(i)
    }

    fn readable(&self) -> bool {
        self.readable
    }

    fn writeable(&self) -> bool {
        self.writeable
    }
}

impl<'a> Drop for InodeFile<'a> {
    /// Closing may drop the last reference to an unlinked inode,
    /// which frees it and so needs a transaction.
    fn drop(&mut self) {
        if let Some(inode) = self.inode.take() {
            let _op = inode.fs().begin_op();
            drop(inode);
        }
    }
}

impl FileSystem {
    /// Open the file at `path`.
    /// Directories may only be opened read-only.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<InodeFile<'_>> {
        let _op = self.begin_op();
        let ip = if mode.contains(OpenMode::CREATE) {
            self.create_in_op(path, InodeType::File, 0, 0)?
        } else {
            self.namei(path)?
        };

        let mut guard = ip.lock();
        if guard.is_dir() && mode.writable() {
            return Err(FsError::IsDirectory)
        }
        if mode.contains(OpenMode::TRUNC) && guard.itype() == InodeType::File {
            guard.truncate();
        }
        drop(guard);
        Ok(InodeFile::new(ip, mode.readable(), mode.writable()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define::fs::{BSIZE, MAXFILE};
    use crate::fs::tests::mkfs;

    #[test]
    fn offset_advances_with_reads_and_writes() {
        let (_disk, fs) = mkfs();
        let f = fs.open("/f", OpenMode::CREATE | OpenMode::RDWR).unwrap();
        assert_eq!(f.write(b"hello, "), Ok(7));
        assert_eq!(f.write(b"world"), Ok(5));
        assert_eq!(f.offset(), 12);
        f.seek(0);
        let mut out = [0; 32];
        assert_eq!(f.read(&mut out), Ok(12));
        assert_eq!(&out[..12], b"hello, world");
        assert_eq!(f.read(&mut out), Ok(0));
    }

    #[test]
    fn large_write_is_split_into_transactions() {
        let (_disk, fs) = mkfs();
        let f = fs.open("/big", OpenMode::CREATE | OpenMode::WRONLY).unwrap();
        let data: Vec<u8> = (0..20 * BSIZE).map(|i| (i % 251) as u8).collect();
        assert_eq!(f.write(&data), Ok(data.len()));
        assert_eq!(fs.log().pending(), 0);
        drop(f);

        let f = fs.open("/big", OpenMode::RDONLY).unwrap();
        let mut out = vec![0; data.len()];
        assert_eq!(f.read(&mut out), Ok(data.len()));
        assert_eq!(out, data);
    }

    #[test]
    fn write_stops_at_max_file_size() {
        let (_disk, fs) = mkfs();
        let f = fs.open("/max", OpenMode::CREATE | OpenMode::WRONLY).unwrap();
        f.seek((MAXFILE * BSIZE - 10) as u32);
        assert_eq!(f.write(&[1; 10]), Ok(10));
        assert_eq!(f.write(&[1; 1]), Err(FsError::FileTooLarge));
        assert_eq!(f.stat().size, (MAXFILE * BSIZE) as u64);
    }

    #[test]
    fn modes_are_enforced() {
        let (_disk, fs) = mkfs();
        let w = fs.open("/f", OpenMode::CREATE | OpenMode::WRONLY).unwrap();
        let mut out = [0; 4];
        assert_eq!(w.read(&mut out), Err(FsError::NotReadable));
        w.write(b"data").unwrap();
        let r = fs.open("/f", OpenMode::RDONLY).unwrap();
        assert_eq!(r.write(b"x"), Err(FsError::NotWritable));
        assert_eq!(fs.open("/", OpenMode::RDWR).err(), Some(FsError::IsDirectory));
        assert!(fs.open("/", OpenMode::RDONLY).is_ok());
        assert_eq!(fs.open("/none", OpenMode::RDONLY).err(), Some(FsError::NotFound));
    }

    #[test]
    fn trunc_discards_content() {
        let (_disk, fs) = mkfs();
        let free = fs.free_blocks();
        let f = fs.open("/f", OpenMode::CREATE | OpenMode::WRONLY).unwrap();
        f.write(&[9; 3 * BSIZE]).unwrap();
        drop(f);
        let f = fs.open("/f", OpenMode::WRONLY | OpenMode::TRUNC).unwrap();
        assert_eq!(f.stat().size, 0);
        assert_eq!(fs.free_blocks(), free);
    }

    #[test]
    fn closing_an_unlinked_file_frees_it() {
        let (_disk, fs) = mkfs();
        let free = fs.free_blocks();
        let f = fs.open("/tmp", OpenMode::CREATE | OpenMode::RDWR).unwrap();
        f.write(&[1; 2 * BSIZE]).unwrap();
        fs.unlink("/tmp").unwrap();
        // still readable through the open file
        f.seek(0);
        let mut out = [0; 8];
        assert_eq!(f.read(&mut out), Ok(8));
        assert!(fs.free_blocks() < free);
        drop(f);
        assert_eq!(fs.free_blocks(), free);
    }
}
