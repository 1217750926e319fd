//! Disk image kept in a host file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use super::BlockDevice;
use crate::define::fs::BSIZE;
use crate::error::{fatal, Invariant};

pub struct FileDisk {
    file: Mutex<File>,
    nblocks: u32,
}

impl FileDisk {
    /// Create (or truncate) an image of `nblocks` zeroed blocks.
    pub fn create<P: AsRef<Path>>(path: P, nblocks: u32) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(nblocks as u64 * BSIZE as u64)?;
        Ok(Self { file: Mutex::new(file), nblocks })
    }

    /// Open an existing image. Its length must be a whole number of blocks.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len % BSIZE as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image length {} is not a multiple of {} bytes", len, BSIZE),
            ))
        }
        let nblocks = u32::try_from(len / BSIZE as u64)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "image too large"))?;
        Ok(Self { file: Mutex::new(file), nblocks })
    }

    fn transfer<F>(&self, blockno: u32, op: F)
    where
        F: FnOnce(&mut File) -> io::Result<()>,
    {
        if blockno >= self.nblocks {
            fatal(Invariant::BlockOutOfRange(blockno));
        }
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        let res = file
            .seek(SeekFrom::Start(blockno as u64 * BSIZE as u64))
            .and_then(|_| op(&mut *file));
        if let Err(err) = res {
            log::error!("file disk: block {}: {}", blockno, err);
            fatal(Invariant::DiskIo(blockno));
        }
    }

    /// Flush the image to stable storage.
    pub fn sync(&self) -> io::Result<()> {
        match self.file.lock() {
            Ok(file) => file.sync_all(),
            Err(poisoned) => poisoned.into_inner().sync_all(),
        }
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, blockno: u32, buf: &mut [u8; BSIZE]) {
        self.transfer(blockno, |file| file.read_exact(buf));
    }

    fn write_block(&self, blockno: u32, buf: &[u8; BSIZE]) {
        self.transfer(blockno, |file| file.write_all(buf));
    }

    fn size(&self) -> u32 {
        self.nblocks
    }
}
