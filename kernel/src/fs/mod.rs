//! File system implementation. Five layers:
//!   + Blocks: allocator for raw disk blocks.
//!   + Log: crash recovery for multi-step updates.
//!   + Files: inode allocator, reading, writing, metadata.
//!   + Directories: inode with special contents (list of other inodes!)
//!   + Names: paths like /usr/rtm/xv6/fs.c for convenient naming.
//!
//! This module owns the services of one mounted disk and hands out
//! handles that borrow from it: `Buf`, `Inode`, `Transaction`.

use std::sync::Arc;

use fs_lib::{FsParams, InodeType, RawSuperBlock};

use crate::define::fs::{BPB, BSIZE, ROOTINO};
use crate::driver::BlockDevice;
use crate::error::{FsError, Result};

mod bio;
mod bitmap;
mod devices;
mod dir;
mod file;
mod inode;
mod log;
mod namespace;
mod path;
mod stat;
mod superblock;

pub use bio::{Bcache, Buf, BufData};
pub use devices::{Device, DeviceList};
pub use file::{File, InodeFile};
pub use inode::{Inode, InodeCache, InodeGuard};
pub use self::log::Log;
pub use stat::Stat;

pub struct FileSystem {
    dev: u32,
    sb: RawSuperBlock,
    bcache: Bcache,
    log: Log,
    icache: InodeCache,
    devsw: DeviceList,
}

impl FileSystem {
    /// Mount the file system found on `disk`, which is known as device `dev`.
    /// Replays the log if the last run crashed after a commit point.
    pub fn mount(dev: u32, disk: Arc<dyn BlockDevice>) -> Result<Self> {
        let bcache = Bcache::new(dev, disk);
        let sb = superblock::read_super(&bcache)?;
        let log = Log::new(dev, &sb);
        log.recover(&bcache)?;
        ::log::info!(
            "fs: mounted dev {}: {} blocks, {} data, {} inodes, log {} at {}, inodes at {}, bitmap at {}",
            dev, sb.size, sb.nblocks, sb.ninodes, sb.nlog, sb.logstart, sb.inodestart, sb.bmapstart,
        );
        Ok(Self {
            dev,
            sb,
            bcache,
            log,
            icache: InodeCache::new(),
            devsw: DeviceList::new(),
        })
    }

    /// Write an empty file system onto `disk` and mount it.
    ///
    /// The image gets a super block, an empty log, a bitmap with every
    /// metadata block marked in use, and a root directory holding
    /// "." and "..".
    pub fn format(dev: u32, disk: Arc<dyn BlockDevice>, params: &FsParams) -> Result<Self> {
        let sb = RawSuperBlock::layout(params).map_err(FsError::BadSuperBlock)?;
        if sb.size > disk.size() {
            return Err(FsError::BadSuperBlock("image larger than the device"))
        }
        ::log::info!(
            "fs: formatting dev {}: nmeta {} (boot, super, log blocks {} inode blocks {}, bitmap blocks {}) blocks {} total {}",
            dev, sb.nmeta(), sb.nlog, sb.bmapstart - sb.inodestart,
            sb.nmeta() - sb.bmapstart, sb.nblocks, sb.size,
        );

        let zeroes = [0; BSIZE];
        for blockno in 0..sb.size {
            disk.write_block(blockno, &zeroes);
        }

        let bcache = Bcache::new(dev, disk.clone());
        superblock::write_super(&bcache, &sb);
        for base in (0..sb.nmeta()).step_by(BPB as usize) {
            let mut buf = bcache.bread(dev, sb.bitmap_blockno(base));
            let used = (sb.nmeta() - base).min(BPB);
            for bi in 0..used as usize {
                buf.bytes_mut()[bi / 8] |= 1 << (bi % 8);
            }
            buf.bwrite();
        }
        drop(bcache);

        let fs = Self::mount(dev, disk)?;
        {
            let _op = fs.begin_op();
            let root = fs.ialloc(InodeType::Directory);
            debug_assert_eq!(root.inum(), ROOTINO);
            let mut dir = root.lock();
            dir.dinode_mut().nlink = 1;
            dir.update();
            dir.dirlink(&fs_lib::FileName::new("."), ROOTINO)?;
            dir.dirlink(&fs_lib::FileName::new(".."), ROOTINO)?;
        }
        Ok(fs)
    }

    /// Start a file system operation.
    /// The operation ends, and may commit, when the guard is dropped.
    pub fn begin_op(&self) -> Transaction<'_> {
        self.log.begin_op();
        Transaction { fs: self }
    }

    /// The root directory.
    pub fn root(&self) -> Inode<'_> {
        self.iget(ROOTINO)
    }

    pub fn dev(&self) -> u32 {
        self.dev
    }

    pub fn superblock(&self) -> &RawSuperBlock {
        &self.sb
    }

    pub fn bcache(&self) -> &Bcache {
        &self.bcache
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn icache(&self) -> &InodeCache {
        &self.icache
    }

    /// Drivers for device inodes, by major number.
    pub fn devices(&self) -> &DeviceList {
        &self.devsw
    }
}

/// An open file system operation. See `FileSystem::begin_op`.
#[must_use = "the operation ends as soon as the transaction is dropped"]
pub struct Transaction<'a> {
    fs: &'a FileSystem,
}

impl<'a> Drop for Transaction<'a> {
    fn drop(&mut self) {
        self.fs.log.end_op(&self.fs.bcache)
    }
}
