//! Inodes.
//!
//! An inode describes a single unnamed file. The inode disk structure
//! holds metadata: the file's type, its size, the number of links
//! referring to it, and the list of blocks holding the file's content.
//!
//! The inodes are laid out sequentially on disk at `sb.inodestart`.
//! Each inode has a number, indicating its position on the disk.
//!
//! The kernel keeps a table of in-use inodes in memory to provide a place
//! for synchronizing access to inodes used by multiple threads. The
//! in-memory inodes include book-keeping information that is not stored on
//! disk: the reference count and whether the copy is valid.
//!
//! * Allocation: an inode is allocated if its type (on disk) is non-zero.
//!   `FileSystem::ialloc` allocates, and dropping the last handle frees if
//!   the link count has fallen to zero.
//! * Referencing in table: an entry in the table is free if its reference
//!   count is zero. `FileSystem::iget` finds or creates a table entry and
//!   increments its count; cloning a handle increments it too, dropping a
//!   handle decrements it.
//! * Valid: the information in a table entry is only correct once it has
//!   been read from disk, which `Inode::lock` does on demand.
//! * Locked: code may only examine and modify the information in an inode
//!   and its content while holding the `InodeGuard` returned by `lock`.
//!
//! Separating `iget` from `lock` lets a handle be held for a long time, as
//! an open file does, while only locking for short periods. It also avoids
//! deadlock and races during path lookup.
//!
//! Any change to an inode's on-disk copy happens inside a transaction,
//! and that includes dropping the last handle to an unlinked inode,
//! which truncates and frees it.

use array_macro::array;

use fs_lib::{DiskInode, DiskRecord, InodeType};

use crate::define::fs::{BSIZE, IPB, MAXFILE, NDIRECT, NINDIRECT, NINODE};
use crate::error::{fatal, FsError, Invariant, Result};
use crate::lock::sleeplock::{SleepLock, SleepLockGuard};
use crate::lock::spinlock::Spinlock;
use super::stat::Stat;
use super::FileSystem;

pub struct InodeCache {
    meta: Spinlock<[InodeMeta; NINODE]>,
    data: [SleepLock<InodeData>; NINODE],
}

impl InodeCache {
    pub fn new() -> Self {
        Self {
            meta: Spinlock::new(array![_ => InodeMeta::new(); NINODE], "InodeMeta"),
            data: array![_ => SleepLock::new(InodeData::new(), "InodeData"); NINODE],
        }
    }

    /// Lookup the inode in the inode cache.
    /// If found, return its slot with the count bumped.
    /// If not found, claim an unused slot, but do not read it from disk yet.
    fn get(&self, dev: u32, inum: u32) -> usize {
        let mut guard = self.meta.acquire();

        let mut empty_i: Option<usize> = None;
        for (i, meta) in guard.iter_mut().enumerate() {
            if meta.refs > 0 && meta.dev == dev && meta.inum == inum {
                meta.refs += 1;
                return i
            }
            if empty_i.is_none() && meta.refs == 0 {
                empty_i = Some(i);
            }
        }

        let i = match empty_i {
            Some(i) => i,
            None => {
                drop(guard);
                fatal(Invariant::NoInodes)
            }
        };
        guard[i] = InodeMeta { dev, inum, refs: 1 };
        i
    }

    /// Increment the reference count of a slot.
    fn dup(&self, index: usize) {
        self.meta.acquire()[index].refs += 1;
    }

    /// Number of live handles to an inode, zero if it is not cached.
    pub fn refs(&self, dev: u32, inum: u32) -> usize {
        self.meta
            .acquire()
            .iter()
            .find(|m| m.refs > 0 && m.dev == dev && m.inum == inum)
            .map_or(0, |m| m.refs)
    }

    /// Number of table slots in use.
    pub fn in_use(&self) -> usize {
        self.meta.acquire().iter().filter(|m| m.refs > 0).count()
    }

    /// Drop a reference to an in-memory inode.
    /// If that was the last reference, the table entry can be recycled.
    /// If that was the last reference and the inode has no links to it,
    /// free the inode (and its content) on disk.
    /// It should only be called by the Drop impl of Inode.
    fn put(&self, inode: &Inode<'_>) {
        let i = inode.index;
        let mut guard = self.meta.acquire();
        if guard[i].refs > 1 {
            guard[i].refs -= 1;
            return
        }

        // refs == 1: no other handle exists, so nobody else can hold the lock
        let mut idata = match self.data[i].try_lock() {
            Some(idata) => idata,
            None => {
                drop(guard);
                fatal(Invariant::PutLocked(inode.inum))
            }
        };
        if !idata.valid || idata.dinode.nlink > 0 {
            // the slot may next hold a different inode
            idata.valid = false;
            drop(idata);
            guard[i].refs -= 1;
            return
        }
        drop(guard);

        // The inode has no links and no other references:
        // truncate and free. Another thread may still find the
        // entry in `get`, but it will wait on the sleeplock
        // and then see an invalid copy.
        log::debug!("iput: freeing unlinked inode {}", inode.inum);
        let mut ip = InodeGuard { inode, data: idata };
        ip.truncate();
        ip.data.dinode.itype = InodeType::Empty as u16;
        ip.update();
        ip.data.valid = false;
        drop(ip);

        // recycle only after the content in the cache is no longer valid,
        // otherwise the slot might be reused before the inode reaches the log.
        // A racing ialloc may already hold a new reference to this slot;
        // it will reread the inode from disk when it locks.
        self.meta.acquire()[i].refs -= 1;
    }
}

impl Default for InodeCache {
    fn default() -> Self {
        Self::new()
    }
}

struct InodeMeta {
    /// device number
    dev: u32,
    /// inode number
    inum: u32,
    /// reference count
    refs: usize,
}

impl InodeMeta {
    const fn new() -> Self {
        Self { dev: 0, inum: 0, refs: 0 }
    }
}

/// In-memory copy of an inode
pub struct InodeData {
    /// has the inode been read from disk?
    valid: bool,
    dinode: DiskInode,
}

impl InodeData {
    const fn new() -> Self {
        Self {
            valid: false,
            dinode: DiskInode::new(),
        }
    }
}

impl FileSystem {
    /// Find the inode with number `inum` and return its in-memory copy.
    /// Does not lock the inode and does not read it from disk.
    pub fn iget(&self, inum: u32) -> Inode<'_> {
        if inum == 0 || inum >= self.sb.ninodes {
            fatal(Invariant::InodeOutOfRange(inum));
        }
        let index = self.icache.get(self.dev, inum);
        Inode { fs: self, dev: self.dev, inum, index }
    }

    /// Allocate an inode of type `itype` on disk.
    /// Returns an unlocked but referenced inode.
    pub fn ialloc(&self, itype: InodeType) -> Inode<'_> {
        for inum in 1..self.sb.ninodes {
            let mut buf = self.bcache.bread(self.dev, self.sb.locate_inode(inum));
            let dinode = &mut buf.records_mut::<DiskInode>()[inum as usize % IPB];
            // a free inode
            if dinode.try_alloc(itype).is_ok() {
                // mark it allocated on the disk
                self.log.write(buf);
                log::debug!("ialloc: inode {} as {:?}", inum, itype);
                return self.iget(inum)
            }
        }
        fatal(Invariant::OutOfInodes)
    }
}

/// Inode handed out by the inode cache.
/// It is actually a handle pointing to a cache slot.
pub struct Inode<'a> {
    fs: &'a FileSystem,
    dev: u32,
    inum: u32,
    index: usize,
}

impl<'a> Inode<'a> {
    pub fn dev(&self) -> u32 {
        self.dev
    }

    pub fn inum(&self) -> u32 {
        self.inum
    }

    pub fn fs(&self) -> &'a FileSystem {
        self.fs
    }

    /// Lock the inode.
    /// Reads the inode from disk if necessary.
    pub fn lock(&self) -> InodeGuard<'_, 'a> {
        let mut data = self.fs.icache.data[self.index].lock();
        if !data.valid {
            let buf = self.fs.bcache.bread(self.dev, self.fs.sb.locate_inode(self.inum));
            data.dinode = buf.records::<DiskInode>()[self.inum as usize % IPB];
            drop(buf);
            match InodeType::from_raw(data.dinode.itype) {
                Some(InodeType::Empty) | None => {
                    drop(data);
                    fatal(Invariant::InodeTypeEmpty(self.inum))
                }
                Some(_) => data.valid = true,
            }
        }
        InodeGuard { inode: self, data }
    }
}

impl<'a> Clone for Inode<'a> {
    /// Increment the reference count, returning another handle
    /// to the same inode.
    fn clone(&self) -> Self {
        self.fs.icache.dup(self.index);
        Self {
            fs: self.fs,
            dev: self.dev,
            inum: self.inum,
            index: self.index,
        }
    }
}

impl<'a> Drop for Inode<'a> {
    /// Done with this inode.
    /// If this is the last reference in the inode cache, then it might be recycled.
    /// Further, if this inode has no links anymore, free this inode in the disk.
    fn drop(&mut self) {
        self.fs.icache.put(self)
    }
}

/// A locked inode. Dropping it unlocks.
pub struct InodeGuard<'i, 'a> {
    inode: &'i Inode<'a>,
    data: SleepLockGuard<'i, InodeData>,
}

impl<'i, 'a> InodeGuard<'i, 'a> {
    pub fn inode(&self) -> &'i Inode<'a> {
        self.inode
    }

    pub fn fs(&self) -> &'a FileSystem {
        self.inode.fs
    }

    pub fn inum(&self) -> u32 {
        self.inode.inum
    }

    pub fn itype(&self) -> InodeType {
        // checked by lock
        InodeType::from_raw(self.data.dinode.itype).unwrap_or(InodeType::Empty)
    }

    pub fn is_dir(&self) -> bool {
        self.itype() == InodeType::Directory
    }

    pub fn size(&self) -> u32 {
        self.data.dinode.size
    }

    pub fn nlink(&self) -> u16 {
        self.data.dinode.nlink
    }

    pub fn major(&self) -> u16 {
        self.data.dinode.major
    }

    pub fn minor(&self) -> u16 {
        self.data.dinode.minor
    }

    /// The in-memory copy of the on-disk inode.
    /// Changes reach the disk on the next `update`.
    pub fn dinode_mut(&mut self) -> &mut DiskInode {
        &mut self.data.dinode
    }

    /// Copy a modified in-memory inode to disk.
    /// Must be called after every change to a field that lives on disk.
    pub fn update(&mut self) {
        let fs = self.inode.fs;
        let mut buf = fs.bcache.bread(self.inode.dev, fs.sb.locate_inode(self.inode.inum));
        buf.records_mut::<DiskInode>()[self.inode.inum as usize % IPB] = self.data.dinode;
        fs.log.write(buf);
    }

    /// Return the disk block address of the nth block in the inode,
    /// allocating it if there is no such block.
    ///
    /// The content (data) associated with each inode is stored
    /// in blocks on the disk. The first NDIRECT block numbers
    /// are listed in `addrs`. The next NINDIRECT blocks are
    /// listed in block `addrs[NDIRECT]`.
    pub fn bmap(&mut self, bn: u32) -> u32 {
        let fs = self.inode.fs;
        let bn = bn as usize;
        let addrs = &mut self.data.dinode.addrs;

        if bn < NDIRECT {
            if addrs[bn] == 0 {
                addrs[bn] = fs.balloc();
            }
            return addrs[bn]
        }

        let bn = bn - NDIRECT;
        if bn < NINDIRECT {
            // load indirect block, allocating if necessary
            if addrs[NDIRECT] == 0 {
                addrs[NDIRECT] = fs.balloc();
            }
            let mut buf = fs.bcache.bread(self.inode.dev, addrs[NDIRECT]);
            let entries = buf.records_mut::<u32>();
            if entries[bn] != 0 {
                return entries[bn]
            }
            let addr = fs.balloc();
            entries[bn] = addr;
            fs.log.write(buf);
            return addr
        }

        fatal(Invariant::BmapOutOfRange)
    }

    /// Like `bmap`, but never allocates: a hole yields None.
    fn block_at(&self, bn: u32) -> Option<u32> {
        let fs = self.inode.fs;
        let bn = bn as usize;
        let addrs = &self.data.dinode.addrs;

        let addr = if bn < NDIRECT {
            addrs[bn]
        } else if bn < MAXFILE {
            if addrs[NDIRECT] == 0 {
                return None
            }
            let buf = fs.bcache.bread(self.inode.dev, addrs[NDIRECT]);
            buf.records::<u32>()[bn - NDIRECT]
        } else {
            fatal(Invariant::BmapOutOfRange)
        };
        (addr != 0).then(|| addr)
    }

    /// Discard the inode's content.
    pub fn truncate(&mut self) {
        let fs = self.inode.fs;
        for i in 0..NDIRECT {
            let addr = self.data.dinode.addrs[i];
            if addr != 0 {
                fs.bfree(addr);
                self.data.dinode.addrs[i] = 0;
            }
        }

        let indirect = self.data.dinode.addrs[NDIRECT];
        if indirect != 0 {
            let buf = fs.bcache.bread(self.inode.dev, indirect);
            for &addr in buf.records::<u32>() {
                if addr != 0 {
                    fs.bfree(addr);
                }
            }
            drop(buf);
            fs.bfree(indirect);
            self.data.dinode.addrs[NDIRECT] = 0;
        }

        self.data.dinode.size = 0;
        self.update();
    }

    /// Copy stat information from the inode.
    pub fn stat(&self) -> Stat {
        Stat {
            dev: self.inode.dev,
            inum: self.inode.inum,
            itype: self.itype(),
            nlink: self.data.dinode.nlink,
            size: self.data.dinode.size as u64,
        }
    }

    /// Read data from the inode into `dst`, starting at byte `off`.
    /// Returns the number of bytes read, short at end of file.
    pub fn read(&self, dst: &mut [u8], off: u32) -> Result<usize> {
        if self.itype() == InodeType::Device {
            return self.inode.fs.devices().read(self.major(), dst)
        }

        let size = self.data.dinode.size;
        if off > size {
            return Err(FsError::OffsetOutOfRange)
        }
        let n = dst.len().min((size - off) as usize);
        let fs = self.inode.fs;

        let mut tot = 0;
        let mut off = off as usize;
        while tot < n {
            let start = off % BSIZE;
            let m = (n - tot).min(BSIZE - start);
            let chunk = &mut dst[tot..tot + m];
            match self.block_at((off / BSIZE) as u32) {
                Some(addr) => {
                    let buf = fs.bcache.bread(self.inode.dev, addr);
                    chunk.copy_from_slice(&buf.bytes()[start..start + m]);
                }
                // never written
                None => chunk.fill(0),
            }
            tot += m;
            off += m;
        }
        Ok(n)
    }

    /// Write `src` to the inode, starting at byte `off`.
    /// Writing past the end of file leaves a hole that reads as zeros.
    /// Returns the number of bytes written.
    ///
    /// Must be called inside a transaction, and the write must fit the
    /// transaction's block budget; see `InodeFile` for large writes.
    pub fn write(&mut self, src: &[u8], off: u32) -> Result<usize> {
        if self.itype() == InodeType::Device {
            return self.inode.fs.devices().write(self.major(), src)
        }

        let end = off as usize + src.len();
        if end > MAXFILE * BSIZE {
            return Err(FsError::FileTooLarge)
        }
        if src.is_empty() {
            return Ok(0)
        }
        let fs = self.inode.fs;

        let mut tot = 0;
        let mut off = off as usize;
        while tot < src.len() {
            let addr = self.bmap((off / BSIZE) as u32);
            let mut buf = fs.bcache.bread(self.inode.dev, addr);
            let start = off % BSIZE;
            let m = (src.len() - tot).min(BSIZE - start);
            buf.bytes_mut()[start..start + m].copy_from_slice(&src[tot..tot + m]);
            fs.log.write(buf);
            tot += m;
            off += m;
        }

        if off as u32 > self.data.dinode.size {
            self.data.dinode.size = off as u32;
        }
        // write the i-node back to disk even if the size didn't change
        // because the loop above might have allocated a new block
        self.update();
        Ok(tot)
    }
}
