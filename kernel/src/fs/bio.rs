//! buffer cache layer
//!
//! The buffer cache holds cached copies of disk block contents. Caching
//! blocks in memory reduces the number of disk reads and also provides a
//! synchronization point for blocks used by multiple threads.
//!
//! Interface:
//! * To get a buffer for a particular disk block, call `bread`.
//! * After changing buffer data, call `bwrite` to write it to disk,
//!   or hand it to the log.
//! * Dropping the `Buf` releases it. Do not keep buffers longer than necessary:
//!   only one holder at a time can use a buffer.

use array_macro::array;

use core::mem::{align_of, size_of};
use core::ops::{Deref, DerefMut};
use core::slice;

use std::sync::Arc;

use fs_lib::DiskRecord;

use crate::define::fs::{BSIZE, NBUF};
use crate::driver::BlockDevice;
use crate::error::{fatal, Invariant};
use crate::lock::sleeplock::{SleepLock, SleepLockGuard};
use crate::lock::spinlock::Spinlock;

bitflags! {
    /// State of a cache slot, guarded by the cache spinlock.
    struct BufFlags: u8 {
        /// data has been read from disk
        const VALID = 1 << 0;
        /// data has been modified and must reach the disk before recycling
        const DIRTY = 1 << 1;
    }
}

/// Marks the end of the lru list.
const NIL: usize = usize::MAX;

pub struct Bcache {
    dev: u32,
    disk: Arc<dyn BlockDevice>,
    ctrl: Spinlock<BufLru>,
    bufs: [BufInner; NBUF],
}

impl Bcache {
    /// Build the cache in front of `disk`, which is known as device `dev`.
    pub fn new(dev: u32, disk: Arc<dyn BlockDevice>) -> Self {
        Self {
            dev,
            disk,
            ctrl: Spinlock::new(BufLru::new(), "bcache"),
            bufs: array![_ => BufInner::new(); NBUF],
        }
    }

    pub fn dev(&self) -> u32 {
        self.dev
    }

    /// Number of blocks on the underlying device.
    pub fn disk_size(&self) -> u32 {
        self.disk.size()
    }

    /// Look through the cache for block `blockno` on device `dev`.
    /// If not found, recycle the least recently used clean buffer.
    /// In either case, return the buffer locked, sleeping until
    /// any other holder releases it.
    fn bget(&self, dev: u32, blockno: u32) -> Buf<'_> {
        if dev != self.dev {
            fatal(Invariant::UnknownDevice(dev));
        }
        let mut ctrl = self.ctrl.acquire();
        let index = match ctrl.find_cached(dev, blockno) {
            Some(index) => index,
            None => match ctrl.recycle(dev, blockno) {
                Some(index) => index,
                None => {
                    drop(ctrl);
                    fatal(Invariant::NoBuffers)
                }
            },
        };
        drop(ctrl);

        Buf {
            cache: self,
            index,
            dev,
            blockno,
            data: Some(self.bufs[index].data.lock()),
        }
    }

    /// Return a locked buf with the contents of the indicated block.
    pub fn bread(&self, dev: u32, blockno: u32) -> Buf<'_> {
        let mut b = self.bget(dev, blockno);
        if !self.flags(b.index).contains(BufFlags::VALID) {
            self.disk.read_block(blockno, &mut b.data_mut().0);
            self.ctrl.acquire().inner[b.index].flags.insert(BufFlags::VALID);
        }
        b
    }

    /// Is the block currently held in the cache?
    pub fn is_cached(&self, dev: u32, blockno: u32) -> bool {
        self.ctrl
            .acquire()
            .inner
            .iter()
            .any(|b| b.dev == dev && b.blockno == blockno && b.flags.contains(BufFlags::VALID))
    }

    /// Is the block pinned in the cache waiting for the log to write it?
    pub fn is_dirty(&self, dev: u32, blockno: u32) -> bool {
        self.ctrl
            .acquire()
            .inner
            .iter()
            .any(|b| b.dev == dev && b.blockno == blockno && b.flags.contains(BufFlags::DIRTY))
    }

    fn flags(&self, index: usize) -> BufFlags {
        self.ctrl.acquire().inner[index].flags
    }

    /// Drop one reference and move the buf to the head of the
    /// most-recently-used list once nobody refers to it.
    fn brelse(&self, index: usize) {
        self.ctrl.acquire().move_if_no_ref(index);
    }
}

/// A locked cache block.
/// Released, and its waiters woken, when dropped.
pub struct Buf<'a> {
    cache: &'a Bcache,
    index: usize,
    dev: u32,
    blockno: u32,
    /// Guaranteed to be Some during Buf's lifetime.
    /// Introduced to let the sleeplock guard drop before the whole struct.
    data: Option<SleepLockGuard<'a, BufData>>,
}

impl<'a> Buf<'a> {
    pub fn dev(&self) -> u32 {
        self.dev
    }

    pub fn blockno(&self) -> u32 {
        self.blockno
    }

    /// Write the buf's contents to disk now.
    pub fn bwrite(&mut self) {
        self.mark_dirty();
        self.cache.disk.write_block(self.blockno, &self.data().0);
        let mut ctrl = self.cache.ctrl.acquire();
        let flags = &mut ctrl.inner[self.index].flags;
        flags.remove(BufFlags::DIRTY);
        flags.insert(BufFlags::VALID);
    }

    /// Pin the buf in the cache until it is written.
    /// The log calls this in place of `bwrite`.
    pub(crate) fn mark_dirty(&self) {
        self.cache.ctrl.acquire().inner[self.index].flags.insert(BufFlags::DIRTY);
    }

    fn data(&self) -> &BufData {
        match self.data.as_ref() {
            Some(guard) => guard,
            None => unreachable!("buf used after release"),
        }
    }

    fn data_mut(&mut self) -> &mut BufData {
        match self.data.as_mut() {
            Some(guard) => guard,
            None => unreachable!("buf used after release"),
        }
    }
}

impl<'a> Deref for Buf<'a> {
    type Target = BufData;
    fn deref(&self) -> &BufData {
        self.data()
    }
}

impl<'a> DerefMut for Buf<'a> {
    fn deref_mut(&mut self) -> &mut BufData {
        self.data_mut()
    }
}

impl<'a> Drop for Buf<'a> {
    fn drop(&mut self) {
        drop(self.data.take());
        self.cache.brelse(self.index);
    }
}

/// Recency list over the cache slots, linked by index.
/// `head` is the most recently used entry.
struct BufLru {
    inner: [BufCtrl; NBUF],
    head: usize,
    tail: usize,
}

impl BufLru {
    fn new() -> Self {
        let mut inner = array![_ => BufCtrl::new(); NBUF];
        for (i, b) in inner.iter_mut().enumerate() {
            b.prev = if i == 0 { NIL } else { i - 1 };
            b.next = if i + 1 == NBUF { NIL } else { i + 1 };
        }
        Self { inner, head: 0, tail: NBUF - 1 }
    }

    /// Find if the requested block is cached.
    /// Return its index and incr the refcnt if found.
    fn find_cached(&mut self, dev: u32, blockno: u32) -> Option<usize> {
        let mut i = self.head;
        while i != NIL {
            let b = &mut self.inner[i];
            if b.refcnt > 0 || b.flags.intersects(BufFlags::VALID | BufFlags::DIRTY) {
                if b.dev == dev && b.blockno == blockno {
                    b.refcnt += 1;
                    return Some(i)
                }
            }
            i = b.next;
        }
        None
    }

    /// Recycle an unused buffer from the tail.
    /// A dirty buffer holds changes the log has not committed yet,
    /// so it is never a candidate.
    fn recycle(&mut self, dev: u32, blockno: u32) -> Option<usize> {
        let mut i = self.tail;
        while i != NIL {
            let b = &mut self.inner[i];
            if b.refcnt == 0 && !b.flags.contains(BufFlags::DIRTY) {
                b.dev = dev;
                b.blockno = blockno;
                b.flags = BufFlags::empty();
                b.refcnt = 1;
                return Some(i)
            }
            i = b.prev;
        }
        None
    }

    /// Move an entry to the head if no live ref.
    fn move_if_no_ref(&mut self, index: usize) {
        let b = &mut self.inner[index];
        b.refcnt -= 1;
        if b.refcnt > 0 || self.head == index {
            return
        }
        let (prev, next) = (b.prev, b.next);

        // detach
        if prev != NIL {
            self.inner[prev].next = next;
        }
        if next != NIL {
            self.inner[next].prev = prev;
        } else {
            self.tail = prev;
        }

        // attach at the head
        let old_head = self.head;
        self.inner[index].prev = NIL;
        self.inner[index].next = old_head;
        self.inner[old_head].prev = index;
        self.head = index;
    }
}

struct BufCtrl {
    dev: u32,
    blockno: u32,
    prev: usize,
    next: usize,
    /// holders plus sleepers waiting for the slot
    refcnt: usize,
    flags: BufFlags,
}

impl BufCtrl {
    fn new() -> Self {
        Self {
            dev: 0,
            blockno: 0,
            prev: NIL,
            next: NIL,
            refcnt: 0,
            flags: BufFlags::empty(),
        }
    }
}

struct BufInner {
    data: SleepLock<BufData>,
}

impl BufInner {
    const fn new() -> Self {
        Self {
            data: SleepLock::new(BufData::new(), "buffer"),
        }
    }
}

/// Alignment of BufData should suffice for other structs
/// that might converts from this struct.
#[repr(C, align(8))]
pub struct BufData([u8; BSIZE]);

impl BufData {
    const fn new() -> Self {
        Self([0; BSIZE])
    }

    pub fn bytes(&self) -> &[u8; BSIZE] {
        &self.0
    }

    pub fn bytes_mut(&mut self) -> &mut [u8; BSIZE] {
        &mut self.0
    }

    pub fn zero(&mut self) {
        self.0.fill(0);
    }

    /// View the block as an array of disk records.
    pub fn records<T: DiskRecord>(&self) -> &[T] {
        debug_assert_eq!(align_of::<Self>() % align_of::<T>(), 0);
        unsafe { slice::from_raw_parts(self.0.as_ptr() as *const T, BSIZE / size_of::<T>()) }
    }

    /// Mutable view of the block as an array of disk records.
    pub fn records_mut<T: DiskRecord>(&mut self) -> &mut [T] {
        debug_assert_eq!(align_of::<Self>() % align_of::<T>(), 0);
        unsafe { slice::from_raw_parts_mut(self.0.as_mut_ptr() as *mut T, BSIZE / size_of::<T>()) }
    }
}
