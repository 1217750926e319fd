//! Simple logging that allows concurrent FS operations.
//!
//! A log transaction contains the updates of multiple FS operations.
//! The log only commits when there are no FS operations active, so there
//! is never any reasoning required about whether a commit might write an
//! uncommitted operation's updates to disk.
//!
//! An operation calls `begin_op`/`end_op` to mark its start and end.
//! Usually `begin_op` just increments the count of in-progress operations
//! and returns. But if it thinks the log is close to running out, it
//! sleeps until the last outstanding `end_op` commits.
//!
//! The log is a physical re-do log containing disk blocks.
//! The on-disk log format:
//!   header block, containing block #s for block A, B, C, ...
//!   block A
//!   block B
//!   block C
//!   ...
//! Log appends are synchronous.

use fs_lib::{DiskRecord, LogHeader, RawSuperBlock};

use crate::define::fs::{LOGSIZE, MAXOPBLOCKS};
use crate::error::{fatal, FsError, Invariant, Result};
use crate::lock::condlock::CondLock;
use super::bio::{Bcache, Buf};

/// Log info about the file system.
pub struct Log {
    dev: u32,
    /// the starting block in the fs
    start: u32,
    /// the number of blocks available for log, header included
    size: u32,
    state: CondLock<LogState>,
}

struct LogState {
    /// how many FS operations are executing
    outstanding: u32,
    /// no FS op may start while the log is committing
    committing: bool,
    lh: LogHeader,
}

impl Log {
    pub fn new(dev: u32, sb: &RawSuperBlock) -> Self {
        Self {
            dev,
            start: sb.logstart,
            size: sb.nlog,
            state: CondLock::new(
                LogState { outstanding: 0, committing: false, lh: LogHeader::empty() },
                "log",
            ),
        }
    }

    /// Slots a single transaction may fill.
    fn capacity(&self) -> usize {
        LOGSIZE.min(self.size as usize - 1)
    }

    /// Recover the file system from the log if necessary.
    /// Must run before the first `begin_op`.
    pub fn recover(&self, bcache: &Bcache) -> Result<()> {
        let lh = self.read_head(bcache);
        if lh.len() > self.capacity() {
            return Err(FsError::CorruptLog(lh.n))
        }
        if lh.is_empty() {
            log::debug!("log: clean, nothing to recover");
        } else {
            log::info!("log: recovering {} committed blocks", lh.n);
            // if committed, copy from log to disk
            self.install_trans(bcache, &lh);
        }
        // clear the log
        self.write_head(bcache, &LogHeader::empty());
        Ok(())
    }

    /// Called at the start of each FS operation.
    pub fn begin_op(&self) {
        let mut guard = self.state.acquire();
        loop {
            if guard.committing {
                guard = self.state.sleep(guard);
            } else if guard.lh.len() + (guard.outstanding as usize + 1) * MAXOPBLOCKS
                > self.capacity()
            {
                // this op might exhaust log space; wait for commit.
                guard = self.state.sleep(guard);
            } else {
                guard.outstanding += 1;
                break
            }
        }
    }

    /// Called at the end of each FS operation.
    /// Commits if this was the last outstanding operation.
    pub fn end_op(&self, bcache: &Bcache) {
        let mut guard = self.state.acquire();
        guard.outstanding -= 1;
        if guard.committing {
            drop(guard);
            fatal(Invariant::CommitWhileCommitting);
        }
        if guard.outstanding > 0 {
            // begin_op may be waiting for log space
            self.state.wakeup();
            return
        }
        guard.committing = true;
        let lh = guard.lh;
        drop(guard);

        // call commit without holding locks, since it does disk I/O
        self.commit(bcache, &lh);

        let mut guard = self.state.acquire();
        guard.lh = LogHeader::empty();
        guard.committing = false;
        self.state.wakeup();
    }

    /// Record a modified buffer in the current transaction and release it.
    ///
    /// Used in place of `bwrite`. The block stays pinned in the cache until
    /// the commit installs it. Writing the same block again in one
    /// transaction reuses its slot.
    pub fn write(&self, buf: Buf<'_>) {
        let mut guard = self.state.acquire();
        if guard.outstanding < 1 {
            drop(guard);
            fatal(Invariant::OutsideTransaction);
        }
        let blockno = buf.blockno();
        if guard.lh.position(blockno).is_none() {
            let n = guard.lh.len();
            if n >= self.capacity() {
                drop(guard);
                fatal(Invariant::TransactionTooBig);
            }
            guard.lh.block[n] = blockno;
            guard.lh.n += 1;
        }
        buf.mark_dirty();
    }

    /// Number of blocks in the transaction being built.
    pub fn pending(&self) -> usize {
        self.state.acquire().lh.len()
    }

    fn commit(&self, bcache: &Bcache, lh: &LogHeader) {
        if lh.is_empty() {
            return
        }
        log::trace!("log: committing {} blocks", lh.n);
        // write modified blocks from cache to log
        self.write_log(bcache, lh);
        // write header to disk -- the real commit
        self.write_head(bcache, lh);
        // now install writes to home locations
        self.install_trans(bcache, lh);
        // erase the transaction from the log
        self.write_head(bcache, &LogHeader::empty());
    }

    /// Copy modified blocks from cache to the log region.
    fn write_log(&self, bcache: &Bcache, lh: &LogHeader) {
        for (tail, &blockno) in lh.blocks().iter().enumerate() {
            let mut to = bcache.bread(self.dev, self.start + tail as u32 + 1);
            let from = bcache.bread(self.dev, blockno);
            to.bytes_mut().copy_from_slice(from.bytes());
            to.bwrite();
        }
    }

    /// Copy committed blocks from the log to their home location.
    /// Writing the home block also unpins it.
    fn install_trans(&self, bcache: &Bcache, lh: &LogHeader) {
        for (tail, &blockno) in lh.blocks().iter().enumerate() {
            let from = bcache.bread(self.dev, self.start + tail as u32 + 1);
            let mut to = bcache.bread(self.dev, blockno);
            to.bytes_mut().copy_from_slice(from.bytes());
            to.bwrite();
        }
    }

    fn read_head(&self, bcache: &Bcache) -> LogHeader {
        let buf = bcache.bread(self.dev, self.start);
        LogHeader::read_from(buf.bytes())
    }

    /// Write a header to disk.
    /// Writing a non-empty header is the point at which a transaction commits.
    fn write_head(&self, bcache: &Bcache, lh: &LogHeader) {
        let mut buf = bcache.bread(self.dev, self.start);
        lh.write_to(buf.bytes_mut());
        buf.bwrite();
    }
}
