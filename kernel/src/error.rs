//! Error kinds of the file system.
//!
//! Expected failures are returned as [`FsError`] and left to the caller.
//! A broken [`Invariant`] means the on-disk or in-memory state can no
//! longer be trusted, so [`fatal`] halts instead of risking a bad write.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, FsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotDirectory,
    #[error("is a directory")]
    IsDirectory,
    #[error("file exists")]
    AlreadyExists,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("invalid file name")]
    InvalidName,
    #[error("offset beyond end of file")]
    OffsetOutOfRange,
    #[error("file too large")]
    FileTooLarge,
    #[error("no driver for major device {0}")]
    NoDevice(u16),
    #[error("link across devices")]
    CrossDevice,
    #[error("file not open for reading")]
    NotReadable,
    #[error("file not open for writing")]
    NotWritable,
    #[error("bad super block: {0}")]
    BadSuperBlock(&'static str),
    #[error("corrupt log header claims {0} blocks")]
    CorruptLog(u32),
    #[error("device error: {0}")]
    Device(&'static str),
}

/// Storage invariants whose violation halts the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Invariant {
    #[error("bget: no buffers")]
    NoBuffers,
    #[error("iget: no inodes")]
    NoInodes,
    #[error("ialloc: no free inodes on disk")]
    OutOfInodes,
    #[error("ilock: inode {0} has no type")]
    InodeTypeEmpty(u32),
    #[error("inode {0} beyond the inode region")]
    InodeOutOfRange(u32),
    #[error("log_write outside of trans")]
    OutsideTransaction,
    #[error("too big a transaction")]
    TransactionTooBig,
    #[error("end_op while the log is committing")]
    CommitWhileCommitting,
    #[error("bmap: out of range")]
    BmapOutOfRange,
    #[error("balloc: out of blocks")]
    OutOfBlocks,
    #[error("bfree: freeing free block {0}")]
    DoubleFree(u32),
    #[error("block {0} beyond the end of the device")]
    BlockOutOfRange(u32),
    #[error("bget: no disk attached as device {0}")]
    UnknownDevice(u32),
    #[error("disk: i/o error on block {0}")]
    DiskIo(u32),
    #[error("dirlookup: corrupt directory {0}")]
    DirCorrupt(u32),
    #[error("unlink: inode {0} has nlink < 1")]
    NlinkUnderflow(u32),
    #[error("iput: unlinked inode {0} still locked")]
    PutLocked(u32),
}

/// Halt on a broken storage invariant.
#[cold]
pub fn fatal(invariant: Invariant) -> ! {
    log::error!("file system invariant violated: {}", invariant);
    panic!("{}", invariant)
}
