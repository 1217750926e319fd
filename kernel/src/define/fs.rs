//! File system parameters.

pub use fs_lib::{
    BSIZE, MAXOPBLOCKS, LOGSIZE, ROOTINO, FSSIZE, NINODES,
    NDIRECT, NINDIRECT, MAXFILE, DIRSIZ, IPB, BPB,
};

/// size of buffer cache for block
pub const NBUF: usize = MAXOPBLOCKS * 3;
/// maximum number of active i-nodes
pub const NINODE: usize = 50;
/// maximum major device number
pub const NDEV: usize = 10;
/// device number of file system root disk
pub const ROOTDEV: u32 = 1;
/// major device number of the console
pub const CONSOLE: u16 = 1;

/// Largest write issued in one transaction. Leaves room in the per-op
/// budget for the i-node, the indirect block, bitmap blocks and
/// two blocks of slop for non-aligned writes.
pub const MAXWRITE: usize = ((MAXOPBLOCKS - 1 - 1 - 2) / 2) * BSIZE;

bitflags! {
    /// Flags accepted by open.
    pub struct OpenMode: u32 {
        const RDONLY = 0x000;
        const WRONLY = 0x001;
        const RDWR = 0x002;
        const CREATE = 0x200;
        const TRUNC = 0x400;
    }
}

impl OpenMode {
    pub fn readable(&self) -> bool {
        !self.contains(Self::WRONLY)
    }

    pub fn writable(&self) -> bool {
        self.intersects(Self::WRONLY | Self::RDWR)
    }
}
