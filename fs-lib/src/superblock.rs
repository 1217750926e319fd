use super::{ DiskRecord, IPB, BPB, LOGSIZE, FSSIZE, NINODES, MAXOPBLOCKS };

/// Directory entries hold a 16-bit inode number.
const MAXINODES: u32 = u16::MAX as u32 + 1;

/// Raw super block describes the disk layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSuperBlock {
    pub size: u32,       // Size of file system image (blocks)
    pub nblocks: u32,    // Number of data blocks
    pub ninodes: u32,    // Number of inodes
    pub nlog: u32,       // Number of log blocks
    pub logstart: u32,   // Block number of first log block
    pub inodestart: u32, // Block number of first inode block
    pub bmapstart: u32,  // Block number of first free map block
}

unsafe impl DiskRecord for RawSuperBlock {}

/// Geometry requested at format time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsParams {
    /// total blocks in the image
    pub size: u32,
    /// inodes to reserve, inode 0 included
    pub ninodes: u32,
    /// log blocks, header block included
    pub nlog: u32,
}

impl Default for FsParams {
    fn default() -> Self {
        Self {
            size: FSSIZE as u32,
            ninodes: NINODES as u32,
            nlog: LOGSIZE as u32,
        }
    }
}

impl RawSuperBlock {
    /// Lay out an image for `params`.
    /// Returns an error if the metadata alone does not fit.
    pub fn layout(params: &FsParams) -> Result<Self, &'static str> {
        if params.nlog <= MAXOPBLOCKS as u32 {
            return Err("log must hold a header and one full operation")
        }
        if params.ninodes < 2 {
            return Err("need room for the root inode")
        }
        if params.ninodes > MAXINODES {
            return Err("more inodes than a directory entry can name")
        }
        let nbitmap = params.size / BPB + 1;
        let ninodeblocks = params.ninodes / IPB as u32 + 1;
        let nmeta = 2 + params.nlog + ninodeblocks + nbitmap;
        if nmeta >= params.size {
            return Err("image too small for its metadata")
        }
        Ok(Self {
            size: params.size,
            nblocks: params.size - nmeta,
            ninodes: params.ninodes,
            nlog: params.nlog,
            logstart: 2,
            inodestart: 2 + params.nlog,
            bmapstart: 2 + params.nlog + ninodeblocks,
        })
    }

    /// Number of blocks before the data region.
    pub fn nmeta(&self) -> u32 {
        self.size - self.nblocks
    }

    /// Given an inode number.
    /// Return the blockno of the block this inode resides.
    pub fn locate_inode(&self, inum: u32) -> u32 {
        inum / IPB as u32 + self.inodestart
    }

    /// Given a block number in the disk.
    /// Returns the relevant block number of the (controlling) bitmap block.
    pub fn bitmap_blockno(&self, blockno: u32) -> u32 {
        blockno / BPB + self.bmapstart
    }

    /// Sanity check a super block read back from disk.
    pub fn validate(&self) -> Result<(), &'static str> {
        // widen so that garbage cannot overflow
        let (size, nblocks) = (self.size as u64, self.nblocks as u64);
        let inode_blocks = (self.ninodes as u64 + IPB as u64 - 1) / IPB as u64;
        let bitmap_blocks = (size + BPB as u64 - 1) / BPB as u64;
        if size == 0 || nblocks == 0 || nblocks >= size {
            return Err("bad block counts")
        }
        if self.ninodes > MAXINODES {
            return Err("more inodes than a directory entry can name")
        }
        if self.nlog <= MAXOPBLOCKS as u32 || self.logstart < 2 {
            return Err("bad log region")
        }
        if self.logstart as u64 + self.nlog as u64 > self.inodestart as u64 {
            return Err("log overlaps inode region")
        }
        if self.inodestart as u64 + inode_blocks > self.bmapstart as u64 {
            return Err("inode region overlaps bitmap")
        }
        if self.bmapstart as u64 + bitmap_blocks > size - nblocks {
            return Err("bitmap overlaps data region")
        }
        Ok(())
    }
}
