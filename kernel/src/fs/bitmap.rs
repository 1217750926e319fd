//! Free block bitmap: one bit per block of the image, 1 meaning in use.
//! Every change goes through the log, so callers must be inside a transaction.

use bit_field::BitField;

use crate::define::fs::BPB;
use crate::error::{fatal, Invariant};
use super::FileSystem;

impl FileSystem {
    /// Allocate a zeroed disk block.
    pub(crate) fn balloc(&self) -> u32 {
        let size = self.sb.size;
        for base in (0..size).step_by(BPB as usize) {
            let mut buf = self.bcache.bread(self.dev, self.sb.bitmap_blockno(base));
            let bits = buf.bytes_mut();
            for bi in 0..BPB.min(size - base) {
                let byte = &mut bits[(bi / 8) as usize];
                let bit = (bi % 8) as usize;
                // Is block free?
                if !byte.get_bit(bit) {
                    byte.set_bit(bit, true);
                    self.log.write(buf);
                    let blockno = base + bi;
                    self.bzero(blockno);
                    log::trace!("balloc: block {}", blockno);
                    return blockno
                }
            }
        }
        fatal(Invariant::OutOfBlocks)
    }

    /// Free a disk block.
    pub(crate) fn bfree(&self, blockno: u32) {
        let mut buf = self.bcache.bread(self.dev, self.sb.bitmap_blockno(blockno));
        let bi = blockno % BPB;
        let byte = &mut buf.bytes_mut()[(bi / 8) as usize];
        let bit = (bi % 8) as usize;
        if !byte.get_bit(bit) {
            drop(buf);
            fatal(Invariant::DoubleFree(blockno));
        }
        byte.set_bit(bit, false);
        self.log.write(buf);
        log::trace!("bfree: block {}", blockno);
    }

    /// Count the free blocks by scanning the bitmap.
    pub fn free_blocks(&self) -> u32 {
        let size = self.sb.size;
        let mut free = 0;
        for base in (0..size).step_by(BPB as usize) {
            let buf = self.bcache.bread(self.dev, self.sb.bitmap_blockno(base));
            let bits = buf.bytes();
            free += (0..BPB.min(size - base))
                .filter(|&bi| !bits[(bi / 8) as usize].get_bit((bi % 8) as usize))
                .count() as u32;
        }
        free
    }

    /// Zero a block.
    fn bzero(&self, blockno: u32) {
        let mut buf = self.bcache.bread(self.dev, blockno);
        buf.zero();
        self.log.write(buf);
    }
}
