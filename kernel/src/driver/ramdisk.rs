//! In-memory disk.
//!
//! Besides backing tests it can simulate a power cut: once the configured
//! number of writes has reached the medium, later writes are silently lost.
//! Reads keep working, so the running system does not notice.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::BlockDevice;
use crate::define::fs::BSIZE;
use crate::error::{fatal, Invariant};
use crate::lock::spinlock::Spinlock;

pub struct RamDisk {
    blocks: Spinlock<Vec<[u8; BSIZE]>>,
    writes: AtomicUsize,
    power_cut: AtomicUsize,
}

impl RamDisk {
    /// A zero-filled disk of `nblocks` blocks.
    pub fn new(nblocks: u32) -> Self {
        Self::with_blocks(vec![[0; BSIZE]; nblocks as usize])
    }

    /// A disk holding a copy of `image`, padded to whole blocks.
    pub fn from_image(image: &[u8]) -> Self {
        let blocks = image
            .chunks(BSIZE)
            .map(|chunk| {
                let mut block = [0; BSIZE];
                block[..chunk.len()].copy_from_slice(chunk);
                block
            })
            .collect();
        Self::with_blocks(blocks)
    }

    fn with_blocks(blocks: Vec<[u8; BSIZE]>) -> Self {
        Self {
            blocks: Spinlock::new(blocks, "ramdisk"),
            writes: AtomicUsize::new(0),
            power_cut: AtomicUsize::new(usize::MAX),
        }
    }

    /// What survives on the medium, e.g. to reboot from after a power cut.
    pub fn image(&self) -> Vec<u8> {
        self.blocks.acquire().iter().flatten().copied().collect()
    }

    /// Copy of one block as it is on the medium.
    pub fn block(&self, blockno: u32) -> [u8; BSIZE] {
        self.blocks.acquire()[blockno as usize]
    }

    /// Number of writes that reached the medium so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst).min(self.power_cut.load(Ordering::SeqCst))
    }

    /// Let `n` more writes through, then drop every later write.
    pub fn cut_power_after(&self, n: usize) {
        let done = self.writes.load(Ordering::SeqCst);
        self.power_cut.store(done + n, Ordering::SeqCst);
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, blockno: u32, buf: &mut [u8; BSIZE]) {
        let blocks = self.blocks.acquire();
        match blocks.get(blockno as usize) {
            Some(block) => buf.copy_from_slice(block),
            None => fatal(Invariant::BlockOutOfRange(blockno)),
        }
    }

    fn write_block(&self, blockno: u32, buf: &[u8; BSIZE]) {
        let mut blocks = self.blocks.acquire();
        if blockno as usize >= blocks.len() {
            drop(blocks);
            fatal(Invariant::BlockOutOfRange(blockno));
        }
        let nth = self.writes.fetch_add(1, Ordering::SeqCst);
        if nth >= self.power_cut.load(Ordering::SeqCst) {
            log::trace!("ramdisk: power is out, write to block {} lost", blockno);
            return
        }
        blocks[blockno as usize].copy_from_slice(buf);
    }

    fn size(&self) -> u32 {
        self.blocks.acquire().len() as u32
    }
}
