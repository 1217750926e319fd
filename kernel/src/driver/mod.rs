//! Block device drivers.
//!
//! The buffer cache is the only caller. Transfers are synchronous:
//! when a call returns, the block has been read into, or written from,
//! the caller's buffer.

mod file_disk;
mod ramdisk;

pub use file_disk::FileDisk;
pub use ramdisk::RamDisk;

use crate::define::fs::BSIZE;

pub trait BlockDevice: Send + Sync {
    /// Read block `blockno` into `buf`.
    fn read_block(&self, blockno: u32, buf: &mut [u8; BSIZE]);
    /// Write `buf` to block `blockno`.
    fn write_block(&self, blockno: u32, buf: &[u8; BSIZE]);
    /// Number of blocks on the device.
    fn size(&self) -> u32;
}
