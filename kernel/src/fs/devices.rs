//! Device switch: maps a major device number to its driver.
//! Device inodes forward their reads and writes here instead of
//! mapping blocks.

use std::sync::Arc;

use array_macro::array;

use crate::define::fs::NDEV;
use crate::error::{FsError, Result};
use crate::lock::spinlock::Spinlock;

/// A character device reachable through a device inode.
pub trait Device: Send + Sync {
    /// Read up to `dst.len()` bytes, returning how many were read.
    fn read(&self, dst: &mut [u8]) -> Result<usize>;
    /// Write `src`, returning how many bytes were accepted.
    fn write(&self, src: &[u8]) -> Result<usize>;
}

pub struct DeviceList {
    table: Spinlock<[Option<Arc<dyn Device>>; NDEV]>,
}

impl DeviceList {
    pub fn new() -> Self {
        Self {
            table: Spinlock::new(array![_ => None; NDEV], "devsw"),
        }
    }

    /// Install the driver for `major`, replacing any previous one.
    pub fn register(&self, major: u16, device: Arc<dyn Device>) -> Result<()> {
        let mut table = self.table.acquire();
        let slot = table.get_mut(major as usize).ok_or(FsError::NoDevice(major))?;
        *slot = Some(device);
        log::debug!("devsw: registered major {}", major);
        Ok(())
    }

    fn get(&self, major: u16) -> Result<Arc<dyn Device>> {
        self.table
            .acquire()
            .get(major as usize)
            .and_then(|slot| slot.clone())
            .ok_or(FsError::NoDevice(major))
    }

    // the driver runs without the table lock held

    pub fn read(&self, major: u16, dst: &mut [u8]) -> Result<usize> {
        self.get(major)?.read(dst)
    }

    pub fn write(&self, major: u16, src: &[u8]) -> Result<usize> {
        self.get(major)?.write(src)
    }
}

impl Default for DeviceList {
    fn default() -> Self {
        Self::new()
    }
}
