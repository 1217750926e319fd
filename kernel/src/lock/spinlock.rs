use core::fmt;

use spin::{Mutex, MutexGuard};

/// A named spinlock.
/// Never hold one across a sleep or a disk operation.
pub struct Spinlock<T: ?Sized> {
    name: &'static str,
    lock: Mutex<T>,
}

impl<T> Spinlock<T> {
    pub const fn new(data: T, name: &'static str) -> Self {
        Self {
            name,
            lock: Mutex::new(data),
        }
    }
}

impl<T: ?Sized> Spinlock<T> {
    pub fn acquire(&self) -> MutexGuard<'_, T> {
        self.lock.lock()
    }
}

impl<T: ?Sized> fmt::Debug for Spinlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spinlock({})", self.name)
    }
}
