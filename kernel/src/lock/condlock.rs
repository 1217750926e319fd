use core::fmt;

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A lock paired with its own wait channel.
///
/// `sleep` atomically releases the lock and blocks until `wakeup`,
/// re-acquiring before it returns. Wakeups may be spurious, so callers
/// re-check their condition in a loop.
pub struct CondLock<T> {
    name: &'static str,
    lock: Mutex<T>,
    chan: Condvar,
}

impl<T> CondLock<T> {
    pub const fn new(data: T, name: &'static str) -> Self {
        Self {
            name,
            lock: Mutex::new(data),
            chan: Condvar::new(),
        }
    }

    pub fn acquire(&self) -> MutexGuard<'_, T> {
        // a panic while holding the lock has already halted the file system
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Give up the lock and sleep on this channel.
    pub fn sleep<'a>(&'a self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        self.chan.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake every sleeper on this channel.
    pub fn wakeup(&self) {
        self.chan.notify_all();
    }
}

impl<T> fmt::Debug for CondLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CondLock({})", self.name)
    }
}
