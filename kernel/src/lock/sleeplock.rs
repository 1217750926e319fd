//! sleeplock

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut, Drop};

use super::condlock::CondLock;

/// Long-term lock for data that is held across disk I/O.
pub struct SleepLock<T: ?Sized> {
    locked: CondLock<bool>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for SleepLock<T> {}
unsafe impl<T: ?Sized + Send> Send for SleepLock<T> {}

impl<T> SleepLock<T> {
    pub const fn new(data: T, name: &'static str) -> Self {
        Self {
            locked: CondLock::new(false, name),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> SleepLock<T> {
    /// Sleep until no other holder has the lock, then take it.
    pub fn lock(&self) -> SleepLockGuard<'_, T> {
        let mut locked = self.locked.acquire();
        while *locked {
            locked = self.locked.sleep(locked);
        }
        *locked = true;
        drop(locked);
        SleepLockGuard {
            lock: self,
            data: unsafe { &mut *self.data.get() },
        }
    }

    /// Take the lock only if nobody holds it.
    pub fn try_lock(&self) -> Option<SleepLockGuard<'_, T>> {
        let mut locked = self.locked.acquire();
        if *locked {
            return None
        }
        *locked = true;
        drop(locked);
        Some(SleepLockGuard {
            lock: self,
            data: unsafe { &mut *self.data.get() },
        })
    }

    pub fn holding(&self) -> bool {
        *self.locked.acquire()
    }

    /// Called by its guard when dropped
    fn unlock(&self) {
        let mut locked = self.locked.acquire();
        *locked = false;
        self.locked.wakeup();
    }
}

pub struct SleepLockGuard<'a, T: ?Sized + 'a> {
    lock: &'a SleepLock<T>,
    data: &'a mut T,
}

impl<'a, T: ?Sized> Deref for SleepLockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &*self.data
    }
}

impl<'a, T: ?Sized> DerefMut for SleepLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.data
    }
}

impl<'a, T: ?Sized> Drop for SleepLockGuard<'a, T> {
    /// Release the lock and wake anyone sleeping on it.
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
