//! Locks used by the file system.
//!
//! Spinlocks guard short critical sections that never block.
//! Sleep locks may be held across disk I/O; waiters sleep on a condition
//! variable instead of spinning.

pub mod spinlock;
pub mod condlock;
pub mod sleeplock;
