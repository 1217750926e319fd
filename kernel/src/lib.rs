//! A crash-consistent block file system.
//!
//! Layers, bottom up: a buffer cache over a [`BlockDevice`], a redo log
//! that makes multi-block updates atomic, inodes, and directories with
//! path names on top. [`FileSystem`] owns one mounted disk; every
//! mutation runs inside a [`Transaction`] obtained from
//! [`FileSystem::begin_op`].

#![allow(clippy::new_without_default)]

#[macro_use]
extern crate bitflags;

pub mod define;
pub mod driver;
pub mod error;
pub mod fs;
pub mod lock;

pub use fs_lib::{FileName, FsParams, InodeType};

pub use driver::{BlockDevice, FileDisk, RamDisk};
pub use error::{FsError, Invariant, Result};
pub use fs::{Device, File, FileSystem, Inode, InodeFile, InodeGuard, Stat, Transaction};
pub use define::fs::OpenMode;
