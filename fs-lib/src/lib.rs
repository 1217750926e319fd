//! On-disk format shared by the kernel file system and mkfs.
//!
//! Disk layout:
//! `[ boot block | super block | log | inode blocks | free bit map | data blocks ]`
//!
//! Every multi-byte field is stored little-endian.

#![cfg_attr(not(test), no_std)]
use core::mem::size_of;

mod inode;
mod logheader;
mod name;
mod record;
mod superblock;

pub use inode::{ DiskInode, Dirent, InodeType };
pub use logheader::LogHeader;
pub use name::FileName;
pub use record::DiskRecord;
pub use superblock::{ FsParams, RawSuperBlock };

/// size of disk block
pub const BSIZE: usize = 512;
/// Maxinum of blocks an FS op can write
pub const MAXOPBLOCKS: usize = 10;
/// size of log space in disk, header block included
pub const LOGSIZE: usize = MAXOPBLOCKS * 3;

/// root i-number
pub const ROOTINO: u32 = 1;
/// default size of file system in blocks
pub const FSSIZE: usize = 1000;
/// default number of inodes
pub const NINODES: usize = 200;

pub const NDIRECT: usize = 12;
pub const NINDIRECT: usize = BSIZE / size_of::<u32>();
pub const MAXFILE: usize = NDIRECT + NINDIRECT;

/// Directory is a file containing a sequence of dirent structures
pub const DIRSIZ: usize = 14;

/// Inodes per block.
pub const IPB: usize = BSIZE / size_of::<DiskInode>();

/// Bitmap bits per block
pub const BPB: u32 = (BSIZE * 8) as u32;

const _: () = assert!(BSIZE % size_of::<DiskInode>() == 0);
const _: () = assert!(BSIZE % size_of::<Dirent>() == 0);
const _: () = assert!(size_of::<LogHeader>() <= BSIZE);
const _: () = assert!(size_of::<RawSuperBlock>() <= BSIZE);
