use super::{ DiskRecord, FileName, NDIRECT, DIRSIZ };

#[repr(u16)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InodeType {
    Empty = 0,
    Directory = 1,
    File = 2,
    Device = 3
}

impl InodeType {
    /// Decode the on-disk type field. Unknown values yield `None`.
    pub const fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Empty),
            1 => Some(Self::Directory),
            2 => Some(Self::File),
            3 => Some(Self::Device),
            _ => None,
        }
    }
}

/// On-disk inode structure
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiskInode {
    pub itype: u16, // File type
    pub major: u16, // Major device number (Device only)
    pub minor: u16, // Minor device number (Device only)
    pub nlink: u16, // Number of links to inode in file system
    pub size: u32, // Size of file (bytes)
    pub addrs: [u32; NDIRECT+1] // Data block addresses
}

unsafe impl DiskRecord for DiskInode {}

impl DiskInode {
    pub const fn new() -> Self {
        Self {
            itype: 0,
            major: 0,
            minor: 0,
            nlink: 0,
            size: 0,
            addrs: [0; NDIRECT+1]
        }
    }

    pub fn is_free(&self) -> bool {
        self.itype == InodeType::Empty as u16
    }

    /// Claim a free on-disk inode for `itype`, clearing every other field.
    pub fn try_alloc(&mut self, itype: InodeType) -> Result<(), ()> {
        if !self.is_free() {
            return Err(())
        }
        *self = Self::new();
        self.itype = itype as u16;
        Ok(())
    }
}

/// Directory entry. An inum of zero marks a free slot.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dirent {
    pub inum: u16,
    pub name: [u8; DIRSIZ]
}

unsafe impl DiskRecord for Dirent {}

impl Dirent {
    pub const fn empty() -> Self {
        Self {
            inum: 0,
            name: [0; DIRSIZ]
        }
    }

    pub fn new(inum: u16, name: &FileName) -> Self {
        Self {
            inum,
            name: *name.raw(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.inum == 0
    }

    pub fn name(&self) -> FileName {
        FileName::from_raw(self.name)
    }
}
