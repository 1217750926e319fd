use fs_lib::InodeType;

/// Information about a file, as returned by `InodeGuard::stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub dev: u32,         // File system's disk device
    pub inum: u32,        // Inode number
    pub itype: InodeType, // Type of file
    pub nlink: u16,       // Number of links to file
    pub size: u64,        // Size of file in bytes
}
