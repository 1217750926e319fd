//! Directories.
//!
//! A directory is an inode of type `Directory` whose content is a packed
//! array of `Dirent`s. An entry with inode number zero is free.

use core::mem::size_of;

use fs_lib::{DiskRecord, Dirent, FileName};

use crate::error::{fatal, FsError, Invariant, Result};
use super::inode::{Inode, InodeGuard};

pub(crate) const DIRENT_SIZE: u32 = size_of::<Dirent>() as u32;

impl<'i, 'a> InodeGuard<'i, 'a> {
    /// Read the entry at byte offset `off` of a directory.
    pub(crate) fn dirent_at(&self, off: u32) -> Dirent {
        let mut de = Dirent::empty();
        match self.read(de.as_bytes_mut(), off) {
            Ok(n) if n == DIRENT_SIZE as usize => de,
            _ => fatal(Invariant::DirCorrupt(self.inum())),
        }
    }

    /// Look for an entry called `name` in this directory.
    /// Returns the inode it names, unlocked, and the entry's byte offset.
    pub fn dirlookup(&self, name: &FileName) -> Result<(Inode<'a>, u32)> {
        if !self.is_dir() {
            return Err(FsError::NotDirectory)
        }
        for off in (0..self.size()).step_by(DIRENT_SIZE as usize) {
            let de = self.dirent_at(off);
            if de.is_free() {
                continue
            }
            if de.name().as_bytes() == name.as_bytes() {
                // entry matches path element
                return Ok((self.fs().iget(de.inum as u32), off))
            }
        }
        Err(FsError::NotFound)
    }

    /// Write a new entry (`name`, `inum`) into this directory.
    /// Reuses the first free slot, otherwise appends.
    pub fn dirlink(&mut self, name: &FileName, inum: u32) -> Result<()> {
        if name.is_empty() {
            return Err(FsError::InvalidName)
        }
        // check that name is not present
        match self.dirlookup(name) {
            Ok(_) => return Err(FsError::AlreadyExists),
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        // look for an empty dirent
        let off = (0..self.size())
            .step_by(DIRENT_SIZE as usize)
            .find(|&off| self.dirent_at(off).is_free())
            .unwrap_or(self.size());

        let de = Dirent::new(inum as u16, name);
        if self.write(de.as_bytes(), off)? != DIRENT_SIZE as usize {
            fatal(Invariant::DirCorrupt(self.inum()));
        }
        Ok(())
    }

    /// Clear the entry at byte offset `off`.
    pub fn dirunlink(&mut self, off: u32) -> Result<()> {
        if self.write(Dirent::empty().as_bytes(), off)? != DIRENT_SIZE as usize {
            fatal(Invariant::DirCorrupt(self.inum()));
        }
        Ok(())
    }

    /// Is the directory empty except for "." and ".." ?
    pub fn is_dir_empty(&self) -> bool {
        (2 * DIRENT_SIZE..self.size())
            .step_by(DIRENT_SIZE as usize)
            .all(|off| self.dirent_at(off).is_free())
    }

    /// Every live entry of this directory, in on-disk order.
    pub fn entries(&self) -> Vec<(FileName, u32)> {
        (0..self.size())
            .step_by(DIRENT_SIZE as usize)
            .map(|off| self.dirent_at(off))
            .filter(|de| !de.is_free())
            .map(|de| (de.name(), de.inum as u32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_lib::InodeType;
    use crate::define::fs::ROOTINO;
    use crate::fs::tests::mkfs;

    #[test]
    fn root_holds_dot_entries() {
        let (_disk, fs) = mkfs();
        let root = fs.root();
        let dir = root.lock();
        let (dot, off) = dir.dirlookup(&FileName::new(".")).unwrap();
        assert_eq!((dot.inum(), off), (ROOTINO, 0));
        let (dotdot, off) = dir.dirlookup(&FileName::new("..")).unwrap();
        assert_eq!((dotdot.inum(), off), (ROOTINO, DIRENT_SIZE));
        assert!(dir.is_dir_empty());
    }

    #[test]
    fn link_lookup_unlink_reuses_slot() {
        let (_disk, fs) = mkfs();
        let _op = fs.begin_op();
        let root = fs.root();
        let mut dir = root.lock();
        let a = FileName::new("a");
        let b = FileName::new("b");

        dir.dirlink(&a, 5).unwrap();
        dir.dirlink(&b, 6).unwrap();
        assert_eq!(dir.dirlink(&a, 7), Err(FsError::AlreadyExists));
        let (_, off_a) = dir.dirlookup(&a).unwrap();
        assert_eq!(off_a, 2 * DIRENT_SIZE);
        assert!(!dir.is_dir_empty());

        dir.dirunlink(off_a).unwrap();
        assert!(matches!(dir.dirlookup(&a), Err(FsError::NotFound)));
        let size = dir.size();
        dir.dirlink(&FileName::new("c"), 8).unwrap();
        assert_eq!(dir.size(), size);
        assert_eq!(dir.dirlookup(&FileName::new("c")).unwrap().1, off_a);

        let names: Vec<_> = dir.entries().into_iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, [".", "..", "c", "b"]);
    }

    #[test]
    fn lookup_in_a_file_fails() {
        let (_disk, fs) = mkfs();
        let _op = fs.begin_op();
        let ip = fs.ialloc(InodeType::File);
        let guard = ip.lock();
        assert!(matches!(guard.dirlookup(&FileName::new("x")), Err(FsError::NotDirectory)));
    }
}
