//! Paths

use fs_lib::FileName;

use crate::error::{FsError, Result};
use super::inode::Inode;
use super::FileSystem;

/// Copy the next path element from path into a name.
/// Return the element and the remainder of the path with
/// leading slashes removed, or None if there is no element.
/// An element longer than DIRSIZ is truncated.
///
/// Examples:
///   skipelem("a/bb/c") = Some(("a", "bb/c"))
///   skipelem("///a//bb") = Some(("a", "bb"))
///   skipelem("a") = Some(("a", ""))
///   skipelem("") = skipelem("////") = None
fn skipelem(path: &str) -> Option<(FileName, &str)> {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return None
    }
    let end = path.find('/').unwrap_or(path.len());
    let name = FileName::from_bytes(&path.as_bytes()[..end]);
    Some((name, path[end..].trim_start_matches('/')))
}

impl FileSystem {
    /// Look up and return the inode for a path name.
    /// If `parent` is set, stop one element early and return the inode
    /// for the parent together with the final path element.
    ///
    /// Absolute paths start at the root, relative ones at `cwd`
    /// (or the root if there is none). Only one inode is locked at a time.
    ///
    /// Dropping the inodes along the way may free an unlinked one,
    /// so call this inside a transaction when that can happen.
    pub fn resolve_path<'a>(
        &'a self,
        cwd: Option<&Inode<'a>>,
        path: &str,
        parent: bool,
    ) -> Result<(Inode<'a>, FileName)> {
        let mut ip = match cwd {
            Some(cwd) if !path.starts_with('/') => cwd.clone(),
            _ => self.root(),
        };
        let mut name = FileName::default();
        let mut path = path;

        while let Some((elem, rest)) = skipelem(path) {
            name = elem;
            path = rest;
            let dir = ip.lock();
            if !dir.is_dir() {
                return Err(FsError::NotDirectory)
            }
            if parent && path.is_empty() {
                // stop one level early
                drop(dir);
                return Ok((ip, name))
            }
            let (next, _) = dir.dirlookup(&name)?;
            drop(dir);
            ip = next;
        }

        if parent {
            // the path named no element, e.g. "/"
            return Err(FsError::NotFound)
        }
        Ok((ip, name))
    }

    /// The inode a path names.
    pub fn namei(&self, path: &str) -> Result<Inode<'_>> {
        self.resolve_path(None, path, false).map(|(ip, _)| ip)
    }

    /// The directory holding the last element of a path, and that element.
    pub fn nameiparent(&self, path: &str) -> Result<(Inode<'_>, FileName)> {
        self.resolve_path(None, path, true)
    }
}
