//! Name space operations built from the inode and directory layers:
//! create, link and unlink. Each public operation runs in its own
//! transaction.

use fs_lib::{FileName, InodeType};

use crate::error::{fatal, FsError, Invariant, Result};
use super::inode::Inode;
use super::stat::Stat;
use super::FileSystem;

impl FileSystem {
    /// Create a file, directory or device node at `path`.
    /// Must be called inside a transaction.
    ///
    /// Creating a regular file where one already exists returns
    /// the existing file; any other clash is `AlreadyExists`.
    /// Returns the new inode, unlocked.
    pub(crate) fn create_in_op(
        &self,
        path: &str,
        itype: InodeType,
        major: u16,
        minor: u16,
    ) -> Result<Inode<'_>> {
        let (dp, name) = self.nameiparent(path)?;
        let mut dir = dp.lock();

        match dir.dirlookup(&name) {
            Ok((ip, _)) => {
                drop(dir);
                let existing = ip.lock().itype();
                if itype == InodeType::File && existing == InodeType::File {
                    return Ok(ip)
                }
                return Err(FsError::AlreadyExists)
            }
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let ip = self.ialloc(itype);
        let mut new = ip.lock();
        let d = new.dinode_mut();
        d.major = major;
        d.minor = minor;
        d.nlink = 1;
        new.update();

        if itype == InodeType::Directory {
            // for ".."
            dir.dinode_mut().nlink += 1;
            dir.update();
            // no nlink for ".": avoid cyclic ref count
            new.dirlink(&FileName::new("."), ip.inum())?;
            new.dirlink(&FileName::new(".."), dp.inum())?;
        }

        if let Err(e) = dir.dirlink(&name, ip.inum()) {
            // give the inode back; dropping the last handle frees it
            new.dinode_mut().nlink = 0;
            new.update();
            if itype == InodeType::Directory {
                dir.dinode_mut().nlink -= 1;
                dir.update();
            }
            return Err(e)
        }
        drop(new);
        log::debug!("create: {} as inode {} ({:?})", path, ip.inum(), itype);
        Ok(ip)
    }

    /// Create an empty file, or return the file already at `path`.
    pub fn create(&self, path: &str) -> Result<Inode<'_>> {
        let _op = self.begin_op();
        self.create_in_op(path, InodeType::File, 0, 0)
    }

    pub fn mkdir(&self, path: &str) -> Result<()> {
        let _op = self.begin_op();
        self.create_in_op(path, InodeType::Directory, 0, 0).map(drop)
    }

    /// Make a device node for the driver registered as `major`.
    pub fn mknod(&self, path: &str, major: u16, minor: u16) -> Result<()> {
        let _op = self.begin_op();
        self.create_in_op(path, InodeType::Device, major, minor).map(drop)
    }

    /// Create the path `new` as a link to the same inode as `old`.
    pub fn link(&self, old: &str, new: &str) -> Result<()> {
        let _op = self.begin_op();
        let ip = self.namei(old)?;

        let mut guard = ip.lock();
        if guard.is_dir() {
            return Err(FsError::IsDirectory)
        }
        guard.dinode_mut().nlink += 1;
        guard.update();
        drop(guard);

        let linked = self.nameiparent(new).and_then(|(dp, name)| {
            let mut dir = dp.lock();
            if dp.dev() != ip.dev() {
                return Err(FsError::CrossDevice)
            }
            dir.dirlink(&name, ip.inum())
        });

        if linked.is_err() {
            let mut guard = ip.lock();
            guard.dinode_mut().nlink -= 1;
            guard.update();
        }
        linked
    }

    /// Remove the directory entry `path`.
    /// The inode is freed once its last link and last handle are gone.
    pub fn unlink(&self, path: &str) -> Result<()> {
        let _op = self.begin_op();
        let (dp, name) = self.nameiparent(path)?;
        let mut dir = dp.lock();

        // cannot unlink "." or ".."
        if name.is_dot() || name.is_dotdot() {
            return Err(FsError::InvalidName)
        }

        let (ip, off) = dir.dirlookup(&name)?;
        let mut guard = ip.lock();

        if guard.nlink() < 1 {
            fatal(Invariant::NlinkUnderflow(ip.inum()));
        }
        if guard.is_dir() && !guard.is_dir_empty() {
            return Err(FsError::DirectoryNotEmpty)
        }

        dir.dirunlink(off)?;
        if guard.is_dir() {
            dir.dinode_mut().nlink -= 1;
            dir.update();
        }
        drop(dir);

        guard.dinode_mut().nlink -= 1;
        guard.update();
        log::debug!("unlink: {} (inode {}, nlink now {})", path, ip.inum(), guard.nlink());
        Ok(())
    }

    /// Metadata of the file at `path`.
    pub fn stat(&self, path: &str) -> Result<Stat> {
        let _op = self.begin_op();
        let ip = self.namei(path)?;
        let st = ip.lock().stat();
        Ok(st)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define::fs::ROOTINO;
    use crate::fs::tests::mkfs;

    #[test]
    fn create_file_twice_returns_same_inode() {
        let (_disk, fs) = mkfs();
        let a = fs.create("/f").unwrap();
        let b = fs.create("/f").unwrap();
        assert_eq!(a.inum(), b.inum());
        assert_eq!(fs.stat("/f").unwrap().nlink, 1);
    }

    #[test]
    fn mkdir_links_dot_entries() {
        let (_disk, fs) = mkfs();
        fs.mkdir("/d").unwrap();
        assert_eq!(fs.mkdir("/d"), Err(FsError::AlreadyExists));
        assert_eq!(fs.create("/d").err(), Some(FsError::AlreadyExists));

        let d = fs.namei("/d").unwrap();
        let dir = d.lock();
        assert_eq!(dir.dirlookup(&FileName::new(".")).unwrap().0.inum(), d.inum());
        assert_eq!(dir.dirlookup(&FileName::new("..")).unwrap().0.inum(), ROOTINO);
        assert_eq!(dir.nlink(), 1);
        drop(dir);
        // ".." of the child
        assert_eq!(fs.stat("/").unwrap().nlink, 2);
    }

    #[test]
    fn link_and_unlink_track_nlink() {
        let (_disk, fs) = mkfs();
        drop(fs.create("/a").unwrap());
        fs.link("/a", "/b").unwrap();
        assert_eq!(fs.stat("/a").unwrap().nlink, 2);
        assert_eq!(fs.namei("/a").unwrap().inum(), fs.namei("/b").unwrap().inum());

        assert_eq!(fs.link("/a", "/b"), Err(FsError::AlreadyExists));
        assert_eq!(fs.stat("/a").unwrap().nlink, 2);
        assert_eq!(fs.link("/missing", "/c"), Err(FsError::NotFound));

        fs.unlink("/a").unwrap();
        assert_eq!(fs.namei("/a").err(), Some(FsError::NotFound));
        assert_eq!(fs.stat("/b").unwrap().nlink, 1);
    }

    #[test]
    fn directories_cannot_be_hard_linked() {
        let (_disk, fs) = mkfs();
        fs.mkdir("/d").unwrap();
        assert_eq!(fs.link("/d", "/e"), Err(FsError::IsDirectory));
        assert_eq!(fs.stat("/d").unwrap().nlink, 1);
    }

    #[test]
    fn unlink_refuses_dots_and_full_directories() {
        let (_disk, fs) = mkfs();
        fs.mkdir("/d").unwrap();
        drop(fs.create("/d/f").unwrap());
        assert_eq!(fs.unlink("/d/."), Err(FsError::InvalidName));
        assert_eq!(fs.unlink("/d/.."), Err(FsError::InvalidName));
        assert_eq!(fs.unlink("/d"), Err(FsError::DirectoryNotEmpty));

        fs.unlink("/d/f").unwrap();
        fs.unlink("/d").unwrap();
        assert_eq!(fs.stat("/").unwrap().nlink, 1);
        assert_eq!(fs.namei("/d").err(), Some(FsError::NotFound));
    }

    #[test]
    fn create_under_a_file_fails() {
        let (_disk, fs) = mkfs();
        drop(fs.create("/f").unwrap());
        assert_eq!(fs.create("/f/g").err(), Some(FsError::NotDirectory));
        assert_eq!(fs.create("/nope/g").err(), Some(FsError::NotFound));
    }
}
