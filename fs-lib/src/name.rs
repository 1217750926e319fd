use core::fmt;

use super::DIRSIZ;

/// A path component as stored in a directory entry:
/// at most `DIRSIZ` bytes, zero padded, no terminator when full.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileName([u8; DIRSIZ]);

impl FileName {
    /// Build a name from `name`, truncating it to `DIRSIZ` bytes.
    pub fn new(name: &str) -> Self {
        Self::from_bytes(name.as_bytes())
    }

    pub fn from_bytes(name: &[u8]) -> Self {
        let mut raw = [0; DIRSIZ];
        let len = name.len().min(DIRSIZ);
        raw[..len].copy_from_slice(&name[..len]);
        Self(raw)
    }

    pub const fn from_raw(raw: [u8; DIRSIZ]) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &[u8; DIRSIZ] {
        &self.0
    }

    /// The name without its zero padding.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(DIRSIZ);
        &self.0[..len]
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    pub fn is_dot(&self) -> bool {
        self.as_bytes() == b"."
    }

    pub fn is_dotdot(&self) -> bool {
        self.as_bytes() == b".."
    }
}

impl PartialEq<str> for FileName {
    fn eq(&self, other: &str) -> bool {
        *self == FileName::new(other)
    }
}

impl PartialEq<&str> for FileName {
    fn eq(&self, other: &&str) -> bool {
        *self == FileName::new(other)
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                for b in self.as_bytes() {
                    write!(f, "\\x{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}
