use super::{ DiskRecord, LOGSIZE };

/// Contents of the header block, used both on disk and in memory.
/// A non-zero `n` on disk marks a committed transaction that
/// has not yet been erased.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogHeader {
    pub n: u32,
    pub block: [u32; LOGSIZE],
}

unsafe impl DiskRecord for LogHeader {}

impl LogHeader {
    pub const fn empty() -> Self {
        Self { n: 0, block: [0; LOGSIZE] }
    }

    pub fn len(&self) -> usize {
        self.n as usize
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The home block numbers recorded so far, in log order.
    pub fn blocks(&self) -> &[u32] {
        &self.block[..self.len().min(LOGSIZE)]
    }

    /// Slot already holding `blockno`, if any.
    pub fn position(&self, blockno: u32) -> Option<usize> {
        self.blocks().iter().position(|&b| b == blockno)
    }
}
