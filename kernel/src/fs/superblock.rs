//! Super block operations

use fs_lib::{DiskRecord, RawSuperBlock};

use crate::error::{FsError, Result};
use super::bio::Bcache;

/// The super block lives in block 1; block 0 is left for booting.
pub const SUPERBLOCK_BLOCKNO: u32 = 1;

/// Read the super block from disk and check that it describes
/// an image that fits the device.
pub fn read_super(bcache: &Bcache) -> Result<RawSuperBlock> {
    let buf = bcache.bread(bcache.dev(), SUPERBLOCK_BLOCKNO);
    let sb = RawSuperBlock::read_from(buf.bytes());
    drop(buf);

    sb.validate().map_err(FsError::BadSuperBlock)?;
    if sb.size > bcache.disk_size() {
        return Err(FsError::BadSuperBlock("image larger than the device"))
    }
    log::debug!("super block: {:?}", sb);
    Ok(sb)
}

/// Write the super block straight to disk.
/// Only used when formatting, before any log exists.
pub fn write_super(bcache: &Bcache, sb: &RawSuperBlock) {
    let mut buf = bcache.bread(bcache.dev(), SUPERBLOCK_BLOCKNO);
    buf.zero();
    sb.write_to(buf.bytes_mut());
    buf.bwrite();
}
