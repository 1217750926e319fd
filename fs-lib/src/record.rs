use core::mem::size_of;
use core::{ ptr, slice };

/// A fixed-layout record that is copied verbatim between memory and disk.
///
/// # Safety
/// Implementors must be `#[repr(C)]`, contain no padding and accept every
/// bit pattern, so that any run of `size_of::<Self>()` bytes is a valid value.
pub unsafe trait DiskRecord: Copy + 'static {
    /// View the record as its on-disk bytes.
    fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self as *const Self as *const u8, size_of::<Self>()) }
    }

    /// Mutable view of the record's on-disk bytes.
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self as *mut Self as *mut u8, size_of::<Self>()) }
    }

    /// Decode a record from the front of `bytes`.
    /// Panics if `bytes` is shorter than the record.
    fn read_from(bytes: &[u8]) -> Self {
        assert!(bytes.len() >= size_of::<Self>(), "record: short buffer");
        unsafe { ptr::read_unaligned(bytes.as_ptr() as *const Self) }
    }

    /// Encode the record into the front of `bytes`.
    fn write_to(&self, bytes: &mut [u8]) {
        bytes[..size_of::<Self>()].copy_from_slice(self.as_bytes());
    }
}

unsafe impl DiskRecord for u8 {}
unsafe impl DiskRecord for u32 {}
