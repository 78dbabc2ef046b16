//! Flash source abstraction
//!
//! A partition is read through a byte-addressable, read-only source. Offsets
//! are relative to the start of the partition.

use crate::error::FlashError;

/// Read-only access to the bytes of one partition
pub trait FlashRead: Send + Sync {
    /// Size of the source in bytes
    fn size(&self) -> usize;

    /// Fill `buf` with the bytes starting at `offset`
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Reject reads that do not fit inside the source
    fn check_range(&self, offset: usize, len: usize) -> Result<(), FlashError> {
        let size = self.size();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(FlashError::OutOfBounds { offset, len, size }),
        }
    }
}
