//! In-memory flash source for tests, host tools and preloaded images

use crate::error::FlashError;
use crate::traits::FlashRead;
use bytes::Bytes;

/// Flash source backed by an immutable byte buffer
#[derive(Clone, Debug)]
pub struct MemoryFlash {
    data: Bytes,
}

impl MemoryFlash {
    /// Wrap an image
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// An erased region of `size` bytes (all 0xFF)
    pub fn erased(size: usize) -> Self {
        Self::new(vec![0xFF; size])
    }

    /// The underlying image
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl FlashRead for MemoryFlash {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        self.check_range(offset, buf.len())?;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_bounds() {
        let flash = MemoryFlash::new(vec![1u8, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        flash.read(1, &mut buf).unwrap();
        assert_eq!(buf, [2, 3, 4]);
    }

    #[test]
    fn test_read_past_end() {
        let flash = MemoryFlash::new(vec![0u8; 8]);
        let mut buf = [0u8; 4];
        let err = flash.read(6, &mut buf).unwrap_err();
        assert_eq!(
            err,
            FlashError::OutOfBounds {
                offset: 6,
                len: 4,
                size: 8
            }
        );
        // Untouched on failure
        assert_eq!(buf, [0u8; 4]);
    }

    #[test]
    fn test_offset_overflow() {
        let flash = MemoryFlash::erased(16);
        let mut buf = [0u8; 2];
        assert!(flash.read(usize::MAX, &mut buf).is_err());
    }

    #[test]
    fn test_erased() {
        let flash = MemoryFlash::erased(4096);
        assert_eq!(flash.size(), 4096);
        assert!(flash.bytes().iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn test_clone_shares_image() {
        let flash = MemoryFlash::new(vec![9u8; 4]);
        let other = flash.clone();
        assert_eq!(flash.bytes().as_ptr(), other.bytes().as_ptr());
    }
}
