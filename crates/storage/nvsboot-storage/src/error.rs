//! Error types for the storage crate
//!
//! A batch read reports one aggregate outcome. `Ok(())` means the batch was
//! well-formed and every record carries its own status. An
//! [`StorageError::InvalidArgument`] means the batch was rejected before any
//! lookup. Every other variant means the partition could not be read at all.

use thiserror::Error;

/// Type alias for Results using StorageError
pub type Result<T> = std::result::Result<T, StorageError>;

/// Main error type for storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The batch or partition label was rejected before any lookup
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Flash source error
    #[error("Flash error: {0}")]
    Flash(#[from] FlashError),

    /// Partition geometry or page layout cannot be processed
    #[error("Layout error: {0}")]
    Layout(String),

    /// Image assembly failed
    #[error("Image error: {0}")]
    Image(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a flash source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlashError {
    /// Read range falls outside the source
    #[error("read of {len} bytes at offset {offset:#x} exceeds size {size:#x}")]
    OutOfBounds {
        /// Requested offset in bytes
        offset: usize,
        /// Requested length in bytes
        len: usize,
        /// Size of the source in bytes
        size: usize,
    },

    /// The medium reported a failure
    #[error("medium failure: {0}")]
    Io(String),
}

impl StorageError {
    /// The batch was rejected before any lookup was attempted
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, StorageError::InvalidArgument(_))
    }

    /// The partition could not be read; per-record results are unpopulated
    pub fn is_underlying_failure(&self) -> bool {
        !self.is_invalid_argument()
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        StorageError::InvalidArgument(msg.into())
    }
}
