//! nvsboot storage - batch reads from namespaced key-value partitions
//!
//! This crate reads the page-structured key-value partitions used for
//! device settings during early boot. A caller describes a batch of lookups
//! as [`ReadRequest`]s and hands them to [`BatchReader::read`]; each request
//! comes back with its own [`RecordStatus`] and, on success, its value.
//!
//! ```no_run
//! use nvsboot_storage::prelude::*;
//!
//! # fn main() -> nvsboot_storage::Result<()> {
//! let mut image = ImageBuilder::new(2);
//! image.add("sunny_day", "u8", 42u8)?;
//! let registry = PartitionRegistry::new();
//! registry.register("nvs", MemoryFlash::new(image.build()?))?;
//!
//! let mut buf = [0u8; 16];
//! let mut requests = [
//!     ReadRequest::new("sunny_day", "u8", ItemType::U8),
//!     ReadRequest::string("sunny_day", "greeting", Some(&mut buf[..])),
//! ];
//! BatchReader::new(registry).read("nvs", &mut requests)?;
//! assert!(requests[0].is_ok());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backends;
pub mod config;
pub mod crc;
pub mod error;
pub mod image;
pub mod page;
pub mod partition;
pub mod reader;
pub mod report;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use backends::{FileFlash, MemoryFlash};
pub use config::{PartitionConfig, PartitionSource, ReaderConfig};
pub use error::{FlashError, Result, StorageError};
pub use image::{ImageBuilder, ImageManifest, StoredValue, MAX_IMAGE_PAGES};
pub use partition::{Partition, PartitionRegistry};
pub use reader::{read_partition, BatchReader};
pub use report::{log_read_list, summarize, ListPhase, RecordSummary};
pub use traits::FlashRead;
pub use types::{ItemType, ReadRequest, ReadValue, RecordStatus, MAX_NAME_LEN};

// Re-export core types for better integration
pub use nvsboot_core::{NvsbootError, NvsbootResult, Validatable};

// Map StorageError to NvsbootError
impl From<StorageError> for NvsbootError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidArgument(msg) => NvsbootError::InvalidInput(msg),
            StorageError::Flash(e) => NvsbootError::Storage(e.to_string()),
            StorageError::Layout(msg) => NvsbootError::Storage(format!("layout: {msg}")),
            StorageError::Image(msg) => NvsbootError::InvalidInput(format!("image: {msg}")),
            StorageError::Config(msg) => NvsbootError::Configuration(msg),
            StorageError::Io(e) => NvsbootError::Internal(e.to_string()),
        }
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        BatchReader, FlashRead, ImageBuilder, ItemType, MemoryFlash, PartitionRegistry,
        ReadRequest, ReadValue, RecordStatus, Result, StorageError,
    };
}
