//! File-backed flash source
//!
//! The whole image is loaded into memory when the source is opened, so reads
//! never touch the filesystem and cannot fail halfway through a batch.

use crate::error::{FlashError, Result};
use crate::traits::FlashRead;
use crate::backends::memory::MemoryFlash;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Partition image loaded from a file
#[derive(Clone, Debug)]
pub struct FileFlash {
    path: PathBuf,
    image: MemoryFlash,
}

impl FileFlash {
    /// Load an image file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path).await?;
        tracing::debug!(path = %path.display(), size = data.len(), "loaded partition image");

        Ok(Self {
            path,
            image: MemoryFlash::new(data),
        })
    }

    /// Load an image file without an async runtime
    pub fn open_blocking(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path)?;

        Ok(Self {
            path,
            image: MemoryFlash::new(data),
        })
    }

    /// Path the image was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FlashRead for FileFlash {
    fn size(&self) -> usize {
        self.image.size()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> std::result::Result<(), FlashError> {
        self.image.read(offset, buf)
    }
}
