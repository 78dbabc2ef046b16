//! Named partitions and the registry that opens them
//!
//! Partitions are registered explicitly, either in code or from a
//! [`ReaderConfig`]. The registry is a shared handle; clones see the same set.

use crate::backends::{FileFlash, MemoryFlash};
use crate::config::{PartitionSource, ReaderConfig};
use crate::error::{Result, StorageError};
use crate::image::ImageManifest;
use crate::page;
use crate::traits::FlashRead;
use nvsboot_core::Validatable;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Longest partition label in bytes
pub const MAX_LABEL_LEN: usize = 16;

/// A labelled flash source
#[derive(Clone)]
pub struct Partition {
    label: String,
    source: Arc<dyn FlashRead>,
}

impl Partition {
    /// Create a partition; the label must be 1..=16 bytes
    pub fn new(label: impl Into<String>, source: Arc<dyn FlashRead>) -> Result<Self> {
        let label = label.into();
        validate_label(&label)?;
        Ok(Self { label, source })
    }

    /// Partition label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Underlying flash source
    pub fn source(&self) -> &dyn FlashRead {
        self.source.as_ref()
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.source.size()
    }

    /// Number of pages; fails for sizes that are not page aligned
    pub fn page_count(&self) -> Result<usize> {
        page::page_count(self.source())
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("label", &self.label)
            .field("size", &self.size())
            .finish()
    }
}

/// Label → partition map shared by readers
#[derive(Clone, Default)]
pub struct PartitionRegistry {
    partitions: Arc<RwLock<HashMap<String, Partition>>>,
}

impl PartitionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every partition listed in `config`
    pub async fn from_config(config: &ReaderConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let registry = Self::new();
        for partition in &config.partitions {
            let source: Arc<dyn FlashRead> = match &partition.source {
                PartitionSource::File { path } => Arc::new(FileFlash::open(path).await?),
                PartitionSource::Manifest { path, pages } => {
                    let text = tokio::fs::read_to_string(path).await?;
                    let image = ImageManifest::from_toml_str(&text)?
                        .into_builder(*pages)?
                        .build()?;
                    Arc::new(MemoryFlash::new(image))
                }
            };
            registry.register_shared(partition.label.clone(), source)?;
        }

        tracing::info!(partitions = ?registry.labels(), "partition registry ready");
        Ok(registry)
    }

    /// Register a flash source under `label`
    pub fn register<F: FlashRead + 'static>(
        &self,
        label: impl Into<String>,
        source: F,
    ) -> Result<()> {
        self.register_shared(label, Arc::new(source))
    }

    /// Register an already shared flash source under `label`
    ///
    /// An existing partition with the same label is replaced.
    pub fn register_shared(
        &self,
        label: impl Into<String>,
        source: Arc<dyn FlashRead>,
    ) -> Result<()> {
        let partition = Partition::new(label, source)?;
        let label = partition.label.clone();
        let size = partition.size();

        if self.partitions.write().insert(label.clone(), partition).is_some() {
            tracing::warn!(partition = %label, "replaced previously registered partition");
        }
        tracing::debug!(partition = %label, size, "registered partition");
        Ok(())
    }

    /// Remove a partition; returns whether it was present
    pub fn unregister(&self, label: &str) -> bool {
        self.partitions.write().remove(label).is_some()
    }

    /// Look up a partition by label
    pub fn get(&self, label: &str) -> Option<Partition> {
        self.partitions.read().get(label).cloned()
    }

    /// Registered labels, sorted
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.partitions.read().keys().cloned().collect();
        labels.sort();
        labels
    }

    /// Number of registered partitions
    pub fn len(&self) -> usize {
        self.partitions.read().len()
    }

    /// Whether no partition is registered
    pub fn is_empty(&self) -> bool {
        self.partitions.read().is_empty()
    }
}

impl fmt::Debug for PartitionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionRegistry")
            .field("labels", &self.labels())
            .finish()
    }
}

pub(crate) fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return Err(StorageError::invalid_argument(format!(
            "partition label '{label}' must be 1..={MAX_LABEL_LEN} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PAGE_SIZE;

    #[test]
    fn test_register_and_get() {
        let registry = PartitionRegistry::new();
        assert!(registry.is_empty());

        registry.register("nvs", MemoryFlash::erased(2 * PAGE_SIZE)).unwrap();
        let partition = registry.get("nvs").unwrap();
        assert_eq!(partition.label(), "nvs");
        assert_eq!(partition.size(), 2 * PAGE_SIZE);
        assert_eq!(partition.page_count().unwrap(), 2);
        assert!(registry.get("factory_nvs").is_none());
    }

    #[test]
    fn test_labels_sorted_and_unregister() {
        let registry = PartitionRegistry::new();
        registry.register("nvs_b", MemoryFlash::erased(PAGE_SIZE)).unwrap();
        registry.register("nvs_a", MemoryFlash::erased(PAGE_SIZE)).unwrap();
        assert_eq!(registry.labels(), vec!["nvs_a".to_string(), "nvs_b".to_string()]);

        assert!(registry.unregister("nvs_a"));
        assert!(!registry.unregister("nvs_a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_replace_keeps_latest() {
        let registry = PartitionRegistry::new();
        registry.register("nvs", MemoryFlash::erased(PAGE_SIZE)).unwrap();
        registry.register("nvs", MemoryFlash::erased(3 * PAGE_SIZE)).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("nvs").unwrap().size(), 3 * PAGE_SIZE);
    }

    #[test]
    fn test_label_validation() {
        let registry = PartitionRegistry::new();
        let err = registry.register("", MemoryFlash::erased(PAGE_SIZE)).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(registry
            .register("a_label_that_is_too_long", MemoryFlash::erased(PAGE_SIZE))
            .is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = PartitionRegistry::new();
        let handle = registry.clone();
        handle.register("nvs", MemoryFlash::erased(PAGE_SIZE)).unwrap();
        assert!(registry.get("nvs").is_some());
    }
}
