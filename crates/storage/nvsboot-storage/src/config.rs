//! Configuration of the partitions a reader opens

use crate::image::MAX_IMAGE_PAGES;
use crate::partition::MAX_LABEL_LEN;
use nvsboot_core::{NvsbootError, NvsbootResult, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Partitions to register at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Partitions in registration order
    #[serde(default)]
    pub partitions: Vec<PartitionConfig>,
}

/// One labelled partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Label used by batch reads
    pub label: String,

    /// Where the partition image comes from
    pub source: PartitionSource,
}

/// Origin of a partition image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionSource {
    /// Raw image file
    File {
        /// Path to the image
        path: PathBuf,
    },

    /// TOML manifest built into an image at load time
    Manifest {
        /// Path to the manifest
        path: PathBuf,

        /// Partition size in pages
        #[serde(default = "default_manifest_pages")]
        pages: usize,
    },
}

fn default_manifest_pages() -> usize {
    3
}

impl Validatable for ReaderConfig {
    fn validate(&self) -> NvsbootResult<()> {
        let mut seen = HashSet::new();
        for partition in &self.partitions {
            partition.validate()?;
            if !seen.insert(partition.label.as_str()) {
                return Err(NvsbootError::config(format!(
                    "partition '{}' is configured more than once",
                    partition.label
                )));
            }
        }
        Ok(())
    }
}

impl Validatable for PartitionConfig {
    fn validate(&self) -> NvsbootResult<()> {
        if self.label.is_empty() || self.label.len() > MAX_LABEL_LEN {
            return Err(NvsbootError::config(format!(
                "partition label '{}' must be 1..={MAX_LABEL_LEN} bytes",
                self.label
            )));
        }
        if let PartitionSource::Manifest { pages, .. } = self.source {
            if pages == 0 || pages > MAX_IMAGE_PAGES {
                return Err(NvsbootError::config(format!(
                    "partition '{}' must have 1..={MAX_IMAGE_PAGES} pages, got {pages}",
                    self.label
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PAGE_SIZE;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_sources() {
        let config: ReaderConfig = toml::from_str(
            r#"
            [[partitions]]
            label = "nvs"
            source = { type = "file", path = "nvs.bin" }

            [[partitions]]
            label = "factory_nvs"
            source = { type = "manifest", path = "factory.toml" }
            "#,
        )
        .unwrap();

        assert_eq!(
            config.partitions[0].source,
            PartitionSource::File { path: "nvs.bin".into() }
        );
        assert_eq!(
            config.partitions[1].source,
            PartitionSource::Manifest {
                path: "factory.toml".into(),
                pages: 3
            }
        );
        assert!(config.is_valid());
    }

    #[test]
    fn test_rejects_duplicate_labels() {
        let source = PartitionSource::File { path: "nvs.bin".into() };
        let config = ReaderConfig {
            partitions: vec![
                PartitionConfig { label: "nvs".into(), source: source.clone() },
                PartitionConfig { label: "nvs".into(), source },
            ],
        };
        assert!(!config.is_valid());
    }

    #[test]
    fn test_rejects_bad_partition() {
        let empty_label = PartitionConfig {
            label: String::new(),
            source: PartitionSource::File { path: "nvs.bin".into() },
        };
        assert!(!empty_label.is_valid());

        let no_pages = PartitionConfig {
            label: "nvs".into(),
            source: PartitionSource::Manifest { path: "m.toml".into(), pages: 0 },
        };
        assert!(!no_pages.is_valid());

        let too_many_pages = PartitionConfig {
            label: "nvs".into(),
            source: PartitionSource::Manifest {
                path: "m.toml".into(),
                pages: usize::MAX / PAGE_SIZE + 1,
            },
        };
        assert!(!too_many_pages.is_valid());

        let largest = PartitionConfig {
            label: "nvs".into(),
            source: PartitionSource::Manifest {
                path: "m.toml".into(),
                pages: MAX_IMAGE_PAGES,
            },
        };
        assert!(largest.is_valid());
    }
}
