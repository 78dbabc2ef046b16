//! Layered configuration loading.
//!
//! Sources are applied in the order they were added; later sources override
//! earlier ones key by key. The usual stack is a TOML file followed by an
//! environment overlay such as `NVSBOOT__LOG__LEVEL=debug`.

use crate::{NvsbootError, NvsbootResult};
use config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Separator between nested keys in environment variable names
pub const ENV_SEPARATOR: &str = "__";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> NvsbootResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(NvsbootError::config(format!(
                "cannot detect config format of {}",
                path.display()
            ))),
        }
    }

    fn file_format(self) -> FileFormat {
        match self {
            Self::Toml => FileFormat::Toml,
            Self::Json => FileFormat::Json,
        }
    }
}

#[derive(Debug, Clone)]
enum Layer {
    File {
        path: PathBuf,
        format: ConfigFormat,
        required: bool,
    },
    Inline {
        content: String,
        format: ConfigFormat,
    },
    Env {
        prefix: String,
    },
}

/// Builder that stacks configuration sources and deserializes the result
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    layers: Vec<Layer>,
}

impl ConfigLoader {
    /// Create an empty loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration file that must exist
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> NvsbootResult<Self> {
        self.push_file(path.as_ref(), true)
    }

    /// Add a configuration file that is skipped when missing
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> NvsbootResult<Self> {
        self.push_file(path.as_ref(), false)
    }

    /// Add configuration text held in memory
    #[must_use]
    pub fn with_str(mut self, content: impl Into<String>, format: ConfigFormat) -> Self {
        self.layers.push(Layer::Inline {
            content: content.into(),
            format,
        });
        self
    }

    /// Overlay environment variables named `<PREFIX>__<SECTION>__<KEY>`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.layers.push(Layer::Env {
            prefix: prefix.into(),
        });
        self
    }

    /// Merge all sources and deserialize them into `T`
    pub fn load<T: DeserializeOwned>(&self) -> NvsbootResult<T> {
        let mut builder = Config::builder();

        for layer in &self.layers {
            builder = match layer {
                Layer::File {
                    path,
                    format,
                    required,
                } => builder.add_source(
                    File::from(path.as_path())
                        .format(format.file_format())
                        .required(*required),
                ),
                Layer::Inline { content, format } => {
                    builder.add_source(File::from_str(content, format.file_format()))
                }
                Layer::Env { prefix } => builder.add_source(
                    Environment::with_prefix(prefix)
                        .prefix_separator(ENV_SEPARATOR)
                        .separator(ENV_SEPARATOR)
                        .try_parsing(true),
                ),
            };
        }

        let merged = builder.build()?;
        merged
            .try_deserialize()
            .map_err(|e| NvsbootError::config(format!("invalid configuration: {e}")))
    }

    fn push_file(mut self, path: &Path, required: bool) -> NvsbootResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        self.layers.push(Layer::File {
            path: path.to_path_buf(),
            format,
            required,
        });
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        label: String,
        #[serde(default)]
        pages: u32,
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/b.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("b.json")).unwrap(),
            ConfigFormat::Json
        );
        assert!(ConfigFormat::from_path(Path::new("b.ini")).is_err());
    }

    #[test]
    fn test_inline_layers_override_in_order() {
        let loaded: Sample = ConfigLoader::new()
            .with_str("label = \"nvs\"\npages = 3", ConfigFormat::Toml)
            .with_str("{\"pages\": 5}", ConfigFormat::Json)
            .load()
            .unwrap();

        assert_eq!(
            loaded,
            Sample {
                label: "nvs".to_string(),
                pages: 5
            }
        );
    }

    #[test]
    fn test_file_layer() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "label = \"factory_nvs\"").unwrap();

        let loaded: Sample = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(loaded.label, "factory_nvs");
        assert_eq!(loaded.pages, 0);
    }

    #[test]
    fn test_missing_optional_file_is_skipped() {
        let loaded: Sample = ConfigLoader::new()
            .with_str("label = \"nvs\"", ConfigFormat::Toml)
            .with_optional_file("/nonexistent/nvsboot.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(loaded.label, "nvs");
    }

    #[test]
    fn test_env_overlay() {
        std::env::set_var("NVSBOOT_CORE_TEST__PAGES", "7");

        let loaded: Sample = ConfigLoader::new()
            .with_str("label = \"nvs\"", ConfigFormat::Toml)
            .with_env_prefix("NVSBOOT_CORE_TEST")
            .load()
            .unwrap();
        assert_eq!(loaded.pages, 7);

        std::env::remove_var("NVSBOOT_CORE_TEST__PAGES");
    }

    #[test]
    fn test_missing_field_is_config_error() {
        let result: NvsbootResult<Sample> = ConfigLoader::new()
            .with_str("pages = 1", ConfigFormat::Toml)
            .load();
        assert!(matches!(result, Err(NvsbootError::Configuration(_))));
    }
}
