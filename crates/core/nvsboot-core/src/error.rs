//! Error handling types shared by the nvsboot crates.
//!
//! Crate-specific errors (for example the storage crate's `StorageError`)
//! convert into [`NvsbootError`] so binaries can report them uniformly.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The workspace-wide error type.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NvsbootError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Storage medium or layout errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NvsbootError {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Create a new invalid input error
    pub fn invalid_input<T: fmt::Display>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Create a new not found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Create a new serialization error
    pub fn serialization<T: fmt::Display>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a new internal error
    pub fn internal<T: fmt::Display>(msg: T) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Errors caused by what the caller passed in
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::NotFound(_))
    }

    /// Errors raised by the environment: the medium, the config, the host
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Configuration(_) | Self::Internal(_)
        )
    }
}

/// Result type alias for nvsboot operations
pub type NvsbootResult<T> = Result<T, NvsbootError>;

impl From<std::io::Error> for NvsbootError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for NvsbootError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for NvsbootError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(feature = "config")]
impl From<config::ConfigError> for NvsbootError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
