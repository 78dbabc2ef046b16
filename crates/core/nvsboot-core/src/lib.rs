//! # nvsboot Core
//!
//! Shared building blocks for the nvsboot crates.
//!
//! ## Features
//!
//! - **Error Handling**: a workspace-wide error type and result alias
//! - **Configuration**: layered file + environment configuration loading
//! - **Observability**: `tracing` subscriber setup driven by configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use nvsboot_core::{NvsbootError, NvsbootResult};
//!
//! fn check_label(label: &str) -> NvsbootResult<()> {
//!     if label.is_empty() {
//!         return Err(NvsbootError::invalid_input("empty partition label"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_label("nvs").is_ok());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "config")]
pub mod config;
pub mod error;
pub mod observability;
pub mod traits;

// Re-export commonly used items
pub use error::{NvsbootError, NvsbootResult};
pub use observability::{init_logging, LogConfig, LogFormat};
pub use traits::Validatable;

/// Version information for the nvsboot core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the nvsboot core library
pub const NAME: &str = env!("CARGO_PKG_NAME");
