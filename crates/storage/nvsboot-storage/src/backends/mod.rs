//! Flash source implementations

pub mod file;
pub mod memory;

// Re-export backend implementations
pub use file::FileFlash;
pub use memory::MemoryFlash;
