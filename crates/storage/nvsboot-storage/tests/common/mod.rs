//! Common test utilities and fixtures for nvsboot-storage

#![allow(dead_code)]

use bytes::Bytes;
use nvsboot_storage::page::{ENTRIES_OFFSET, ENTRY_SIZE, PAGE_SIZE};
use nvsboot_storage::{
    BatchReader, FlashError, FlashRead, ImageBuilder, MemoryFlash, PartitionRegistry,
};

/// Label the fixture partition is registered under
pub const LABEL: &str = "nvs";

/// Pages in the fixture partition
pub const PAGES: usize = 3;

/// Text stored under `sunny_day/string_10_chars`
pub const TEN_CHARS: &str = "Text_67890";

/// Builder holding the boot settings used across the tests
///
/// Layout of page 0: namespace definitions in slots 0..=2, then values in
/// insertion order starting at slot 3.
pub fn sample_builder() -> ImageBuilder {
    let mut builder = ImageBuilder::new(PAGES);
    let values: Vec<(&str, &str, nvsboot_storage::StoredValue)> = vec![
        ("sunny_day", "u8", 255u8.into()),
        ("sunny_day", "i32", i32::MIN.into()),
        ("sunny_day", "u16", 65_535u16.into()),
        ("sunny_day", "u32", u32::MAX.into()),
        ("sunny_day", "i16", (-32_768i16).into()),
        ("sunny_day", "u64", u64::MAX.into()),
        ("sunny_day", "i64", i64::MIN.into()),
        ("sunny_day", "string_10_chars", TEN_CHARS.into()),
        ("cloudy_day", "i8", (-128i8).into()),
        ("cloudy_day", "blobeee", vec![0xDEu8, 0xAD, 0xBE, 0xEF].into()),
        ("rainy_day", "u8", 7u8.into()),
    ];
    for (namespace, key, value) in values {
        builder
            .add(namespace, key, value)
            .expect("fixture values are valid");
    }
    builder
}

/// Built fixture image
pub fn sample_image() -> Bytes {
    sample_builder().build().expect("fixture fits its pages")
}

/// Reader with the fixture registered as [`LABEL`]
pub fn sample_reader() -> BatchReader {
    reader_for(sample_image())
}

/// Reader with `image` registered as [`LABEL`]
pub fn reader_for(image: impl Into<Bytes>) -> BatchReader {
    let registry = PartitionRegistry::new();
    registry
        .register(LABEL, MemoryFlash::new(image))
        .expect("label is valid");
    BatchReader::new(registry)
}

/// Byte offset of `slot` on `page`
pub fn slot_offset(page: usize, slot: usize) -> usize {
    page * PAGE_SIZE + ENTRIES_OFFSET + slot * ENTRY_SIZE
}

/// Flash source whose reads always fail
pub struct FaultyFlash {
    pub size: usize,
}

impl FlashRead for FaultyFlash {
    fn size(&self) -> usize {
        self.size
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> std::result::Result<(), FlashError> {
        Err(FlashError::Io(format!(
            "injected failure reading {} bytes at {offset:#x}",
            buf.len()
        )))
    }
}

/// Route `tracing` output to the test harness
pub fn init_logging() {
    nvsboot_core::observability::init_test_logging();
}
