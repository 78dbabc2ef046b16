//! Batch read behaviour against a realistic partition image

mod common;

use common::{
    sample_builder, sample_image, sample_reader, slot_offset, FaultyFlash, LABEL, TEN_CHARS,
};
use nvsboot_storage::page::{PageHeader, PageState, HEADER_SIZE, PAGE_SIZE, VERSION_2};
use nvsboot_storage::{
    summarize, BatchReader, ItemType, PartitionRegistry, ReadRequest, ReadValue, RecordStatus,
    StorageError,
};
use pretty_assertions::assert_eq;

fn statuses(requests: &[ReadRequest<'_>]) -> Vec<RecordStatus> {
    requests.iter().map(|r| r.status).collect()
}

#[test]
fn test_validation_errors_list() {
    common::init_logging();
    let reader = sample_reader();
    let mut str_buf = [0u8; 11];

    let mut requests = [
        ReadRequest::new("sunny_day", "u8", ItemType::U8),
        ReadRequest::new("too_long_sunny_day", "u8", ItemType::I8),
        ReadRequest::new("sunny_day", "too_long_dark_key", ItemType::I32),
        ReadRequest::new("clowny_day", "blobeee", ItemType::Blob),
        ReadRequest::string("sunny_day", "string_10_chars", Some(&mut str_buf[..0])),
        ReadRequest::string("sunny_day", "string_10_chars", None),
    ];

    let err = reader.read(LABEL, &mut requests).unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(
        statuses(&requests),
        vec![
            RecordStatus::NotFound,
            RecordStatus::NameTooLong,
            RecordStatus::KeyTooLong,
            RecordStatus::InvalidArgument,
            RecordStatus::InvalidSize,
            RecordStatus::InvalidSize,
        ]
    );
    // Nothing was looked up
    assert_eq!(requests[0].value, ReadValue::U8(0));
}

#[test]
fn test_runtime_errors_list() {
    common::init_logging();
    let reader = sample_reader();
    let mut str_buf = [0u8; 11];

    let mut requests = [
        ReadRequest::new("sunny_day", "u8", ItemType::I8),
        ReadRequest::new("sunny_day", "i32_", ItemType::I32),
        ReadRequest::new("clowny_day", "i8", ItemType::I8),
        ReadRequest::string("sunny_day", "string_10_chars", Some(&mut str_buf[..2])),
        ReadRequest::new("sunny_day", "u32", ItemType::U32),
        ReadRequest::new("sunny_day", "u32", ItemType::U32),
    ];

    reader.read(LABEL, &mut requests).unwrap();
    assert_eq!(
        statuses(&requests),
        vec![
            RecordStatus::TypeMismatch,
            RecordStatus::NotFound,
            RecordStatus::NotFound,
            RecordStatus::InvalidSize,
            RecordStatus::Ok,
            RecordStatus::NotFound,
        ]
    );
    assert_eq!(requests[4].value, ReadValue::U32(u32::MAX));
    assert_eq!(requests[5].value, ReadValue::U32(0));
    drop(requests);
    // A too-small buffer is never partially written
    assert_eq!(str_buf, [0u8; 11]);
}

#[test]
fn test_all_found_list() {
    common::init_logging();
    let reader = sample_reader();
    let mut str_buf = [0u8; 11];

    let mut requests = [
        ReadRequest::new("sunny_day", "u8", ItemType::U8),
        ReadRequest::new("sunny_day", "i32", ItemType::I32),
        ReadRequest::new("cloudy_day", "i8", ItemType::I8),
        ReadRequest::new("sunny_day", "u16", ItemType::U16),
        ReadRequest::string("sunny_day", "string_10_chars", Some(&mut str_buf[..])),
    ];

    reader.read(LABEL, &mut requests).unwrap();
    assert!(requests.iter().all(ReadRequest::is_ok));
    assert_eq!(requests[0].value, ReadValue::U8(255));
    assert_eq!(requests[1].value, ReadValue::I32(i32::MIN));
    assert_eq!(requests[2].value, ReadValue::I8(-128));
    assert_eq!(requests[3].value, ReadValue::U16(65_535));
    assert_eq!(requests[4].text(), Some(TEN_CHARS));
    assert!(matches!(requests[4].value, ReadValue::Str { len: 11, .. }));
}

#[test]
fn test_wide_integers() {
    let reader = sample_reader();
    let mut requests = [
        ReadRequest::new("sunny_day", "i16", ItemType::I16),
        ReadRequest::new("sunny_day", "u64", ItemType::U64),
        ReadRequest::new("sunny_day", "i64", ItemType::I64),
        ReadRequest::new("rainy_day", "u8", ItemType::U8),
    ];

    reader.read(LABEL, &mut requests).unwrap();
    assert_eq!(requests[0].integer(), Some(-32_768));
    assert_eq!(requests[1].integer(), Some(i128::from(u64::MAX)));
    assert_eq!(requests[2].integer(), Some(i128::from(i64::MIN)));
    assert_eq!(requests[3].integer(), Some(7));
}

#[test]
fn test_exact_size_buffer_receives_terminator() {
    let reader = sample_reader();
    let mut str_buf = [0xAAu8; 11];
    let mut requests = [ReadRequest::string(
        "sunny_day",
        "string_10_chars",
        Some(&mut str_buf[..]),
    )];

    reader.read(LABEL, &mut requests).unwrap();
    assert_eq!(requests[0].status, RecordStatus::Ok);
    assert!(matches!(requests[0].value, ReadValue::Str { len: 11, .. }));
    drop(requests);
    assert_eq!(&str_buf[..10], TEN_CHARS.as_bytes());
    assert_eq!(str_buf[10], 0);
}

#[test]
fn test_stored_blob_is_type_mismatch_for_string() {
    let reader = sample_reader();
    let mut str_buf = [0u8; 16];
    let mut requests = [ReadRequest::string("cloudy_day", "blobeee", Some(&mut str_buf[..]))];

    reader.read(LABEL, &mut requests).unwrap();
    assert_eq!(requests[0].status, RecordStatus::TypeMismatch);
}

#[test]
fn test_unknown_partition_label() {
    let reader = sample_reader();
    let mut requests = [ReadRequest::new("sunny_day", "u8", ItemType::U8)];

    let err = reader.read("factory_nvs", &mut requests).unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument(_)));
    assert_eq!(requests[0].status, RecordStatus::NotFound);
}

#[test]
fn test_failing_flash_is_underlying_failure() {
    let registry = PartitionRegistry::new();
    registry.register(LABEL, FaultyFlash { size: 3 * PAGE_SIZE }).unwrap();
    let reader = BatchReader::new(registry);

    let mut requests = [ReadRequest::new("sunny_day", "u8", ItemType::U8)];
    let err = reader.read(LABEL, &mut requests).unwrap_err();
    assert!(err.is_underlying_failure());
    assert!(!err.is_invalid_argument());
}

#[test]
fn test_erased_entry_is_invisible() {
    let mut builder = sample_builder();
    builder.erase_entry("sunny_day", "u16").unwrap();
    let reader = common::reader_for(builder.build().unwrap());

    let mut requests = [
        ReadRequest::new("sunny_day", "u16", ItemType::U16),
        ReadRequest::new("sunny_day", "u32", ItemType::U32),
    ];
    reader.read(LABEL, &mut requests).unwrap();
    assert_eq!(statuses(&requests), vec![RecordStatus::NotFound, RecordStatus::Ok]);
}

#[test]
fn test_superseded_value_resolves_to_live_copy() {
    let mut builder = sample_builder();
    builder.add("sunny_day", "u8", 1u8).unwrap();
    // Erases the copy just added, then the first one
    builder.erase_entry("sunny_day", "u8").unwrap();
    builder.erase_entry("sunny_day", "u8").unwrap();
    builder.add("sunny_day", "u8", 2u8).unwrap();
    let reader = common::reader_for(builder.build().unwrap());

    let mut requests = [ReadRequest::new("sunny_day", "u8", ItemType::U8)];
    reader.read(LABEL, &mut requests).unwrap();
    assert_eq!(requests[0].value, ReadValue::U8(2));
}

#[test]
fn test_corrupt_entry_is_invisible() {
    let mut image = sample_image().to_vec();
    // Flip a value byte of sunny_day/u32 (slot 6) without fixing its checksum
    image[slot_offset(0, 6) + 24] ^= 0x01;
    let reader = common::reader_for(image);

    let mut requests = [
        ReadRequest::new("sunny_day", "u32", ItemType::U32),
        ReadRequest::new("sunny_day", "u16", ItemType::U16),
    ];
    reader.read(LABEL, &mut requests).unwrap();
    assert_eq!(statuses(&requests), vec![RecordStatus::NotFound, RecordStatus::Ok]);
}

#[test]
fn test_corrupt_string_payload_is_not_found() {
    let mut image = sample_image().to_vec();
    // Payload of string_10_chars lives in slot 11
    image[slot_offset(0, 11)] ^= 0x20;
    let reader = common::reader_for(image);

    let mut str_buf = [0u8; 11];
    let mut requests = [ReadRequest::string(
        "sunny_day",
        "string_10_chars",
        Some(&mut str_buf[..]),
    )];
    reader.read(LABEL, &mut requests).unwrap();
    assert_eq!(requests[0].status, RecordStatus::NotFound);
}

#[test]
fn test_pages_outside_active_and_full_are_ignored() {
    for state in [PageState::Freeing, PageState::Corrupt, PageState::Uninitialized] {
        let mut image = sample_image().to_vec();
        image[..HEADER_SIZE].copy_from_slice(&PageHeader::encode(state, 0, VERSION_2));
        let reader = common::reader_for(image);

        let mut requests = [ReadRequest::new("sunny_day", "u8", ItemType::U8)];
        reader.read(LABEL, &mut requests).unwrap();
        assert_eq!(requests[0].status, RecordStatus::NotFound, "{state:?}");
    }
}

#[test]
fn test_damaged_page_header_is_ignored() {
    let mut image = sample_image().to_vec();
    image[4] ^= 0xFF;
    let reader = common::reader_for(image);

    let mut requests = [ReadRequest::new("sunny_day", "u8", ItemType::U8)];
    reader.read(LABEL, &mut requests).unwrap();
    assert_eq!(requests[0].status, RecordStatus::NotFound);
}

#[test]
fn test_values_across_pages() {
    let mut builder = nvsboot_storage::ImageBuilder::new(3);
    for i in 0..200u16 {
        builder.add("bulk", &format!("k{i}"), i).unwrap();
    }
    let reader = common::reader_for(builder.build().unwrap());

    let keys: Vec<String> = [0u16, 124, 125, 199].iter().map(|i| format!("k{i}")).collect();
    let mut requests: Vec<ReadRequest<'_>> = keys
        .iter()
        .map(|key| ReadRequest::new("bulk", key, ItemType::U16))
        .collect();
    reader.read(LABEL, &mut requests).unwrap();

    let values: Vec<Option<i128>> = requests.iter().map(ReadRequest::integer).collect();
    assert_eq!(values, vec![Some(0), Some(124), Some(125), Some(199)]);
}

#[test]
fn test_summary_reflects_results() {
    let reader = sample_reader();
    let mut requests = [
        ReadRequest::new("sunny_day", "u8", ItemType::U8),
        ReadRequest::new("sunny_day", "nope", ItemType::U8),
    ];
    reader.read(LABEL, &mut requests).unwrap();

    let rows = summarize(&requests);
    assert_eq!(rows[0].value.as_deref(), Some("255"));
    assert_eq!(rows[1].status, RecordStatus::NotFound);
    assert_eq!(rows[1].value, None);
}
