//! Request and result types for batch reads

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest namespace or key name in bytes (the on-flash field holds a NUL too)
pub const MAX_NAME_LEN: usize = 15;

/// Type tag of a stored item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Unsigned 8-bit integer
    U8,
    /// Signed 8-bit integer
    I8,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 32-bit integer
    I32,
    /// Unsigned 64-bit integer
    U64,
    /// Signed 64-bit integer
    I64,
    /// NUL-terminated string
    Str,
    /// Legacy single-page blob
    Blob,
    /// Chunk of a multi-page blob
    BlobData,
    /// Index entry of a multi-page blob
    BlobIndex,
}

impl ItemType {
    /// Encode as the on-flash type byte
    pub fn code(self) -> u8 {
        match self {
            ItemType::U8 => 0x01,
            ItemType::I8 => 0x11,
            ItemType::U16 => 0x02,
            ItemType::I16 => 0x12,
            ItemType::U32 => 0x04,
            ItemType::I32 => 0x14,
            ItemType::U64 => 0x08,
            ItemType::I64 => 0x18,
            ItemType::Str => 0x21,
            ItemType::Blob => 0x41,
            ItemType::BlobData => 0x42,
            ItemType::BlobIndex => 0x48,
        }
    }

    /// Decode an on-flash type byte
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x01 => ItemType::U8,
            0x11 => ItemType::I8,
            0x02 => ItemType::U16,
            0x12 => ItemType::I16,
            0x04 => ItemType::U32,
            0x14 => ItemType::I32,
            0x08 => ItemType::U64,
            0x18 => ItemType::I64,
            0x21 => ItemType::Str,
            0x41 => ItemType::Blob,
            0x42 => ItemType::BlobData,
            0x48 => ItemType::BlobIndex,
            _ => return None,
        })
    }

    /// Width in bytes of an integer type
    pub fn primitive_width(self) -> Option<usize> {
        match self {
            ItemType::U8 | ItemType::I8 => Some(1),
            ItemType::U16 | ItemType::I16 => Some(2),
            ItemType::U32 | ItemType::I32 => Some(4),
            ItemType::U64 | ItemType::I64 => Some(8),
            _ => None,
        }
    }

    /// Types a batch read can return
    pub fn is_readable(self) -> bool {
        self.primitive_width().is_some() || self == ItemType::Str
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemType::U8 => "u8",
            ItemType::I8 => "i8",
            ItemType::U16 => "u16",
            ItemType::I16 => "i16",
            ItemType::U32 => "u32",
            ItemType::I32 => "i32",
            ItemType::U64 => "u64",
            ItemType::I64 => "i64",
            ItemType::Str => "str",
            ItemType::Blob => "blob",
            ItemType::BlobData => "blob_data",
            ItemType::BlobIndex => "blob_index",
        };
        f.write_str(name)
    }
}

/// Outcome of one record in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Value found and written
    Ok,
    /// Namespace or key absent, or a duplicate request
    NotFound,
    /// Namespace name longer than [`MAX_NAME_LEN`]
    NameTooLong,
    /// Key name longer than [`MAX_NAME_LEN`]
    KeyTooLong,
    /// Stored under a different type
    TypeMismatch,
    /// String buffer missing, empty or too small
    InvalidSize,
    /// Requested type cannot be read in a batch
    InvalidArgument,
}

impl RecordStatus {
    /// Whether this status can only come from input validation
    pub fn is_validation_error(self) -> bool {
        matches!(
            self,
            RecordStatus::NameTooLong | RecordStatus::KeyTooLong | RecordStatus::InvalidArgument
        )
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordStatus::Ok => "OK",
            RecordStatus::NotFound => "NOT_FOUND",
            RecordStatus::NameTooLong => "NAME_TOO_LONG",
            RecordStatus::KeyTooLong => "KEY_TOO_LONG",
            RecordStatus::TypeMismatch => "TYPE_MISMATCH",
            RecordStatus::InvalidSize => "INVALID_SIZE",
            RecordStatus::InvalidArgument => "INVALID_ARGUMENT",
        };
        f.write_str(name)
    }
}

/// Requested type together with its result slot
#[derive(Debug, PartialEq, Eq)]
pub enum ReadValue<'a> {
    /// Unsigned 8-bit result
    U8(u8),
    /// Signed 8-bit result
    I8(i8),
    /// Unsigned 16-bit result
    U16(u16),
    /// Signed 16-bit result
    I16(i16),
    /// Unsigned 32-bit result
    U32(u32),
    /// Signed 32-bit result
    I32(i32),
    /// Unsigned 64-bit result
    U64(u64),
    /// Signed 64-bit result
    I64(i64),
    /// String result written into a caller buffer
    Str {
        /// Output buffer; `None` stands for a missing buffer
        buf: Option<&'a mut [u8]>,
        /// Bytes written on success, including the NUL terminator
        len: usize,
    },
    /// Blobs are not readable in a batch; kept so such requests can be expressed
    Blob,
}

impl<'a> ReadValue<'a> {
    /// Empty result slot for a primitive type
    pub fn zeroed(item_type: ItemType) -> Option<Self> {
        Some(match item_type {
            ItemType::U8 => ReadValue::U8(0),
            ItemType::I8 => ReadValue::I8(0),
            ItemType::U16 => ReadValue::U16(0),
            ItemType::I16 => ReadValue::I16(0),
            ItemType::U32 => ReadValue::U32(0),
            ItemType::I32 => ReadValue::I32(0),
            ItemType::U64 => ReadValue::U64(0),
            ItemType::I64 => ReadValue::I64(0),
            ItemType::Blob => ReadValue::Blob,
            _ => return None,
        })
    }

    /// Declared type of this slot
    pub fn item_type(&self) -> ItemType {
        match self {
            ReadValue::U8(_) => ItemType::U8,
            ReadValue::I8(_) => ItemType::I8,
            ReadValue::U16(_) => ItemType::U16,
            ReadValue::I16(_) => ItemType::I16,
            ReadValue::U32(_) => ItemType::U32,
            ReadValue::I32(_) => ItemType::I32,
            ReadValue::U64(_) => ItemType::U64,
            ReadValue::I64(_) => ItemType::I64,
            ReadValue::Str { .. } => ItemType::Str,
            ReadValue::Blob => ItemType::Blob,
        }
    }

    /// Store a primitive decoded from the 8-byte data field
    pub(crate) fn set_primitive(&mut self, data: &[u8; 8]) {
        match self {
            ReadValue::U8(v) => *v = data[0],
            ReadValue::I8(v) => *v = i8::from_le_bytes([data[0]]),
            ReadValue::U16(v) => *v = u16::from_le_bytes([data[0], data[1]]),
            ReadValue::I16(v) => *v = i16::from_le_bytes([data[0], data[1]]),
            ReadValue::U32(v) => *v = u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            ReadValue::I32(v) => *v = i32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            ReadValue::U64(v) => *v = u64::from_le_bytes(*data),
            ReadValue::I64(v) => *v = i64::from_le_bytes(*data),
            ReadValue::Str { .. } | ReadValue::Blob => {}
        }
    }

    /// Integer value widened to i128, if this is an integer slot
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            ReadValue::U8(v) => Some(v.into()),
            ReadValue::I8(v) => Some(v.into()),
            ReadValue::U16(v) => Some(v.into()),
            ReadValue::I16(v) => Some(v.into()),
            ReadValue::U32(v) => Some(v.into()),
            ReadValue::I32(v) => Some(v.into()),
            ReadValue::U64(v) => Some(v.into()),
            ReadValue::I64(v) => Some(v.into()),
            ReadValue::Str { .. } | ReadValue::Blob => None,
        }
    }
}

/// One lookup in a batch: what to read and where its result goes
#[derive(Debug, PartialEq, Eq)]
pub struct ReadRequest<'a> {
    /// Namespace name
    pub namespace: &'a str,
    /// Key name
    pub key: &'a str,
    /// Declared type and result slot
    pub value: ReadValue<'a>,
    /// Per-record outcome, set by the reader
    pub status: RecordStatus,
}

impl<'a> ReadRequest<'a> {
    /// Request for an integer or blob item
    ///
    /// `ItemType::Str` gets a request without a buffer; use
    /// [`ReadRequest::string`] to supply one.
    pub fn new(namespace: &'a str, key: &'a str, item_type: ItemType) -> Self {
        let value = ReadValue::zeroed(item_type).unwrap_or(match item_type {
            ItemType::Str => ReadValue::Str { buf: None, len: 0 },
            _ => ReadValue::Blob,
        });
        Self::with_value(namespace, key, value)
    }

    /// Request for a string item written into `buf`
    pub fn string(namespace: &'a str, key: &'a str, buf: Option<&'a mut [u8]>) -> Self {
        Self::with_value(namespace, key, ReadValue::Str { buf, len: 0 })
    }

    /// Request with an explicit result slot
    pub fn with_value(namespace: &'a str, key: &'a str, value: ReadValue<'a>) -> Self {
        Self {
            namespace,
            key,
            value,
            status: RecordStatus::NotFound,
        }
    }

    /// Declared type
    pub fn item_type(&self) -> ItemType {
        self.value.item_type()
    }

    /// Whether the lookup succeeded
    pub fn is_ok(&self) -> bool {
        self.status == RecordStatus::Ok
    }

    /// Integer result, if the lookup succeeded
    pub fn integer(&self) -> Option<i128> {
        if self.is_ok() {
            self.value.as_integer()
        } else {
            None
        }
    }

    /// String result without its terminator, if the lookup succeeded
    pub fn text(&self) -> Option<&str> {
        if !self.is_ok() {
            return None;
        }
        match &self.value {
            ReadValue::Str { buf: Some(buf), len } => {
                let written = &buf[..(*len).min(buf.len())];
                let text = written.strip_suffix(&[0u8]).unwrap_or(written);
                std::str::from_utf8(text).ok()
            }
            _ => None,
        }
    }
}
