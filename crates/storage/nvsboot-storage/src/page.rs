//! Page and entry layout of a partition
//!
//! A partition is a sequence of 4096-byte pages. Each page holds a 32-byte
//! header, a 32-byte entry state bitmap and 126 entry slots of 32 bytes.
//! Items occupy one slot, or `span` consecutive slots for strings and blobs
//! whose payload follows the item header.
//!
//! Reads go straight to the flash source one slot at a time; nothing here
//! buffers a whole page.

use crate::crc::{crc32, crc32_parts, digest};
use crate::error::{FlashError, Result, StorageError};
use crate::traits::FlashRead;
use crate::types::{ItemType, MAX_NAME_LEN};
use std::fmt;

/// Size of one page in bytes
pub const PAGE_SIZE: usize = 4096;
/// Size of one entry slot in bytes
pub const ENTRY_SIZE: usize = 32;
/// Entry slots per page
pub const ENTRY_COUNT: usize = 126;
/// Size of the page header in bytes
pub const HEADER_SIZE: usize = 32;
/// Offset of the entry state bitmap within a page
pub const BITMAP_OFFSET: usize = 32;
/// Size of the entry state bitmap in bytes
pub const BITMAP_SIZE: usize = 32;
/// Offset of the first entry slot within a page
pub const ENTRIES_OFFSET: usize = 64;
/// Size of the key field, including its NUL terminator
pub const KEY_FIELD_SIZE: usize = 16;
/// Namespace index used by namespace definition entries
pub const NAMESPACE_DEFINITIONS: u8 = 0;
/// Namespace index that never names a real namespace
pub const NAMESPACE_ANY: u8 = 0xFF;
/// Chunk index of items that are not blob chunks
pub const CHUNK_ANY: u8 = 0xFF;
/// Page format version 1
pub const VERSION_1: u8 = 0xFF;
/// Page format version 2
pub const VERSION_2: u8 = 0xFE;
/// Largest variable-length payload that fits in one page
pub const MAX_PAYLOAD_SIZE: usize = (ENTRY_COUNT - 1) * ENTRY_SIZE;

/// Number of whole pages in a partition
///
/// A partition that is empty or not page aligned cannot be read.
pub fn page_count(flash: &dyn FlashRead) -> Result<usize> {
    let size = flash.size();
    if size == 0 || size % PAGE_SIZE != 0 {
        return Err(StorageError::Layout(format!(
            "partition size {size:#x} is not a non-zero multiple of {PAGE_SIZE:#x}"
        )));
    }
    Ok(size / PAGE_SIZE)
}

/// Life-cycle state of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Erased, never written
    Uninitialized,
    /// Currently receiving writes
    Active,
    /// No free slots left
    Full,
    /// Contents being moved to another page
    Freeing,
    /// Marked unusable
    Corrupt,
    /// Any other bit pattern
    Invalid(u32),
}

impl PageState {
    /// Decode the raw state word
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0xFFFF_FFFF => PageState::Uninitialized,
            0xFFFF_FFFE => PageState::Active,
            0xFFFF_FFFC => PageState::Full,
            0xFFFF_FFF8 => PageState::Freeing,
            0xFFFF_FFF0 => PageState::Corrupt,
            other => PageState::Invalid(other),
        }
    }

    /// Encode as the raw state word
    pub fn raw(self) -> u32 {
        match self {
            PageState::Uninitialized => 0xFFFF_FFFF,
            PageState::Active => 0xFFFF_FFFE,
            PageState::Full => 0xFFFF_FFFC,
            PageState::Freeing => 0xFFFF_FFF8,
            PageState::Corrupt => 0xFFFF_FFF0,
            PageState::Invalid(raw) => raw,
        }
    }
}

/// Decoded page header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Page state
    pub state: PageState,
    /// Sequence number
    pub seq: u32,
    /// Format version byte
    pub version: u8,
    /// Stored header checksum
    pub crc32: u32,
    computed_crc: u32,
}

impl PageHeader {
    /// Decode a raw header
    pub fn parse(raw: &[u8; HEADER_SIZE]) -> Self {
        Self {
            state: PageState::from_raw(le_u32(&raw[0..4])),
            seq: le_u32(&raw[4..8]),
            version: raw[8],
            crc32: le_u32(&raw[28..32]),
            computed_crc: crc32(&raw[4..28]),
        }
    }

    /// Encode a header with a fresh checksum
    pub fn encode(state: PageState, seq: u32, version: u8) -> [u8; HEADER_SIZE] {
        let mut raw = [0xFFu8; HEADER_SIZE];
        raw[0..4].copy_from_slice(&state.raw().to_le_bytes());
        raw[4..8].copy_from_slice(&seq.to_le_bytes());
        raw[8] = version;
        let crc = crc32(&raw[4..28]);
        raw[28..32].copy_from_slice(&crc.to_le_bytes());
        raw
    }

    /// Stored checksum matches the header contents
    pub fn is_crc_valid(&self) -> bool {
        self.crc32 == self.computed_crc
    }

    /// Page can hold readable items
    pub fn is_searchable(&self) -> bool {
        matches!(self.state, PageState::Active | PageState::Full)
            && matches!(self.version, VERSION_1 | VERSION_2)
            && self.is_crc_valid()
    }
}

/// State of one entry slot, from the page bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Never written
    Empty,
    /// Holds live data
    Written,
    /// Superseded or deleted
    Erased,
    /// Bit pattern that is never produced
    Illegal,
}

impl EntryState {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b11 => EntryState::Empty,
            0b10 => EntryState::Written,
            0b00 => EntryState::Erased,
            _ => EntryState::Illegal,
        }
    }

    fn bits(self) -> u8 {
        match self {
            EntryState::Empty => 0b11,
            EntryState::Written => 0b10,
            EntryState::Erased => 0b00,
            EntryState::Illegal => 0b01,
        }
    }
}

/// State of `slot` in a raw bitmap
pub fn bitmap_state(bitmap: &[u8; BITMAP_SIZE], slot: usize) -> EntryState {
    let shift = (slot % 4) * 2;
    EntryState::from_bits(bitmap[slot / 4] >> shift)
}

/// Set the state of `slot` in a raw bitmap
pub fn set_bitmap_state(bitmap: &mut [u8; BITMAP_SIZE], slot: usize, state: EntryState) {
    let shift = (slot % 4) * 2;
    let byte = &mut bitmap[slot / 4];
    *byte = (*byte & !(0b11 << shift)) | (state.bits() << shift);
}

/// One 32-byte entry slot interpreted as an item header
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Namespace index
    pub ns: u8,
    /// Raw type byte
    pub type_code: u8,
    /// Number of slots the item occupies
    pub span: u8,
    /// Blob chunk index
    pub chunk_index: u8,
    /// Stored header checksum
    pub crc32: u32,
    /// NUL-terminated key
    pub key: [u8; KEY_FIELD_SIZE],
    /// Inline value or variable-length descriptor
    pub data: [u8; 8],
}

impl Entry {
    /// Decode a raw slot
    pub fn parse(raw: &[u8; ENTRY_SIZE]) -> Self {
        let mut key = [0u8; KEY_FIELD_SIZE];
        key.copy_from_slice(&raw[8..24]);
        let mut data = [0u8; 8];
        data.copy_from_slice(&raw[24..32]);

        Self {
            ns: raw[0],
            type_code: raw[1],
            span: raw[2],
            chunk_index: raw[3],
            crc32: le_u32(&raw[4..8]),
            key,
            data,
        }
    }

    /// Build an entry with a valid checksum
    ///
    /// Fails if the key does not fit the key field.
    pub fn new(ns: u8, item_type: ItemType, span: u8, key: &str, data: [u8; 8]) -> Result<Self> {
        if key.len() > MAX_NAME_LEN {
            return Err(StorageError::Image(format!(
                "key '{key}' is longer than {MAX_NAME_LEN} bytes"
            )));
        }
        let mut key_field = [0u8; KEY_FIELD_SIZE];
        key_field[..key.len()].copy_from_slice(key.as_bytes());

        let mut entry = Self {
            ns,
            type_code: item_type.code(),
            span,
            chunk_index: CHUNK_ANY,
            crc32: 0,
            key: key_field,
            data,
        };
        entry.crc32 = entry.computed_crc();
        Ok(entry)
    }

    /// Encode into a raw slot
    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut raw = [0u8; ENTRY_SIZE];
        raw[0] = self.ns;
        raw[1] = self.type_code;
        raw[2] = self.span;
        raw[3] = self.chunk_index;
        raw[4..8].copy_from_slice(&self.crc32.to_le_bytes());
        raw[8..24].copy_from_slice(&self.key);
        raw[24..32].copy_from_slice(&self.data);
        raw
    }

    /// Checksum over everything except the checksum field
    pub fn computed_crc(&self) -> u32 {
        let head = [self.ns, self.type_code, self.span, self.chunk_index];
        crc32_parts(&[&head, &self.key, &self.data])
    }

    /// Stored checksum matches the entry contents
    pub fn is_crc_valid(&self) -> bool {
        self.crc32 == self.computed_crc()
    }

    /// Decoded type, if the type byte is known
    pub fn item_type(&self) -> Option<ItemType> {
        ItemType::from_code(self.type_code)
    }

    /// Key up to its terminator; `None` if unterminated or not UTF-8
    pub fn key_str(&self) -> Option<&str> {
        let end = self.key.iter().position(|b| *b == 0)?;
        std::str::from_utf8(&self.key[..end]).ok()
    }

    /// Payload size of a string or blob item
    pub fn var_size(&self) -> usize {
        usize::from(u16::from_le_bytes([self.data[0], self.data[1]]))
    }

    /// Payload checksum of a string or blob item
    pub fn var_crc(&self) -> u32 {
        le_u32(&self.data[4..8])
    }

    /// Descriptor stored in `data` for a variable-length payload
    ///
    /// Fails if the payload does not fit in one page.
    pub fn var_data(payload: &[u8]) -> Result<[u8; 8]> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(StorageError::Image(format!(
                "payload of {} bytes exceeds {MAX_PAYLOAD_SIZE}",
                payload.len()
            )));
        }
        let size = u16::try_from(payload.len())
            .map_err(|_| StorageError::Image(format!("payload of {} bytes", payload.len())))?;

        let mut data = [0xFFu8; 8];
        data[0..2].copy_from_slice(&size.to_le_bytes());
        data[4..8].copy_from_slice(&crc32(payload).to_le_bytes());
        Ok(data)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("ns", &self.ns)
            .field("type", &format_args!("{:#04x}", self.type_code))
            .field("span", &self.span)
            .field("key", &self.key_str().unwrap_or("<invalid>"))
            .field("data", &hex::encode(self.data))
            .finish()
    }
}

/// Read access to one page of a partition
pub struct PageReader<'f> {
    flash: &'f dyn FlashRead,
    index: usize,
    header: PageHeader,
    bitmap: [u8; BITMAP_SIZE],
}

impl<'f> PageReader<'f> {
    /// Read the header and bitmap of page `index`
    pub fn open(flash: &'f dyn FlashRead, index: usize) -> std::result::Result<Self, FlashError> {
        let base = index * PAGE_SIZE;
        let mut header = [0u8; HEADER_SIZE];
        flash.read(base, &mut header)?;
        let mut bitmap = [0u8; BITMAP_SIZE];
        flash.read(base + BITMAP_OFFSET, &mut bitmap)?;

        Ok(Self {
            flash,
            index,
            header: PageHeader::parse(&header),
            bitmap,
        })
    }

    /// Page index within the partition
    pub fn index(&self) -> usize {
        self.index
    }

    /// Decoded header
    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    /// State of one slot
    pub fn entry_state(&self, slot: usize) -> EntryState {
        bitmap_state(&self.bitmap, slot)
    }

    /// Read one slot
    pub fn read_entry(&self, slot: usize) -> std::result::Result<Entry, FlashError> {
        let mut raw = [0u8; ENTRY_SIZE];
        self.flash.read(self.slot_offset(slot), &mut raw)?;
        Ok(Entry::parse(&raw))
    }

    /// Live items in slot order
    pub fn items(&self) -> Items<'_, 'f> {
        Items { page: self, slot: 0 }
    }

    /// Checksum of the `size`-byte payload following the item at `slot`
    pub fn payload_crc(&self, slot: usize, size: usize) -> std::result::Result<u32, FlashError> {
        let mut digest = digest();
        let mut chunk = [0u8; ENTRY_SIZE];
        let mut offset = self.slot_offset(slot + 1);
        let mut remaining = size;
        while remaining > 0 {
            let take = remaining.min(ENTRY_SIZE);
            self.flash.read(offset, &mut chunk[..take])?;
            digest.update(&chunk[..take]);
            offset += take;
            remaining -= take;
        }
        Ok(digest.finalize())
    }

    /// Copy the payload following the item at `slot` into `out`
    pub fn read_payload(&self, slot: usize, out: &mut [u8]) -> std::result::Result<(), FlashError> {
        self.flash.read(self.slot_offset(slot + 1), out)
    }

    fn slot_offset(&self, slot: usize) -> usize {
        self.index * PAGE_SIZE + ENTRIES_OFFSET + slot * ENTRY_SIZE
    }
}

/// Iterator over the written, checksum-valid items of a page
pub struct Items<'p, 'f> {
    page: &'p PageReader<'f>,
    slot: usize,
}

impl Iterator for Items<'_, '_> {
    type Item = std::result::Result<(usize, Entry), FlashError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.slot < ENTRY_COUNT {
            let slot = self.slot;
            if self.page.entry_state(slot) != EntryState::Written {
                self.slot += 1;
                continue;
            }

            let entry = match self.page.read_entry(slot) {
                Ok(entry) => entry,
                Err(e) => {
                    self.slot = ENTRY_COUNT;
                    return Some(Err(e));
                }
            };

            let span = usize::from(entry.span);
            if !entry.is_crc_valid() || span == 0 || slot + span > ENTRY_COUNT {
                tracing::trace!(page = self.page.index, slot, ?entry, "skipping damaged entry");
                self.slot += 1;
                continue;
            }

            self.slot += span;
            return Some(Ok((slot, entry)));
        }
        None
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
