//! Offline partition image assembly
//!
//! [`ImageBuilder`] lays out namespaces and typed values in the page format
//! read by [`crate::reader`]. [`ImageManifest`] is the TOML description the
//! demo and configuration use to produce such images.

use crate::error::{Result, StorageError};
use crate::page::{
    set_bitmap_state, Entry, EntryState, PageHeader, PageState, BITMAP_OFFSET, BITMAP_SIZE,
    ENTRIES_OFFSET, ENTRY_COUNT, ENTRY_SIZE, HEADER_SIZE, MAX_PAYLOAD_SIZE, NAMESPACE_ANY,
    NAMESPACE_DEFINITIONS, PAGE_SIZE, VERSION_2,
};
use crate::types::{ItemType, MAX_NAME_LEN};
use bytes::Bytes;
use nvsboot_core::{NvsbootError, NvsbootResult, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Most namespaces a partition can define
pub const MAX_NAMESPACES: usize = (NAMESPACE_ANY - 1) as usize;

/// Largest image the builder produces, 16 MiB
pub const MAX_IMAGE_PAGES: usize = 4096;

/// Value written into an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    /// Unsigned 8-bit integer
    U8(u8),
    /// Signed 8-bit integer
    I8(i8),
    /// Unsigned 16-bit integer
    U16(u16),
    /// Signed 16-bit integer
    I16(i16),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Signed 32-bit integer
    I32(i32),
    /// Unsigned 64-bit integer
    U64(u64),
    /// Signed 64-bit integer
    I64(i64),
    /// String, stored with a NUL terminator
    Str(String),
    /// Legacy single-page blob
    Blob(Vec<u8>),
}

impl StoredValue {
    /// On-flash type of this value
    pub fn item_type(&self) -> ItemType {
        match self {
            StoredValue::U8(_) => ItemType::U8,
            StoredValue::I8(_) => ItemType::I8,
            StoredValue::U16(_) => ItemType::U16,
            StoredValue::I16(_) => ItemType::I16,
            StoredValue::U32(_) => ItemType::U32,
            StoredValue::I32(_) => ItemType::I32,
            StoredValue::U64(_) => ItemType::U64,
            StoredValue::I64(_) => ItemType::I64,
            StoredValue::Str(_) => ItemType::Str,
            StoredValue::Blob(_) => ItemType::Blob,
        }
    }

    /// Encode into the item header followed by its payload slots
    fn encode(&self, ns: u8, key: &str) -> Result<Vec<[u8; ENTRY_SIZE]>> {
        let payload = match self {
            StoredValue::Str(text) => {
                let mut bytes = Vec::with_capacity(text.len() + 1);
                bytes.extend_from_slice(text.as_bytes());
                bytes.push(0);
                bytes
            }
            StoredValue::Blob(bytes) => bytes.clone(),
            scalar => {
                let mut data = [0xFFu8; 8];
                let raw = scalar.scalar_bytes();
                data[..raw.len()].copy_from_slice(&raw);
                return Ok(vec![Entry::new(ns, self.item_type(), 1, key, data)?.to_bytes()]);
            }
        };

        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(StorageError::Image(format!(
                "value of '{key}' is {} bytes, limit is {MAX_PAYLOAD_SIZE}",
                payload.len()
            )));
        }

        let chunks = payload.chunks(ENTRY_SIZE);
        let span = u8::try_from(1 + chunks.len())
            .map_err(|_| StorageError::Image(format!("value of '{key}' spans too many slots")))?;

        let mut slots = Vec::with_capacity(usize::from(span));
        let head = Entry::new(ns, self.item_type(), span, key, Entry::var_data(&payload)?)?;
        slots.push(head.to_bytes());
        for chunk in chunks {
            let mut slot = [0xFFu8; ENTRY_SIZE];
            slot[..chunk.len()].copy_from_slice(chunk);
            slots.push(slot);
        }
        Ok(slots)
    }

    fn scalar_bytes(&self) -> Vec<u8> {
        match *self {
            StoredValue::U8(v) => v.to_le_bytes().to_vec(),
            StoredValue::I8(v) => v.to_le_bytes().to_vec(),
            StoredValue::U16(v) => v.to_le_bytes().to_vec(),
            StoredValue::I16(v) => v.to_le_bytes().to_vec(),
            StoredValue::U32(v) => v.to_le_bytes().to_vec(),
            StoredValue::I32(v) => v.to_le_bytes().to_vec(),
            StoredValue::U64(v) => v.to_le_bytes().to_vec(),
            StoredValue::I64(v) => v.to_le_bytes().to_vec(),
            StoredValue::Str(_) | StoredValue::Blob(_) => Vec::new(),
        }
    }
}

macro_rules! stored_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for StoredValue {
                fn from(value: $ty) -> Self {
                    StoredValue::$variant(value)
                }
            }
        )*
    };
}

stored_value_from! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    String => Str,
    Vec<u8> => Blob,
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::Str(value.to_string())
    }
}

#[derive(Debug, Clone)]
struct PendingItem {
    ns: u8,
    key: String,
    value: StoredValue,
    erased: bool,
}

/// Assembles a partition image page by page
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    pages: usize,
    namespaces: Vec<String>,
    items: Vec<PendingItem>,
}

impl ImageBuilder {
    /// Builder for a partition of `pages` pages
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            namespaces: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Add a value, defining its namespace on first use
    pub fn add(
        &mut self,
        namespace: &str,
        key: &str,
        value: impl Into<StoredValue>,
    ) -> Result<&mut Self> {
        check_name("key", key)?;
        let ns = self.define_namespace(namespace)?;
        self.items.push(PendingItem {
            ns,
            key: key.to_string(),
            value: value.into(),
            erased: false,
        });
        Ok(self)
    }

    /// Mark the most recent value under `namespace`/`key` as erased
    ///
    /// The value is still written but its slots are flagged erased, as a
    /// superseded record would be.
    pub fn erase_entry(&mut self, namespace: &str, key: &str) -> Result<&mut Self> {
        let ns = self.namespace_index(namespace);
        let item = self
            .items
            .iter_mut()
            .rev()
            .find(|item| Some(item.ns) == ns && item.key == key && !item.erased)
            .ok_or_else(|| StorageError::Image(format!("no entry '{namespace}/{key}' to erase")))?;
        item.erased = true;
        Ok(self)
    }

    /// Index assigned to `namespace`, if defined
    pub fn namespace_index(&self, namespace: &str) -> Option<u8> {
        self.namespaces
            .iter()
            .position(|name| name == namespace)
            .and_then(|pos| u8::try_from(pos + 1).ok())
    }

    /// Number of values added, erased ones included
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no value has been added
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Lay everything out and return the image
    ///
    /// Namespace definitions come first, then values in insertion order.
    /// Every used page but the last is FULL; unused pages stay erased.
    pub fn build(&self) -> Result<Bytes> {
        if self.pages == 0 {
            return Err(StorageError::Image("image needs at least one page".to_string()));
        }
        if self.pages > MAX_IMAGE_PAGES {
            return Err(StorageError::Image(format!(
                "image of {} pages exceeds {MAX_IMAGE_PAGES}",
                self.pages
            )));
        }

        let mut layout = Layout::new(self.pages);
        for (pos, name) in self.namespaces.iter().enumerate() {
            let mut data = [0xFFu8; 8];
            data[0] = u8::try_from(pos + 1)
                .map_err(|_| StorageError::Image("too many namespaces".to_string()))?;
            let entry = Entry::new(NAMESPACE_DEFINITIONS, ItemType::U8, 1, name, data)?;
            layout.place(&[entry.to_bytes()], EntryState::Written)?;
        }

        for item in &self.items {
            let slots = item.value.encode(item.ns, &item.key)?;
            let state = if item.erased {
                EntryState::Erased
            } else {
                EntryState::Written
            };
            layout.place(&slots, state)?;
        }

        tracing::debug!(
            pages = self.pages,
            used = layout.page + 1,
            namespaces = self.namespaces.len(),
            items = self.items.len(),
            "built partition image"
        );
        Ok(layout.finish())
    }

    fn define_namespace(&mut self, namespace: &str) -> Result<u8> {
        check_name("namespace", namespace)?;
        if let Some(index) = self.namespace_index(namespace) {
            return Ok(index);
        }
        if self.namespaces.len() >= MAX_NAMESPACES {
            return Err(StorageError::Image(format!(
                "cannot define more than {MAX_NAMESPACES} namespaces"
            )));
        }
        self.namespaces.push(namespace.to_string());
        u8::try_from(self.namespaces.len())
            .map_err(|_| StorageError::Image("too many namespaces".to_string()))
    }
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(StorageError::Image(format!(
            "{what} '{name}' must be 1..={MAX_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

/// Write cursor over an erased image
struct Layout {
    image: Vec<u8>,
    bitmaps: Vec<[u8; BITMAP_SIZE]>,
    page: usize,
    slot: usize,
}

impl Layout {
    fn new(pages: usize) -> Self {
        Self {
            image: vec![0xFF; pages * PAGE_SIZE],
            bitmaps: vec![[0xFF; BITMAP_SIZE]; pages],
            page: 0,
            slot: 0,
        }
    }

    fn place(&mut self, slots: &[[u8; ENTRY_SIZE]], state: EntryState) -> Result<()> {
        if self.slot + slots.len() > ENTRY_COUNT {
            self.page += 1;
            self.slot = 0;
        }
        if self.page >= self.bitmaps.len() {
            return Err(StorageError::Image(format!(
                "image does not fit in {} pages",
                self.bitmaps.len()
            )));
        }

        for (i, raw) in slots.iter().enumerate() {
            let slot = self.slot + i;
            let offset = self.page * PAGE_SIZE + ENTRIES_OFFSET + slot * ENTRY_SIZE;
            self.image[offset..offset + ENTRY_SIZE].copy_from_slice(raw);
            set_bitmap_state(&mut self.bitmaps[self.page], slot, state);
        }
        self.slot += slots.len();
        Ok(())
    }

    fn finish(mut self) -> Bytes {
        for page in 0..=self.page {
            let state = if page == self.page {
                PageState::Active
            } else {
                PageState::Full
            };
            let base = page * PAGE_SIZE;
            // Sequence numbers follow page order
            let seq = u32::try_from(page).unwrap_or(u32::MAX);
            self.image[base..base + HEADER_SIZE]
                .copy_from_slice(&PageHeader::encode(state, seq, VERSION_2));
            self.image[base + BITMAP_OFFSET..base + BITMAP_OFFSET + BITMAP_SIZE]
                .copy_from_slice(&self.bitmaps[page]);
        }
        Bytes::from(self.image)
    }
}

/// TOML description of a partition's contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    /// Namespaces in definition order
    #[serde(default)]
    pub namespaces: Vec<NamespaceSpec>,
}

/// One namespace and its values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSpec {
    /// Namespace name
    pub name: String,

    /// Values in write order
    #[serde(default)]
    pub entries: Vec<EntrySpec>,
}

/// One typed value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySpec {
    /// Key name
    pub key: String,

    /// Stored type
    #[serde(rename = "type")]
    pub item_type: ItemType,

    /// Value; blobs are written as hex text
    pub value: ManifestValue,
}

/// Raw manifest value before it is checked against its type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestValue {
    /// Integer literal
    Integer(i64),
    /// String literal
    Text(String),
}

impl EntrySpec {
    /// Convert to a value of the declared type
    pub fn stored_value(&self) -> Result<StoredValue> {
        let out_of_range = || {
            StorageError::Image(format!(
                "value {:?} of '{}' does not fit {}",
                self.value, self.key, self.item_type
            ))
        };

        match (&self.value, self.item_type) {
            (ManifestValue::Integer(v), ItemType::U8) => {
                u8::try_from(*v).map(StoredValue::U8).map_err(|_| out_of_range())
            }
            (ManifestValue::Integer(v), ItemType::I8) => {
                i8::try_from(*v).map(StoredValue::I8).map_err(|_| out_of_range())
            }
            (ManifestValue::Integer(v), ItemType::U16) => {
                u16::try_from(*v).map(StoredValue::U16).map_err(|_| out_of_range())
            }
            (ManifestValue::Integer(v), ItemType::I16) => {
                i16::try_from(*v).map(StoredValue::I16).map_err(|_| out_of_range())
            }
            (ManifestValue::Integer(v), ItemType::U32) => {
                u32::try_from(*v).map(StoredValue::U32).map_err(|_| out_of_range())
            }
            (ManifestValue::Integer(v), ItemType::I32) => {
                i32::try_from(*v).map(StoredValue::I32).map_err(|_| out_of_range())
            }
            (ManifestValue::Integer(v), ItemType::U64) => {
                u64::try_from(*v).map(StoredValue::U64).map_err(|_| out_of_range())
            }
            (ManifestValue::Integer(v), ItemType::I64) => Ok(StoredValue::I64(*v)),
            // TOML integers stop at i64::MAX, larger u64 values are written as text
            (ManifestValue::Text(text), ItemType::U64) => {
                text.parse().map(StoredValue::U64).map_err(|_| out_of_range())
            }
            (ManifestValue::Text(text), ItemType::Str) => Ok(StoredValue::Str(text.clone())),
            (ManifestValue::Text(text), ItemType::Blob) => hex::decode(text)
                .map(StoredValue::Blob)
                .map_err(|e| {
                    StorageError::Image(format!("blob '{}' is not valid hex: {e}", self.key))
                }),
            (_, ItemType::BlobData | ItemType::BlobIndex) => Err(StorageError::Image(format!(
                "type {} of '{}' cannot be written from a manifest",
                self.item_type, self.key
            ))),
            _ => Err(out_of_range()),
        }
    }
}

impl ImageManifest {
    /// Parse a TOML manifest
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(text)
            .map_err(|e| StorageError::Image(format!("invalid manifest: {e}")))?;
        manifest
            .validate()
            .map_err(|e| StorageError::Image(e.to_string()))?;
        Ok(manifest)
    }

    /// Builder holding every value of the manifest
    pub fn into_builder(self, pages: usize) -> Result<ImageBuilder> {
        let mut builder = ImageBuilder::new(pages);
        for namespace in &self.namespaces {
            builder.define_namespace(&namespace.name)?;
            for entry in &namespace.entries {
                builder.add(&namespace.name, &entry.key, entry.stored_value()?)?;
            }
        }
        Ok(builder)
    }

    /// Total number of values
    pub fn entry_count(&self) -> usize {
        self.namespaces.iter().map(|ns| ns.entries.len()).sum()
    }
}

impl Validatable for ImageManifest {
    fn validate(&self) -> NvsbootResult<()> {
        if self.namespaces.len() > MAX_NAMESPACES {
            return Err(NvsbootError::invalid_input(format!(
                "manifest defines {} namespaces, limit is {MAX_NAMESPACES}",
                self.namespaces.len()
            )));
        }

        let mut names = HashSet::new();
        for namespace in &self.namespaces {
            if namespace.name.is_empty() || namespace.name.len() > MAX_NAME_LEN {
                return Err(NvsbootError::invalid_input(format!(
                    "namespace '{}' must be 1..={MAX_NAME_LEN} bytes",
                    namespace.name
                )));
            }
            if !names.insert(namespace.name.as_str()) {
                return Err(NvsbootError::invalid_input(format!(
                    "namespace '{}' is listed twice",
                    namespace.name
                )));
            }

            let mut keys = HashSet::new();
            for entry in &namespace.entries {
                if entry.key.is_empty() || entry.key.len() > MAX_NAME_LEN {
                    return Err(NvsbootError::invalid_input(format!(
                        "key '{}/{}' must be 1..={MAX_NAME_LEN} bytes",
                        namespace.name, entry.key
                    )));
                }
                if !keys.insert(entry.key.as_str()) {
                    return Err(NvsbootError::invalid_input(format!(
                        "key '{}/{}' is listed twice",
                        namespace.name, entry.key
                    )));
                }
            }
        }
        Ok(())
    }
}
