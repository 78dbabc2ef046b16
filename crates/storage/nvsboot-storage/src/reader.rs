//! Batch read coordinator
//!
//! A batch is validated as a whole before any lookup. Once accepted, every
//! request is resolved independently and carries its own [`RecordStatus`];
//! the aggregate result only reports whether the batch was well-formed and
//! the partition readable.
//!
//! Resolution makes two passes over the searchable pages. The first maps the
//! requested namespace names to their on-flash indices, the second offers
//! each stored item to the first unresolved request that asks for it.

use crate::error::{Result, StorageError};
use crate::page::{
    self, Entry, PageReader, ENTRY_SIZE, MAX_PAYLOAD_SIZE, NAMESPACE_ANY, NAMESPACE_DEFINITIONS,
};
use crate::partition::PartitionRegistry;
use crate::traits::FlashRead;
use crate::types::{ItemType, ReadRequest, ReadValue, RecordStatus, MAX_NAME_LEN};

/// Runs batches against the partitions of a registry
#[derive(Debug, Clone, Default)]
pub struct BatchReader {
    registry: PartitionRegistry,
}

impl BatchReader {
    /// Create a reader over `registry`
    pub fn new(registry: PartitionRegistry) -> Self {
        Self { registry }
    }

    /// Partitions this reader can address
    pub fn registry(&self) -> &PartitionRegistry {
        &self.registry
    }

    /// Resolve every request in `requests` against partition `label`
    ///
    /// Returns `Ok(())` whenever the batch was well-formed, whatever the
    /// individual outcomes. A malformed batch or unknown label yields
    /// [`StorageError::InvalidArgument`] with diagnostic statuses on the
    /// offending records. Any other error means the partition could not be
    /// read and the records are left unpopulated.
    pub fn read(&self, label: &str, requests: &mut [ReadRequest<'_>]) -> Result<()> {
        let span = tracing::debug_span!("batch_read", partition = %label, records = requests.len());
        let _enter = span.enter();
        metrics::counter!("nvsboot_batches_total").increment(1);

        let result = validate_batch(requests).and_then(|()| {
            let partition = self.registry.get(label).ok_or_else(|| {
                StorageError::invalid_argument(format!("unknown partition '{label}'"))
            })?;
            resolve(partition.source(), requests)
        });

        match &result {
            Ok(()) => {
                let found = requests.iter().filter(|r| r.is_ok()).count();
                metrics::counter!("nvsboot_records_found_total").increment(found as u64);
                tracing::debug!(found, "batch resolved");
            }
            Err(e) if e.is_invalid_argument() => {
                metrics::counter!("nvsboot_batches_rejected_total").increment(1);
                tracing::debug!(error = %e, "batch rejected");
            }
            Err(e) => tracing::warn!(error = %e, "partition read failed"),
        }
        result
    }
}

/// Resolve a batch directly against a flash source
///
/// Same contract as [`BatchReader::read`] without the label lookup.
pub fn read_partition(flash: &dyn FlashRead, requests: &mut [ReadRequest<'_>]) -> Result<()> {
    validate_batch(requests)?;
    resolve(flash, requests)
}

/// Reset every record and check the batch shape
///
/// All records are checked so that each offending one carries its status.
pub(crate) fn validate_batch(requests: &mut [ReadRequest<'_>]) -> Result<()> {
    for request in requests.iter_mut() {
        request.status = RecordStatus::NotFound;
        if let ReadValue::Str { len, .. } = &mut request.value {
            *len = 0;
        }
    }

    if requests.is_empty() {
        return Err(StorageError::invalid_argument("empty batch"));
    }

    let mut rejected = 0usize;
    for request in requests.iter_mut() {
        if let Some(status) = validation_failure(request) {
            tracing::debug!(
                namespace = request.namespace,
                key = request.key,
                %status,
                "record failed validation"
            );
            request.status = status;
            rejected += 1;
        }
    }

    if rejected > 0 {
        return Err(StorageError::invalid_argument(format!(
            "{rejected} of {} records failed validation",
            requests.len()
        )));
    }
    Ok(())
}

fn validation_failure(request: &ReadRequest<'_>) -> Option<RecordStatus> {
    if request.namespace.len() > MAX_NAME_LEN {
        return Some(RecordStatus::NameTooLong);
    }
    if request.key.len() > MAX_NAME_LEN {
        return Some(RecordStatus::KeyTooLong);
    }
    match &request.value {
        ReadValue::Blob => Some(RecordStatus::InvalidArgument),
        ReadValue::Str { buf, .. } if buf.as_deref().map_or(true, <[u8]>::is_empty) => {
            Some(RecordStatus::InvalidSize)
        }
        _ => None,
    }
}

fn resolve(flash: &dyn FlashRead, requests: &mut [ReadRequest<'_>]) -> Result<()> {
    let page_count = page::page_count(flash)?;

    let mut pages = Vec::with_capacity(page_count);
    for index in 0..page_count {
        let page = PageReader::open(flash, index)?;
        if page.header().is_searchable() {
            pages.push(page);
        } else {
            tracing::debug!(page = index, state = ?page.header().state, "skipping page");
        }
    }

    // A repeated (namespace, key) pair never resolves
    let duplicate: Vec<bool> = (0..requests.len())
        .map(|i| {
            requests[..i].iter().any(|earlier| {
                earlier.namespace == requests[i].namespace && earlier.key == requests[i].key
            })
        })
        .collect();

    let namespaces = map_namespaces(&pages, requests)?;
    let mut pending: Vec<bool> = (0..requests.len())
        .map(|i| !duplicate[i] && namespaces[i].is_some())
        .collect();

    'pages: for page in &pages {
        for item in page.items() {
            if !pending.contains(&true) {
                break 'pages;
            }

            let (slot, entry) = item?;
            if entry.ns == NAMESPACE_DEFINITIONS {
                continue;
            }
            let Some(key) = entry.key_str() else {
                continue;
            };

            let target = (0..requests.len())
                .find(|&i| pending[i] && namespaces[i] == Some(entry.ns) && requests[i].key == key);
            if let Some(i) = target {
                if resolve_one(page, slot, &entry, &mut requests[i])? {
                    pending[i] = false;
                }
            }
        }
    }
    Ok(())
}

/// On-flash namespace index for each request, if the namespace exists
fn map_namespaces(
    pages: &[PageReader<'_>],
    requests: &[ReadRequest<'_>],
) -> Result<Vec<Option<u8>>> {
    let mut indices = vec![None; requests.len()];
    for page in pages {
        for item in page.items() {
            let (_, entry) = item?;
            if entry.ns != NAMESPACE_DEFINITIONS || entry.item_type() != Some(ItemType::U8) {
                continue;
            }
            let index = entry.data[0];
            if index == NAMESPACE_DEFINITIONS || index == NAMESPACE_ANY {
                continue;
            }
            let Some(name) = entry.key_str() else {
                continue;
            };
            for (slot, request) in indices.iter_mut().zip(requests) {
                if slot.is_none() && request.namespace == name {
                    *slot = Some(index);
                }
            }
        }
    }
    Ok(indices)
}

/// Apply one stored item to its request
///
/// Returns `false` when the item turned out unusable and the request should
/// stay open for another copy.
fn resolve_one(
    page: &PageReader<'_>,
    slot: usize,
    entry: &Entry,
    request: &mut ReadRequest<'_>,
) -> Result<bool> {
    if entry.type_code != request.item_type().code() {
        request.status = RecordStatus::TypeMismatch;
        return Ok(true);
    }

    let status = match &mut request.value {
        ReadValue::Str { buf, len } => {
            let size = entry.var_size();
            let expected_span = 1 + size.div_ceil(ENTRY_SIZE);
            if size == 0 || size > MAX_PAYLOAD_SIZE || usize::from(entry.span) != expected_span {
                tracing::warn!(
                    page = page.index(),
                    slot,
                    key = request.key,
                    size,
                    "malformed string item"
                );
                return Ok(false);
            }

            let Some(buf) = buf.as_deref_mut() else {
                return Ok(true);
            };
            if buf.len() < size {
                RecordStatus::InvalidSize
            } else if page.payload_crc(slot, size)? != entry.var_crc() {
                tracing::warn!(
                    page = page.index(),
                    slot,
                    key = request.key,
                    "string payload checksum mismatch"
                );
                return Ok(false);
            } else {
                page.read_payload(slot, &mut buf[..size])?;
                *len = size;
                RecordStatus::Ok
            }
        }
        ReadValue::Blob => RecordStatus::InvalidArgument,
        value => {
            value.set_primitive(&entry.data);
            RecordStatus::Ok
        }
    };

    request.status = status;
    Ok(true)
}
