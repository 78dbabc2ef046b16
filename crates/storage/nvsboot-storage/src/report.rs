//! Human-readable rendering of a batch
//!
//! Used around a read to show what was asked and what came back.

use crate::types::{ItemType, ReadRequest, ReadValue, RecordStatus};
use serde::Serialize;

/// Point in a batch's life a listing is taken at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPhase {
    /// Before the read; only the requests are shown
    Request,
    /// After an accepted read; results are shown
    Completed,
    /// After a rejected read; per-record diagnostics are shown
    Rejected,
}

/// Serializable view of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    /// Namespace name
    pub namespace: String,
    /// Key name
    pub key: String,
    /// Requested type
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Per-record outcome
    pub status: RecordStatus,
    /// Rendered value, present for successful records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Log one event per record for `phase`
pub fn log_read_list(phase: ListPhase, requests: &[ReadRequest<'_>]) {
    for (index, request) in requests.iter().enumerate() {
        match phase {
            ListPhase::Request => tracing::info!(
                index,
                namespace = request.namespace,
                key = request.key,
                item_type = %request.item_type(),
                "requested"
            ),
            ListPhase::Completed => match render_value(request) {
                Some(value) => tracing::info!(
                    index,
                    namespace = request.namespace,
                    key = request.key,
                    item_type = %request.item_type(),
                    %value,
                    "found"
                ),
                None => tracing::info!(
                    index,
                    namespace = request.namespace,
                    key = request.key,
                    item_type = %request.item_type(),
                    status = %request.status,
                    "not read"
                ),
            },
            ListPhase::Rejected if request.status.is_validation_error()
                || request.status == RecordStatus::InvalidSize =>
            {
                tracing::warn!(
                    index,
                    namespace = request.namespace,
                    key = request.key,
                    item_type = %request.item_type(),
                    status = %request.status,
                    "rejected"
                );
            }
            ListPhase::Rejected => tracing::info!(
                index,
                namespace = request.namespace,
                key = request.key,
                status = %request.status,
                "valid"
            ),
        }
    }
}

/// Serializable rows for every record
pub fn summarize(requests: &[ReadRequest<'_>]) -> Vec<RecordSummary> {
    requests
        .iter()
        .map(|request| RecordSummary {
            namespace: request.namespace.to_string(),
            key: request.key.to_string(),
            item_type: request.item_type(),
            status: request.status,
            value: render_value(request),
        })
        .collect()
}

/// Value of a successful record as text
///
/// Strings that are not UTF-8 are rendered as hex.
pub fn render_value(request: &ReadRequest<'_>) -> Option<String> {
    if !request.is_ok() {
        return None;
    }
    match &request.value {
        ReadValue::Str { buf: Some(buf), len } => {
            let written = &buf[..(*len).min(buf.len())];
            let text = written.strip_suffix(&[0u8]).unwrap_or(written);
            Some(match std::str::from_utf8(text) {
                Ok(text) => format!("{text:?}"),
                Err(_) => format!("0x{}", hex::encode(text)),
            })
        }
        value => value.as_integer().map(|v| v.to_string()),
    }
}
