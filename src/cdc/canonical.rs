// CDC Canonical Records

use super::envelope::{ChangePayload, Document, Operation};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::debug;

/// Binlog coordinates of a change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinlogPosition {
    /// Binlog file name
    pub file: String,
    /// Offset within the file
    pub pos: u64,
}

/// Sink-agnostic change record.
///
/// Serializes to the outbound document: optional fields are omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    /// Source database name (empty when the source block lacks one)
    #[serde(rename = "database_name")]
    pub database: String,
    /// Table name, taken from the routing key
    pub table_name: String,
    /// Canonical operation
    pub operation: Operation,
    /// Row image before the change
    #[serde(rename = "before_data", skip_serializing_if = "Option::is_none")]
    pub before: Option<Document>,
    /// Row image after the change
    #[serde(rename = "after_data", skip_serializing_if = "Option::is_none")]
    pub after: Option<Document>,
    /// Event time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Transaction id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Binlog position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binlog_position: Option<BinlogPosition>,
}

impl CanonicalRecord {
    /// Serializes to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serializes to JSON bytes
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Which row image failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageField {
    Before,
    After,
}

impl std::fmt::Display for ImageField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageField::Before => write!(f, "before"),
            ImageField::After => write!(f, "after"),
        }
    }
}

/// Non-fatal problem found while canonicalizing; the field is left empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalizationWarning {
    pub field: ImageField,
    pub reason: String,
}

impl std::fmt::Display for CanonicalizationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not parse {} image: {}", self.field, self.reason)
    }
}

/// Result of canonicalizing one payload
#[derive(Debug, Clone)]
pub struct Canonicalized {
    pub record: CanonicalRecord,
    pub warnings: Vec<CanonicalizationWarning>,
}

/// Non-empty dot-delimited segments of a routing key
pub fn routing_segments(routing_key: &str) -> impl Iterator<Item = &str> {
    routing_key.split('.').filter(|s| !s.is_empty())
}

/// Last dot-delimited segment of a routing key.
///
/// A key without any dot has no segments.
pub fn last_routing_segment(routing_key: &str) -> Option<&str> {
    if !routing_key.contains('.') {
        return None;
    }
    routing_segments(routing_key).last()
}

/// Table named by a routing key: its last segment, or the whole key when it
/// has no dot
pub fn routing_table(routing_key: &str) -> &str {
    routing_segments(routing_key).last().unwrap_or_default()
}

/// Builds the canonical record for a payload. Never fails.
pub fn canonicalize(payload: &ChangePayload, routing_key: &str) -> Canonicalized {
    let mut warnings = Vec::new();

    let before = parse_image(payload.before.as_deref(), ImageField::Before, &mut warnings);
    let after = parse_image(payload.after.as_deref(), ImageField::After, &mut warnings);

    let table_name = routing_table(routing_key);
    if let Some(table) = payload.source_str("table").filter(|t| *t != table_name) {
        debug!(
            routing_key = %routing_key,
            source_table = %table,
            "Routing key table differs from source table"
        );
    }

    let record = CanonicalRecord {
        database: payload.source_str("db").unwrap_or_default().to_string(),
        table_name: table_name.to_string(),
        operation: payload.operation(),
        before,
        after,
        timestamp: timestamp_from_millis(payload.ts_ms.unwrap_or(0)),
        transaction_id: payload.transaction_id().map(str::to_string),
        binlog_position: binlog_position(payload),
    };

    Canonicalized { record, warnings }
}

/// Converts epoch milliseconds to a UTC timestamp
pub fn timestamp_from_millis(ts_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts_ms).unwrap_or(DateTime::UNIX_EPOCH)
}

fn parse_image(
    raw: Option<&RawValue>,
    field: ImageField,
    warnings: &mut Vec<CanonicalizationWarning>,
) -> Option<Document> {
    let raw = raw?;
    if raw.get().trim() == "null" {
        return None;
    }
    match serde_json::from_str::<Document>(raw.get()) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warnings.push(CanonicalizationWarning {
                field,
                reason: e.to_string(),
            });
            None
        }
    }
}

fn binlog_position(payload: &ChangePayload) -> Option<BinlogPosition> {
    let file = payload.source_str("file")?;
    let pos = match payload.source_field("pos")? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    Some(BinlogPosition {
        file: file.to_string(),
        pos,
    })
}
