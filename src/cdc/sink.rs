// CDC Sinks

use super::canonical::{last_routing_segment, CanonicalRecord};
use crate::error::{ReplicatorError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Document store that receives canonical records.
///
/// Connection management stays with the implementation; the dispatcher only
/// asks whether the sink is currently writable and then inserts.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Gets the sink name
    fn name(&self) -> &str;

    /// Whether a write may be attempted right now
    fn is_writable(&self) -> bool {
        true
    }

    /// Inserts one record into `database.collection`
    async fn insert(&self, database: &str, collection: &str, record: &CanonicalRecord) -> Result<()>;

    /// Releases held connections; the sink is not writable afterwards
    async fn close(&self) {}
}

/// One configured destination. Created at startup, read-only afterwards.
#[derive(Clone)]
pub struct SinkTarget {
    sink: Arc<dyn DocumentSink>,
    database: String,
    collection_prefix: String,
}

impl SinkTarget {
    pub fn new(
        sink: Arc<dyn DocumentSink>,
        database: impl Into<String>,
        collection_prefix: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            database: database.into(),
            collection_prefix: collection_prefix.into(),
        }
    }

    /// Gets the sink name
    pub fn name(&self) -> &str {
        self.sink.name()
    }

    pub fn sink(&self) -> &Arc<dyn DocumentSink> {
        &self.sink
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Collection that receives records published under `routing_key`
    pub fn collection_for(&self, routing_key: &str) -> String {
        collection_name(&self.collection_prefix, routing_key)
    }
}

impl std::fmt::Debug for SinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkTarget")
            .field("sink", &self.sink.name())
            .field("database", &self.database)
            .field("collection_prefix", &self.collection_prefix)
            .finish()
    }
}

/// `<prefix>_<last routing segment>`, or the prefix alone when the key has no segments
pub fn collection_name(prefix: &str, routing_key: &str) -> String {
    match last_routing_segment(routing_key) {
        Some(segment) => format!("{}_{}", prefix, segment),
        None => prefix.to_string(),
    }
}

/// Why a write to one sink did not happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkWriteError {
    /// Write did not finish within the per-write timeout
    Timeout(Duration),
    /// Sink reported itself as not writable; no write was attempted
    Unavailable,
    /// Store returned an error
    Rejected(String),
}

impl std::fmt::Display for SinkWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkWriteError::Timeout(after) => write!(f, "timed out after {:?}", after),
            SinkWriteError::Unavailable => write!(f, "sink not writable"),
            SinkWriteError::Rejected(cause) => write!(f, "{}", cause),
        }
    }
}

/// Per-sink result of writing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        sink: String,
        collection: String,
    },
    Failed {
        sink: String,
        collection: String,
        error: SinkWriteError,
    },
}

impl DeliveryOutcome {
    pub fn sink(&self) -> &str {
        match self {
            DeliveryOutcome::Delivered { sink, .. } | DeliveryOutcome::Failed { sink, .. } => sink,
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            DeliveryOutcome::Delivered { collection, .. }
            | DeliveryOutcome::Failed { collection, .. } => collection,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn error(&self) -> Option<&SinkWriteError> {
        match self {
            DeliveryOutcome::Delivered { .. } => None,
            DeliveryOutcome::Failed { error, .. } => Some(error),
        }
    }
}

/// A record stored by [`InMemorySink`]
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub database: String,
    pub collection: String,
    pub record: CanonicalRecord,
}

/// In-process sink, for dry runs and tests
pub struct InMemorySink {
    name: String,
    writable: AtomicBool,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    documents: Mutex<Vec<StoredDocument>>,
}

impl InMemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writable: AtomicBool::new(true),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            documents: Mutex::new(Vec::new()),
        }
    }

    /// Makes every following insert fail with `reason`
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock() = Some(reason.into());
    }

    /// Delays every following insert
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    /// Snapshot of stored documents
    pub fn documents(&self) -> Vec<StoredDocument> {
        self.documents.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}

#[async_trait]
impl DocumentSink for InMemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_writable(&self) -> bool {
        self.writable.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.writable.store(false, Ordering::SeqCst);
    }

    async fn insert(&self, database: &str, collection: &str, record: &CanonicalRecord) -> Result<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().clone();
        if let Some(reason) = failure {
            return Err(ReplicatorError::SinkWrite {
                sink: self.name.clone(),
                reason,
            });
        }

        self.documents.lock().push(StoredDocument {
            database: database.to_string(),
            collection: collection.to_string(),
            record: record.clone(),
        });
        Ok(())
    }
}

/// Sink that prints each outbound document as one JSON line (for debugging)
pub struct StdoutSink {
    name: String,
    written: AtomicU64,
}

impl StdoutSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: AtomicU64::new(0),
        }
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentSink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, database: &str, collection: &str, record: &CanonicalRecord) -> Result<()> {
        let json = record.to_json()?;
        println!("[{}.{}] {}", database, collection, json);
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
