// MongoDB sink

use crate::cdc::canonical::CanonicalRecord;
use crate::cdc::sink::DocumentSink;
use crate::error::{ReplicatorError, Result};
use async_trait::async_trait;
use mongodb::bson::{self, doc, Document};
use mongodb::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

/// Sink writing one document per record into a MongoDB deployment.
///
/// Pooling and reconnection are handled by the driver.
pub struct MongoSink {
    name: String,
    client: Client,
    closed: AtomicBool,
}

impl MongoSink {
    /// Connects and verifies the deployment answers a `ping` within `connect_timeout`
    pub async fn connect(name: impl Into<String>, uri: &str, connect_timeout: Duration) -> Result<Self> {
        let name = name.into();
        let client = Client::with_uri_str(uri).await?;

        tokio::time::timeout(
            connect_timeout,
            client.database("admin").run_command(doc! { "ping": 1 }, None),
        )
        .await
        .map_err(|_| ReplicatorError::Timeout(connect_timeout.as_millis() as u64))?
        .map_err(|e| ReplicatorError::ConnectionFailed(format!("MongoDB sink {}: {}", name, e)))?;

        info!(sink = %name, "Connected to MongoDB");

        Ok(Self {
            name,
            client,
            closed: AtomicBool::new(false),
        })
    }
}

/// Builds the stored document; `timestamp` becomes a native BSON datetime
pub fn to_bson_document(record: &CanonicalRecord) -> Result<Document> {
    let mut document =
        bson::to_document(record).map_err(|e| ReplicatorError::Serialization(e.to_string()))?;
    document.insert(
        "timestamp",
        bson::DateTime::from_millis(record.timestamp.timestamp_millis()),
    );
    Ok(document)
}

#[async_trait]
impl DocumentSink for MongoSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_writable(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn insert(&self, database: &str, collection: &str, record: &CanonicalRecord) -> Result<()> {
        let document = to_bson_document(record)?;
        self.client
            .database(database)
            .collection::<Document>(collection)
            .insert_one(document, None)
            .await?;
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.client.clone().shutdown().await;
        info!(sink = %self.name, "Disconnected from MongoDB");
    }
}
