// CDC Sink Fan-out

use super::canonical::CanonicalRecord;
use super::sink::{DeliveryOutcome, SinkTarget, SinkWriteError};
use crate::observability;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Per-write timeout used when none is configured
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// How writes to the configured sinks are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One write after another, in target order
    #[default]
    Sequential,
    /// All writes in flight together, joined before returning
    Concurrent,
}

impl std::str::FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(DispatchMode::Sequential),
            "concurrent" => Ok(DispatchMode::Concurrent),
            other => Err(format!("unknown dispatch mode: {}", other)),
        }
    }
}

/// Writes each record to every target, isolating failures per target.
pub struct FanoutDispatcher {
    targets: Vec<SinkTarget>,
    write_timeout: Duration,
    mode: DispatchMode,
}

impl FanoutDispatcher {
    pub fn new(targets: Vec<SinkTarget>) -> Self {
        Self {
            targets,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            mode: DispatchMode::Sequential,
        }
    }

    /// Sets the per-write timeout
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Sets the dispatch mode
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn targets(&self) -> &[SinkTarget] {
        &self.targets
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Writes `record` to every target.
    ///
    /// Returns one outcome per target, in target order. A failed target never
    /// prevents writes to the others.
    pub async fn dispatch(&self, record: &CanonicalRecord, routing_key: &str) -> Vec<DeliveryOutcome> {
        match self.mode {
            DispatchMode::Sequential => {
                let mut outcomes = Vec::with_capacity(self.targets.len());
                for target in &self.targets {
                    outcomes.push(self.write_one(target, record, routing_key).await);
                }
                outcomes
            }
            DispatchMode::Concurrent => {
                join_all(
                    self.targets
                        .iter()
                        .map(|target| self.write_one(target, record, routing_key)),
                )
                .await
            }
        }
    }

    async fn write_one(
        &self,
        target: &SinkTarget,
        record: &CanonicalRecord,
        routing_key: &str,
    ) -> DeliveryOutcome {
        let collection = target.collection_for(routing_key);
        let sink = target.name().to_string();
        let started = Instant::now();

        let result = if !target.sink().is_writable() {
            Err(SinkWriteError::Unavailable)
        } else {
            match tokio::time::timeout(
                self.write_timeout,
                target.sink().insert(target.database(), &collection, record),
            )
            .await
            {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(SinkWriteError::Rejected(e.to_string())),
                Err(_) => Err(SinkWriteError::Timeout(self.write_timeout)),
            }
        };

        let outcome = match result {
            Ok(()) => {
                info!(sink = %sink, collection = %collection, "Stored record");
                DeliveryOutcome::Delivered { sink, collection }
            }
            Err(error) => {
                warn!(
                    sink = %sink,
                    database = %target.database(),
                    collection = %collection,
                    error = %error,
                    "Sink write failed"
                );
                DeliveryOutcome::Failed {
                    sink,
                    collection,
                    error,
                }
            }
        };

        observability::record_sink_write(&outcome, started.elapsed());
        outcome
    }
}
