//! Common test utilities for integration tests.

pub mod assertions;
pub mod fixtures;

use cdc_replicator::cdc::dispatch::FanoutDispatcher;
use cdc_replicator::cdc::sink::{InMemorySink, SinkTarget};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

// Re-export common types
pub use assertions::*;
pub use fixtures::*;

/// Test error type
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

/// In-memory sinks named `mongo-1..=count`, sharing `cdc_data` and the `mysql` prefix
pub fn memory_sinks(count: usize) -> Vec<Arc<InMemorySink>> {
    (1..=count)
        .map(|i| Arc::new(InMemorySink::new(format!("mongo-{}", i))))
        .collect()
}

/// Dispatcher over the given in-memory sinks
pub fn dispatcher_for(sinks: &[Arc<InMemorySink>]) -> FanoutDispatcher {
    FanoutDispatcher::new(
        sinks
            .iter()
            .map(|sink| SinkTarget::new(sink.clone(), "cdc_data", "mysql"))
            .collect(),
    )
}

/// Test environment holding a temporary directory for config files.
pub struct TestEnv {
    pub temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Writes `content` to `name` inside the temp directory
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
