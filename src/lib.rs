//! CDC Replicator - replicates MySQL change events from RabbitMQ into MongoDB.
//!
//! Debezium publishes row-level change envelopes to a RabbitMQ topic exchange.
//! The replicator consumes them from a durable queue, turns each envelope into a
//! canonical record and writes that record to every configured document sink.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ Subscription │──▶│ Envelope │──▶│ Canonicalize │──▶│ Fan-out dispatch │──▶ sink 1..N
//! │  (RabbitMQ)  │   │  decode  │   │              │   │  (per-write      │
//! └──────▲───────┘   └────┬─────┘   └──────────────┘   │   timeout)       │
//!        │                │ malformed                   └────────┬─────────┘
//!        │                ▼                                      │
//!        └──────── reject (no requeue) / ack ◀───────────────────┘
//! ```
//!
//! A message is acknowledged once every sink was attempted, whatever the
//! individual outcomes. Only undecodable messages are rejected.
//!
//! # Quick Start
//!
//! ```no_run
//! use cdc_replicator::config::ReplicatorConfig;
//!
//! #[tokio::main]
//! async fn main() -> cdc_replicator::Result<()> {
//!     // Local broker, records printed to stdout
//!     let config = ReplicatorConfig::development();
//!
//!     cdc_replicator::run(config).await
//! }
//! ```

pub mod config;
pub mod error;

pub mod broker;
pub mod cdc;
pub mod shutdown;
pub mod store;

pub mod cli;
pub mod observability;

// Re-exports
pub use error::{ReplicatorError, Result};

use cdc::dispatch::FanoutDispatcher;
use cdc::sink::{DocumentSink, InMemorySink, SinkTarget, StdoutSink};
use config::{ReplicatorConfig, SinkKind};
use shutdown::{ShutdownCoordinator, SignalHandler};
use std::sync::Arc;
use tracing::{error, info};

/// Run the replicator with the given configuration.
///
/// Returns once shutdown is requested or the broker subscription ends.
pub async fn run(config: ReplicatorConfig) -> Result<()> {
    observability::init(&config.observability)?;
    config.validate()?;

    info!(
        queue = %config.broker.queue_name,
        sinks = config.sinks.len(),
        "Starting CDC replicator"
    );

    // Every sink must be reachable before consuming starts
    let targets = build_targets(&config).await?;
    let sinks: Vec<Arc<dyn DocumentSink>> = targets.iter().map(|t| t.sink().clone()).collect();
    let dispatcher = FanoutDispatcher::new(targets)
        .with_write_timeout(config.pipeline.write_timeout)
        .with_mode(config.pipeline.dispatch);

    let mut metrics_handle = None;
    if config.observability.metrics_enabled {
        info!("Starting metrics server on {}", config.observability.metrics_addr);
        let obs_config = config.observability.clone();

        metrics_handle = Some(tokio::spawn(async move {
            if let Err(e) = observability::run_metrics_server(obs_config).await {
                error!("Metrics server error: {}", e);
            }
        }));
    }

    let coordinator = ShutdownCoordinator::new();

    // Start signal handler in background
    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        SignalHandler::new(signal_coordinator).run().await;
    });

    let result = consume(&config, dispatcher, coordinator).await;

    info!("Shutting down CDC replicator...");

    for sink in &sinks {
        sink.close().await;
    }

    if let Some(handle) = metrics_handle {
        handle.abort();
    }

    info!("CDC replicator shutdown complete");
    result
}

#[cfg(feature = "amqp")]
async fn consume(
    config: &ReplicatorConfig,
    dispatcher: FanoutDispatcher,
    coordinator: ShutdownCoordinator,
) -> Result<()> {
    use broker::AmqpSubscription;
    use cdc::consumer::DeliveryLoop;

    let subscription = AmqpSubscription::open(&config.broker).await?;
    let mut delivery = DeliveryLoop::new(subscription, dispatcher, coordinator);
    delivery.run().await;

    delivery.into_subscription().close().await
}

#[cfg(not(feature = "amqp"))]
async fn consume(
    _config: &ReplicatorConfig,
    _dispatcher: FanoutDispatcher,
    _coordinator: ShutdownCoordinator,
) -> Result<()> {
    Err(ReplicatorError::Config(
        "built without the `amqp` feature; no broker subscription is available".to_string(),
    ))
}

/// Connect every configured sink, in configuration order.
///
/// Fails on the first sink that cannot be reached.
pub async fn build_targets(config: &ReplicatorConfig) -> Result<Vec<SinkTarget>> {
    let mut targets = Vec::with_capacity(config.sinks.len());

    for (index, sink_config) in config.sinks.iter().enumerate() {
        let name = sink_config.display_name(index);

        let sink: Arc<dyn DocumentSink> = match sink_config.kind {
            SinkKind::Mongodb => match connect_mongo(&name, &sink_config.uri, config).await {
                Ok(sink) => sink,
                Err(e) => {
                    error!(sink = %name, error = %e, "Failed to connect sink");
                    return Err(e);
                }
            },
            SinkKind::Stdout => Arc::new(StdoutSink::new(name.clone())),
            SinkKind::Memory => Arc::new(InMemorySink::new(name.clone())),
        };

        info!(
            sink = %name,
            kind = ?sink_config.kind,
            database = %sink_config.database,
            prefix = %sink_config.collection_prefix,
            "Sink ready"
        );

        targets.push(SinkTarget::new(
            sink,
            sink_config.database.clone(),
            sink_config.collection_prefix.clone(),
        ));
    }

    Ok(targets)
}

#[cfg(feature = "mongo")]
async fn connect_mongo(
    name: &str,
    uri: &str,
    config: &ReplicatorConfig,
) -> Result<Arc<dyn DocumentSink>> {
    let sink = store::MongoSink::connect(name, uri, config.pipeline.connect_timeout).await?;
    Ok(Arc::new(sink))
}

#[cfg(not(feature = "mongo"))]
async fn connect_mongo(
    name: &str,
    _uri: &str,
    _config: &ReplicatorConfig,
) -> Result<Arc<dyn DocumentSink>> {
    Err(ReplicatorError::Config(format!(
        "sink {} needs MongoDB support; rebuild with the `mongo` feature",
        name
    )))
}
