//! Observability module for the replicator.
//!
//! Provides logging initialisation, the Prometheus metrics endpoint, and the
//! recording helpers used by the delivery loop and the fan-out dispatcher.

use crate::cdc::ack::AckDecision;
use crate::cdc::sink::{DeliveryOutcome, SinkWriteError};
use crate::config::ObservabilityConfig;
use crate::error::{ReplicatorError, Result};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| ReplicatorError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| ReplicatorError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Run the Prometheus metrics server.
pub async fn run_metrics_server(config: ObservabilityConfig) -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ReplicatorError::Internal(format!("Failed to install metrics recorder: {}", e)))?;

    register_metrics();

    let app = axum::Router::new()
        .route("/metrics", axum::routing::get(move || async move {
            handle.render()
        }))
        .route("/health", axum::routing::get(|| async { "OK" }));

    let listener = TcpListener::bind(config.metrics_addr).await?;
    info!(addr = %config.metrics_addr, "Metrics server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| ReplicatorError::Internal(format!("Metrics server failed: {}", e)))?;

    Ok(())
}

/// Register standard metrics.
fn register_metrics() {
    counter!("cdc_messages_received_total").absolute(0);
    counter!("cdc_messages_acked_total").absolute(0);
    counter!("cdc_messages_rejected_total").absolute(0);
    counter!("cdc_canonicalization_warnings_total").absolute(0);
}

/// Record a message pulled from the subscription.
pub fn record_message_received() {
    counter!("cdc_messages_received_total").increment(1);
}

/// Record the acknowledgment decision for a message.
pub fn record_ack(decision: AckDecision) {
    match decision {
        AckDecision::Ack => counter!("cdc_messages_acked_total").increment(1),
        AckDecision::RejectWithoutRequeue => counter!("cdc_messages_rejected_total").increment(1),
    }
}

/// Record a canonicalization warning.
pub fn record_canonicalization_warning() {
    counter!("cdc_canonicalization_warnings_total").increment(1);
}

/// Record one sink write.
pub fn record_sink_write(outcome: &DeliveryOutcome, elapsed: Duration) {
    let result = match outcome.error() {
        None => "delivered",
        Some(SinkWriteError::Timeout(_)) => "timeout",
        Some(SinkWriteError::Unavailable) => "unavailable",
        Some(SinkWriteError::Rejected(_)) => "error",
    };

    counter!(
        "cdc_sink_writes_total",
        "sink" => outcome.sink().to_string(),
        "outcome" => result
    ).increment(1);

    histogram!("cdc_sink_write_seconds", "sink" => outcome.sink().to_string())
        .record(elapsed.as_secs_f64());
}
