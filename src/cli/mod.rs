//! Command-line interface for the CDC replicator.

use crate::cdc::dispatch::DispatchMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CDC Replicator - replicates Debezium change events from RabbitMQ into MongoDB.
#[derive(Parser)]
#[command(name = "cdc-replicator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (JSON)
    #[arg(short, long, env = "CDC_REPLICATOR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CDC_REPLICATOR_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Consume from the broker and replicate into the configured sinks
    Run {
        /// Broker URI (overrides config and RABBITMQ_URI)
        #[arg(long)]
        broker_uri: Option<String>,

        /// Queue to consume from
        #[arg(long)]
        queue: Option<String>,

        /// Sink scheduling within one message (sequential, concurrent)
        #[arg(long)]
        dispatch: Option<DispatchMode>,
    },

    /// Load and validate the configuration, then print it
    CheckConfig,

    /// Decode one envelope and print the canonical record
    Decode {
        /// Routing key the envelope was published with
        #[arg(short, long)]
        routing_key: String,

        /// Envelope file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "cdc-replicator",
            "--log-level",
            "debug",
            "run",
            "--queue",
            "orders.events",
            "--dispatch",
            "concurrent",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Run { broker_uri, queue, dispatch } => {
                assert!(broker_uri.is_none());
                assert_eq!(queue.as_deref(), Some("orders.events"));
                assert_eq!(dispatch, Some(DispatchMode::Concurrent));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_decode() {
        let cli = Cli::try_parse_from([
            "cdc-replicator",
            "decode",
            "--routing-key",
            "dbserver1.inventory.customers",
            "event.json",
            "--json-logs",
        ])
        .unwrap();

        assert!(cli.json_logs);
        match cli.command {
            Commands::Decode { routing_key, file } => {
                assert_eq!(routing_key, "dbserver1.inventory.customers");
                assert_eq!(file, Some(PathBuf::from("event.json")));
            }
            _ => panic!("expected decode"),
        }
    }

    #[test]
    fn test_rejects_unknown_dispatch_mode() {
        assert!(Cli::try_parse_from(["cdc-replicator", "run", "--dispatch", "parallel"]).is_err());
    }
}
