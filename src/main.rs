//! CDC Replicator CLI - Main entry point.

use cdc_replicator::cdc::canonical::canonicalize;
use cdc_replicator::cdc::envelope::decode;
use cdc_replicator::cli::{Cli, Commands};
use cdc_replicator::config::ReplicatorConfig;
use std::io::Read;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Run {
            broker_uri,
            queue,
            dispatch,
        } => {
            let mut config = load_config(&cli.config, &cli.log_level, cli.json_logs)?;

            if let Some(uri) = broker_uri {
                config.broker.uri = uri;
            }
            if let Some(queue) = queue {
                config.broker.queue_name = queue;
            }
            if let Some(mode) = dispatch {
                config.pipeline.dispatch = mode;
            }

            cdc_replicator::run(config).await?;
        }

        Commands::CheckConfig => {
            let config = load_config(&cli.config, &cli.log_level, cli.json_logs)?;
            if let Err(e) = config.validate() {
                eprintln!("Invalid configuration: {}", e);
                std::process::exit(1);
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Decode { routing_key, file } => {
            let bytes = match file {
                Some(path) => std::fs::read(&path)?,
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };

            match decode(&bytes) {
                Ok(payload) => {
                    let canonical = canonicalize(&payload, &routing_key);
                    for warning in &canonical.warnings {
                        eprintln!("warning: {}", warning);
                    }
                    println!("{}", serde_json::to_string_pretty(&canonical.record)?);
                }
                Err(e) => {
                    eprintln!("Failed to decode envelope: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("cdc-replicator {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Config file (or defaults), then environment, then global CLI flags
fn load_config(
    path: &Option<std::path::PathBuf>,
    log_level: &Option<String>,
    json_logs: bool,
) -> anyhow::Result<ReplicatorConfig> {
    let mut config = ReplicatorConfig::load(path.as_deref())?;

    if let Some(level) = log_level {
        config.observability.log_level = level.clone();
    }
    if json_logs {
        config.observability.json_logs = true;
    }

    Ok(config)
}
