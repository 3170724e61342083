//! miniond — the minion launcher daemon.
//!
//! Wires configuration, the Lambda-backed provisioner, the token-bucket
//! limiter and the elastic launcher together, then feeds demand events
//! from stdin until the feed closes or Ctrl-C arrives.
//!
//! # Usage
//!
//! ```text
//! miniond run --config minion.toml
//! miniond run --callback 10.0.0.5:50051 --endpoint 127.0.0.1:9001
//! miniond init-config --callback 10.0.0.5:50051 > minion.toml
//! ```

mod feed;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use minion_core::MinionConfig;
use minion_lambda::LambdaInvoker;
use minion_launcher::{ElasticLauncher, TokenBucket};

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str =
    "info,miniond=debug,minion_core=debug,minion_launcher=debug,minion_lambda=debug";

#[derive(Parser)]
#[command(name = "miniond", about = "Minion elastic worker launcher")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the launcher, reading demand events from stdin.
    Run {
        /// Path to minion.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Callback address for provisioned workers (overrides config).
        #[arg(long)]
        callback: Option<String>,

        /// Invoke endpoint host:port (overrides config).
        #[arg(long)]
        endpoint: Option<String>,

        /// Diagnostic instance id (overrides config).
        #[arg(long)]
        instance_id: Option<u32>,

        /// Seconds to wait for in-flight attempts on shutdown.
        #[arg(long, default_value = "5")]
        drain_timeout: u64,
    },
    /// Print a starter minion.toml.
    InitConfig {
        #[arg(long)]
        callback: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries stats lines.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            callback,
            endpoint,
            instance_id,
            drain_timeout,
        } => {
            let config = load_config(config, callback, endpoint, instance_id)?;
            run(config, Duration::from_secs(drain_timeout)).await
        }
        Command::InitConfig { callback } => {
            print!("{}", MinionConfig::with_callback(&callback).to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(
    path: Option<PathBuf>,
    callback: Option<String>,
    endpoint: Option<String>,
    instance_id: Option<u32>,
) -> anyhow::Result<MinionConfig> {
    let mut config = match (path, &callback) {
        (Some(path), _) => MinionConfig::read_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(callback)) => MinionConfig::with_callback(callback),
        (None, None) => anyhow::bail!("either --config or --callback is required"),
    };

    if let Some(callback) = callback {
        config.launcher.callback_address = callback;
    }
    if let Some(endpoint) = endpoint {
        config.lambda.endpoint = endpoint;
    }
    if let Some(id) = instance_id {
        config.launcher.instance_id = id;
    }
    config.validate()?;
    Ok(config)
}

async fn run(config: MinionConfig, drain_timeout: Duration) -> anyhow::Result<()> {
    let invoker = Arc::new(LambdaInvoker::new(
        config.lambda.endpoint.clone(),
        config.lambda.timeout()?,
    ));
    let limiter = Arc::new(TokenBucket::new(
        config.rate_limit.per_second,
        config.rate_limit.burst,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let launcher = ElasticLauncher::new(&config.launcher, invoker, limiter, shutdown_rx)?;

    info!(
        instance = config.launcher.instance_id,
        callback = %config.launcher.callback_address,
        endpoint = %config.lambda.endpoint,
        per_second = config.rate_limit.per_second,
        burst = config.rate_limit.burst,
        "minion launcher started"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading demand feed")? else {
                    info!("demand feed closed");
                    break;
                };
                match feed::apply(&launcher, &line) {
                    Ok(Some(stats)) => println!("{stats}"),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "ignoring feed line"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Cancels attempts still waiting on the limiter.
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(drain_timeout, launcher.settle()).await.is_err() {
        warn!(
            active = launcher.active_workers(),
            "in-flight provisioning attempts did not finish before exit"
        );
    }

    info!(stats = ?launcher.stats(), "minion launcher stopped");
    Ok(())
}
