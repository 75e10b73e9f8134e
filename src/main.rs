//! zkelect - ZooKeeper-Backed Leader Election Node
//!
//! Command-line entry point: starts an election node, generates or
//! validates configuration, or queries a running node's metrics.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zkelect::automaton::{Ctx, Runner, Shutdown, State};
use zkelect::clock::TokioClock;
use zkelect::config::Config;
use zkelect::coordination::ZkConnector;
use zkelect::error::Result;
use zkelect::metrics::{Metrics, MetricsServer};

/// zkelect - ZooKeeper-backed leader election node
#[derive(Parser)]
#[command(name = "zkelect")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "zkelect.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the election node
    Run,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "zkelect.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,

    /// Query a running node's metrics endpoint
    Status {
        /// Node address to query
        #[arg(short, long, default_value = "localhost:8080")]
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run => run_node(cli.config).await,
        Commands::Init { output } => run_init(output),
        Commands::Validate => run_validate(cli.config),
        Commands::Status { address } => run_status(address).await,
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Start the election node
async fn run_node(config_path: PathBuf) -> Result<()> {
    tracing::info!("starting zkelect node...");

    let config = if config_path.exists() {
        match Config::from_file(&config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("failed to load configuration from {:?}: {}", config_path, e);
                return Err(e);
            }
        }
    } else {
        tracing::info!("no configuration file at {:?}, using defaults", config_path);
        Config::default()
    };
    tracing::info!(
        endpoints = config.coordination.endpoints.join(", "),
        "configuration loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let shutdown = Shutdown::new();

    tokio::spawn(watch_signals(shutdown.clone()));

    let metrics_server = MetricsServer::new(config.api.clone(), Arc::clone(&metrics));
    tokio::spawn(async move {
        if let Err(e) = metrics_server.start().await {
            tracing::error!("metrics server error: {}", e);
        }
    });

    let connect_timeout = config.connect_timeout();
    let ctx = Ctx {
        config: Arc::new(config),
        clock: Arc::new(TokioClock),
        connector: Arc::new(ZkConnector::new(connect_timeout)),
        shutdown,
    };

    let runner = Runner::new(metrics);
    match runner.run(&ctx, State::initial()).await {
        Ok(()) => {
            tracing::info!("zkelect shutdown complete");
            Ok(())
        }
        Err(e) if e.is_shutdown() => {
            tracing::info!("zkelect shutdown complete: {}", e);
            Ok(())
        }
        Err(e) => {
            tracing::error!("zkelect terminated: {}", e);
            Err(e)
        }
    }
}

/// Trigger shutdown on SIGINT or SIGTERM
async fn watch_signals(shutdown: Shutdown) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("received shutdown signal");
    shutdown.trigger("shut down by signal");
}

/// Initialize configuration file
fn run_init(output: PathBuf) -> Result<()> {
    let config_content = r#"# zkelect Configuration
# Generated configuration file

[coordination]
endpoints = ["zoo1:2181", "zoo2:2182", "zoo3:2183"]
session_timeout_ms = 300
connect_timeout_ms = 1000

[election]
marker_path = "/election"
attempt_interval_ms = 300

[leader]
data_path = "/data"
storage_capacity = 5
write_interval_ms = 300

[failover]
quick_retry_ms = 50
dead_leader_timeout_ms = 400
slow_retry_step_ms = 500
max_state_duration_ms = 10000

[api]
enabled = true
bind_address = "0.0.0.0:8080"

[logging]
level = "info"
format = "pretty"
"#;

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to configure your ensemble and election settings.");
    println!("Then start with: zkelect run --config {}", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    match Config::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Endpoints:        {:?}", config.coordination.endpoints);
            println!("  Marker Path:      {}", config.election.marker_path);
            println!("  Data Path:        {}", config.leader.data_path);
            println!("  Capacity:         {}", config.leader.storage_capacity);
            println!("  Quick Retry:      {} ms", config.failover.quick_retry_ms);
            println!(
                "  Failover Limit:   {} ms",
                config.failover.max_state_duration_ms
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {e}");
            Err(e)
        }
    }
}

/// Query a running node's metrics
async fn run_status(address: String) -> Result<()> {
    let url = format!("http://{address}/metrics");

    match reqwest::get(&url).await {
        Ok(response) => {
            let status: serde_json::Value = response
                .json()
                .await
                .map_err(|e| zkelect::Error::Network(e.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&status).unwrap());
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to get status: {e}");
            Err(zkelect::Error::Network(e.to_string()))
        }
    }
}
