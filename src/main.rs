//! HTTP metrics gateway.
//!
//! Sits in front of an application, forwards every request to it, and
//! records Prometheus metrics labelled by a bounded set of endpoint names.
//!
//! ```text
//!   Client ──▶ listener ──▶ metrics middleware ──▶ upstream slots ──▶ Application
//!                              │
//!                              ▼
//!                        endpoint matcher (rules + recency cache)
//!                              │
//!                              ▼
//!                        Prometheus exporter (/metrics)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use http_metrics::config::{load_config, ConfigError, ServerConfig};
use http_metrics::config::validation::validate_config;
use http_metrics::config::watcher::ConfigWatcher;
use http_metrics::endpoint::EndpointMatcher;
use http_metrics::lifecycle::Shutdown;
use http_metrics::observability::{logging, metrics};
use http_metrics::HttpServer;

#[derive(Parser)]
#[command(name = "http-metrics")]
#[command(about = "HTTP metrics gateway with endpoint pattern classification", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway
    Serve {
        /// Reload endpoint rules when the config file changes
        #[arg(long)]
        watch: bool,
    },
    /// Print the endpoint label for each path
    Classify {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn read_config(path: Option<&PathBuf>) -> Result<ServerConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = ServerConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = read_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Classify { paths } => {
            let matcher = EndpointMatcher::new(&config.http_metrics.endpoint_patterns)?;
            for path in paths {
                println!("{}\t{}", path, matcher.match_path(&path));
            }
            Ok(())
        }
        Commands::Serve { watch } => serve(config, cli.config, watch).await,
    }
}

async fn serve(
    config: ServerConfig,
    config_path: Option<PathBuf>,
    watch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&config.observability.log_level)?;

    tracing::info!("http-metrics v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        max_concurrent = config.upstream.max_concurrent,
        matching = config.http_metrics.endpoint_patterns.enabled,
        rules = config.http_metrics.endpoint_patterns.rules.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr, &config.http_metrics)?;
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match (watch, config_path.as_deref()) {
        (true, Some(path)) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run()?), updates)
        }
        (true, None) => {
            tracing::warn!("--watch ignored without --config");
            (None, mpsc::unbounded_channel().1)
        }
        (false, _) => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let _signals = shutdown.listen_for_signals();

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
