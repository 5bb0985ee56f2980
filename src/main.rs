//! HTTP-to-TCP relay.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                    RELAY                     │
//!  HTTP client    │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!  ───────────────┼─▶│  http   │──▶│  mutex   │──▶│  bridge   │──┼──▶ TCP backend
//!  GET / POST     │  │ server  │   │ (1 at a  │   │ JSON line │  │    (one long-lived
//!  ◀──────────────┼──│response │◀──│  time)   │◀──│ short-read│◀─┼──  connection)
//!                 │  └─────────┘   └──────────┘   └───────────┘  │
//!                 │                                              │
//!                 │  config · lifecycle (signals, shutdown)      │
//!                 │  observability (tracing, metrics)            │
//!                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use http_tcp_relay::config::{loader, ConnectMode, RelayConfig};
use http_tcp_relay::lifecycle::{self, signals, Shutdown};
use http_tcp_relay::observability::{logging, metrics};

/// Relay HTTP JSON requests to a TCP backend on localhost.
#[derive(Parser, Debug)]
#[command(name = "http-tcp-relay", version, about, long_about = None)]
struct Cli {
    /// TCP port of the backend
    backend_port: u16,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address [default: 0.0.0.0:8000]
    #[arg(short, long)]
    listen: Option<String>,

    /// Backend host [default: 127.0.0.1]
    #[arg(long)]
    backend_host: Option<String>,

    /// Connect on the first POST (and reconnect after failures) instead of at startup
    #[arg(long)]
    lazy: bool,

    /// Perform the login handshake after connecting
    #[arg(long)]
    login: bool,

    /// Read buffer size used to frame backend replies [default: 1024]
    #[arg(long)]
    read_buffer_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply command-line values on top of the file/default configuration.
    fn apply(self, config: &mut RelayConfig) {
        config.backend.port = self.backend_port;
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(host) = self.backend_host {
            config.backend.host = host;
        }
        if self.lazy {
            config.backend.connect_mode = ConnectMode::Lazy;
        }
        if self.login {
            config.login.enabled = true;
        }
        if let Some(size) = self.read_buffer_size {
            config.backend.read_buffer_size = size;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => loader::read_config(path)?,
        None => RelayConfig::default(),
    };
    cli.apply(&mut config);

    logging::init(&config.observability.log_level);
    loader::validate(&config)?;

    tracing::info!("http-tcp-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.address(),
        connect_mode = ?config.backend.connect_mode,
        login = config.login.enabled,
        read_buffer_size = config.backend.read_buffer_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let prepared = match lifecycle::prepare(config).await {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown.clone());

    prepared
        .server
        .run(prepared.listener, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
