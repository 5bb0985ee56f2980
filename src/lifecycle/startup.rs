//! Startup orchestration.
//!
//! Binds the HTTP listener, then (in eager mode) establishes the backend
//! connection. Either failure aborts startup.

use thiserror::Error;
use tokio::net::TcpListener;

use crate::bridge::{BridgeError, TcpBridge};
use crate::config::{ConnectMode, RelayConfig};
use crate::http::RelayServer;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("port already in use: {addr}")]
    AddrInUse { addr: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start TCP connection: {0}")]
    Bridge(#[from] BridgeError),
}

/// A server ready to run on its bound listener.
pub struct Prepared {
    pub server: RelayServer,
    pub listener: TcpListener,
}

/// Bind the listener and build the server.
pub async fn prepare(config: RelayConfig) -> Result<Prepared, StartupError> {
    let addr = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&addr).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::AddrInUse {
            StartupError::AddrInUse { addr: addr.clone() }
        } else {
            StartupError::Bind {
                addr: addr.clone(),
                source,
            }
        }
    })?;

    let mut bridge = TcpBridge::from_config(&config.backend, &config.login);
    match config.backend.connect_mode {
        ConnectMode::Eager => bridge.establish().await?,
        ConnectMode::Lazy => {
            tracing::info!(backend = %bridge.address(), "TCP connection deferred until first POST")
        }
    }

    Ok(Prepared {
        server: RelayServer::new(config, bridge),
        listener,
    })
}
