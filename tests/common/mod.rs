//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_tcp_relay::config::{ConnectMode, RelayConfig};
use http_tcp_relay::lifecycle::{self, Shutdown};
use http_tcp_relay::TcpBridge;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Start a scripted line-based TCP backend.
///
/// `handler(connection_index, line)` returns the bytes to send back, or `None`
/// to close that connection without replying.
pub async fn start_backend<F>(handler: F) -> SocketAddr
where
    F: Fn(usize, String) -> Option<Vec<u8>> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        let mut connections = 0;
        while let Ok((socket, _)) = listener.accept().await {
            let handler = handler.clone();
            let index = connections;
            connections += 1;

            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    match handler(index, line) {
                        Some(reply) => {
                            if reader.get_mut().write_all(&reply).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            });
        }
    });

    addr
}

/// Start a backend that echoes every line back.
#[allow(dead_code)]
pub async fn start_echo_backend() -> SocketAddr {
    start_backend(|_, line| Some(line.into_bytes())).await
}

/// Start a backend that reads one line, then aborts the connection with a
/// TCP reset instead of replying.
#[allow(dead_code)]
pub async fn start_resetting_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            let _ = reader.read_line(&mut line).await;

            let socket = reader.into_inner();
            socket2::SockRef::from(&socket)
                .set_linger(Some(Duration::ZERO))
                .unwrap();
            drop(socket);
        }
    });

    addr
}

/// Relay configuration pointing at `backend`, listening on an ephemeral port.
pub fn relay_config(backend: SocketAddr, connect_mode: ConnectMode) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backend.host = backend.ip().to_string();
    config.backend.port = backend.port();
    config.backend.connect_mode = connect_mode;
    config
}

/// A relay running in the background.
#[allow(dead_code)]
pub struct RunningRelay {
    pub url: String,
    pub shutdown: Shutdown,
    pub bridge: Arc<Mutex<TcpBridge>>,
    pub handle: JoinHandle<std::io::Result<()>>,
}

/// Prepare and spawn a relay.
pub async fn start_relay(config: RelayConfig) -> RunningRelay {
    let prepared = lifecycle::prepare(config).await.unwrap();
    let addr = prepared.listener.local_addr().unwrap();
    let bridge = prepared.server.bridge();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(prepared.server.run(prepared.listener, server_shutdown));

    RunningRelay {
        url: format!("http://{}/", addr),
        shutdown,
        bridge,
        handle,
    }
}

/// HTTP client that bypasses any system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
