//! The persistent backend connection.
//!
//! # Responsibilities
//! - Open the TCP stream (eagerly at startup or lazily per request)
//! - Run the optional login handshake
//! - Send one JSON line and read one short-read-framed reply
//! - Tear the stream down on any failure so later calls fail fast
//!
//! # Design Decisions
//! - No retries: a failed exchange closes the connection and reports the error
//! - EOF from the backend also closes the connection
//! - Callers serialize access (the HTTP layer wraps the bridge in a mutex)

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::bridge::error::BridgeError;
use crate::bridge::framing::{encode_message, read_frame};
use crate::config::{BackendConfig, ConnectMode, LoginConfig};
use crate::observability::metrics;

/// Login credentials sent after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub database_name: String,
}

impl From<&LoginConfig> for Credentials {
    fn from(config: &LoginConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            database_name: config.database_name.clone(),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(rename = "databaseName")]
    database_name: &'a str,
}

/// Owner of the single backend connection.
#[derive(Debug)]
pub struct TcpBridge {
    address: String,
    read_buffer_size: usize,
    connect_mode: ConnectMode,
    credentials: Option<Credentials>,
    stream: Option<TcpStream>,
    shutting_down: bool,
}

impl TcpBridge {
    /// Create a closed bridge for `address` (eager mode, no login).
    pub fn new(address: impl Into<String>, read_buffer_size: usize) -> Self {
        Self {
            address: address.into(),
            read_buffer_size,
            connect_mode: ConnectMode::Eager,
            credentials: None,
            stream: None,
            shutting_down: false,
        }
    }

    /// Create a closed bridge from configuration.
    pub fn from_config(backend: &BackendConfig, login: &LoginConfig) -> Self {
        let bridge = Self::new(backend.address(), backend.read_buffer_size)
            .with_connect_mode(backend.connect_mode);
        if login.enabled {
            bridge.with_credentials(Credentials::from(login))
        } else {
            bridge
        }
    }

    pub fn with_connect_mode(mut self, connect_mode: ConnectMode) -> Self {
        self.connect_mode = connect_mode;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connect_mode(&self) -> ConnectMode {
        self.connect_mode
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Open the TCP stream. A no-op when already connected.
    pub async fn connect(&mut self) -> Result<(), BridgeError> {
        if self.stream.is_some() {
            return Ok(());
        }

        tracing::info!(backend = %self.address, "Connecting to TCP backend");
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|source| BridgeError::Connect {
                addr: self.address.clone(),
                source,
            })?;

        tracing::info!(backend = %self.address, "TCP connected");
        metrics::record_bridge_event("connected");
        self.stream = Some(stream);
        Ok(())
    }

    /// Run the login handshake. The connection is closed if it fails.
    ///
    /// The reply is a single read of at most one buffer.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), BridgeError> {
        match self.handshake(credentials).await {
            Ok(()) => {
                tracing::info!(backend = %self.address, user = %credentials.username, "TCP logged in");
                Ok(())
            }
            Err(e) => {
                if let BridgeError::LoginRejected(reason) = &e {
                    tracing::error!(backend = %self.address, reason = %reason, "TCP login rejected");
                    metrics::record_bridge_event("login_rejected");
                }
                self.close().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self, credentials: &Credentials) -> Result<(), BridgeError> {
        let request = LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
            database_name: &credentials.database_name,
        };
        let mut payload = serde_json::to_vec(&request).map_err(BridgeError::Encode)?;
        payload.push(b'\n');

        let mut chunk = vec![0u8; self.read_buffer_size];
        let stream = self.stream.as_mut().ok_or(BridgeError::NotConnected)?;
        stream.write_all(&payload).await?;
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(BridgeError::NoLoginResponse);
        }

        let reply: Value =
            serde_json::from_slice(&chunk[..n]).map_err(BridgeError::InvalidLoginResponse)?;
        match reply.get("error") {
            Some(Value::String(reason)) => Err(BridgeError::LoginRejected(reason.clone())),
            Some(other) => Err(BridgeError::LoginRejected(other.to_string())),
            None => Ok(()),
        }
    }

    /// Connect, then log in when credentials are configured.
    pub async fn establish(&mut self) -> Result<(), BridgeError> {
        self.connect().await?;
        if let Some(credentials) = self.credentials.clone() {
            self.login(&credentials).await?;
        }
        Ok(())
    }

    /// Make sure a connection is open before an exchange.
    ///
    /// Lazy bridges (re-)establish on demand. Eager bridges never reconnect,
    /// and neither does any bridge after [`TcpBridge::shutdown`].
    pub async fn ensure_connected(&mut self) -> Result<(), BridgeError> {
        if self.stream.is_some() {
            return Ok(());
        }
        if self.shutting_down {
            return Err(BridgeError::NotConnected);
        }
        match self.connect_mode {
            ConnectMode::Lazy => self.establish().await,
            ConnectMode::Eager => Err(BridgeError::NotConnected),
        }
    }

    /// Send `message` as a JSON line and return the framed reply.
    ///
    /// An empty result means the backend closed without replying.
    pub async fn forward(&mut self, message: &Value) -> Result<Bytes, BridgeError> {
        let payload = encode_message(message).map_err(BridgeError::Encode)?;
        let buffer_size = self.read_buffer_size;
        let stream = self.stream.as_mut().ok_or(BridgeError::NotConnected)?;

        let result = async {
            stream.write_all(&payload).await?;
            read_frame(&mut *stream, buffer_size).await
        }
        .await;

        match result {
            Ok(frame) => {
                tracing::debug!(
                    backend = %self.address,
                    sent = payload.len(),
                    received = frame.bytes.len(),
                    "Exchange complete"
                );
                if frame.peer_closed {
                    tracing::warn!(backend = %self.address, "Backend closed the connection");
                    metrics::record_bridge_event("peer_closed");
                    self.close().await;
                }
                Ok(frame.bytes)
            }
            Err(e) => {
                tracing::error!(backend = %self.address, error = %e, "TCP data error");
                metrics::record_bridge_event("io_error");
                self.close().await;
                Err(BridgeError::Io(e))
            }
        }
    }

    /// Close the connection for good. Requests still queued on the bridge
    /// fail with `NotConnected` instead of reconnecting.
    pub async fn shutdown(&mut self) {
        self.shutting_down = true;
        self.close().await;
    }

    /// Close the connection. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(backend = %self.address, error = %e, "Shutdown of TCP stream failed");
            }
            tracing::info!(backend = %self.address, "TCP connection closed");
            metrics::record_bridge_event("closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    async fn backend() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    fn credentials() -> Credentials {
        Credentials::from(&LoginConfig::default())
    }

    #[tokio::test]
    async fn forward_sends_one_json_line() {
        let (listener, addr) = backend().await;
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            reader.get_mut().write_all(b"{\"ok\":true}").await.unwrap();
            // Keep the socket open until the client is done.
            let mut rest = Vec::new();
            let _ = reader.read_to_end(&mut rest).await;
            line
        });

        let mut bridge = TcpBridge::new(addr, 1024);
        bridge.connect().await.unwrap();

        let message: Value = serde_json::from_str(r#"{"b": 1, "a": [1, 2]}"#).unwrap();
        let reply = bridge.forward(&message).await.unwrap();
        assert_eq!(&reply[..], b"{\"ok\":true}");
        assert!(bridge.is_connected());

        bridge.close().await;
        assert_eq!(server.await.unwrap(), "{\"b\":1,\"a\":[1,2]}\n");
    }

    #[tokio::test]
    async fn peer_close_tears_down_bridge() {
        let (listener, addr) = backend().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
        });

        let mut bridge = TcpBridge::new(addr, 1024);
        bridge.connect().await.unwrap();

        let reply = bridge.forward(&serde_json::json!({"x": 1})).await.unwrap();
        assert!(reply.is_empty());
        assert!(!bridge.is_connected());

        let err = bridge.forward(&serde_json::json!({"x": 2})).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));
    }

    #[tokio::test]
    async fn unreachable_backend_fails_connect() {
        let (listener, addr) = backend().await;
        drop(listener);

        let mut bridge = TcpBridge::new(addr, 1024);
        let err = bridge.connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::Connect { .. }));
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn login_accepted() {
        let (listener, addr) = backend().await;
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            reader.get_mut().write_all(b"{\"status\":\"ok\"}").await.unwrap();
            let mut rest = Vec::new();
            let _ = reader.read_to_end(&mut rest).await;
            line
        });

        let mut bridge = TcpBridge::new(addr, 1024).with_credentials(credentials());
        bridge.establish().await.unwrap();
        assert!(bridge.is_connected());
        bridge.close().await;

        let line = server.await.unwrap();
        let sent: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(sent["username"], "testuser");
        assert_eq!(sent["databaseName"], "mydatabase");
        assert!(line.ends_with('\n'));
    }

    #[tokio::test]
    async fn login_rejected_closes_connection() {
        let (listener, addr) = backend().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            reader
                .get_mut()
                .write_all(b"{\"error\":\"bad password\"}")
                .await
                .unwrap();
        });

        let mut bridge = TcpBridge::new(addr, 1024).with_credentials(credentials());
        let err = bridge.establish().await.unwrap_err();
        assert!(matches!(err, BridgeError::LoginRejected(ref r) if r == "bad password"));
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn login_without_reply_fails() {
        let (listener, addr) = backend().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
        });

        let mut bridge = TcpBridge::new(addr, 1024).with_credentials(credentials());
        let err = bridge.establish().await.unwrap_err();
        assert!(matches!(err, BridgeError::NoLoginResponse));
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn eager_bridge_does_not_reconnect() {
        let (_listener, addr) = backend().await;
        let mut bridge = TcpBridge::new(addr, 1024);

        let err = bridge.ensure_connected().await.unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn lazy_bridge_connects_on_demand() {
        let (listener, addr) = backend().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
        });

        let mut bridge = TcpBridge::new(addr, 1024).with_connect_mode(ConnectMode::Lazy);
        bridge.ensure_connected().await.unwrap();
        assert!(bridge.is_connected());
        bridge.close().await;
    }

    #[tokio::test]
    async fn login_with_non_json_reply_fails() {
        let (listener, addr) = backend().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            reader.get_mut().write_all(b"welcome").await.unwrap();
            let mut rest = Vec::new();
            let _ = reader.read_to_end(&mut rest).await;
        });

        let mut bridge = TcpBridge::new(addr, 1024).with_credentials(credentials());
        let err = bridge.establish().await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidLoginResponse(_)));
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn lazy_bridge_stays_closed_after_shutdown() {
        let (listener, addr) = backend().await;
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut rest = Vec::new();
                    let _ = socket.read_to_end(&mut rest).await;
                });
            }
        });

        let mut bridge = TcpBridge::new(addr, 1024).with_connect_mode(ConnectMode::Lazy);
        bridge.ensure_connected().await.unwrap();

        bridge.shutdown().await;
        assert!(bridge.is_shutting_down());
        assert!(!bridge.is_connected());

        let err = bridge.ensure_connected().await.unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut bridge = TcpBridge::new("127.0.0.1:1", 1024);
        bridge.close().await;
        bridge.close().await;
        assert!(!bridge.is_connected());
    }

    #[test]
    fn from_config_applies_login_only_when_enabled() {
        let mut backend = BackendConfig::default();
        backend.port = 7000;
        let mut login = LoginConfig::default();

        let bridge = TcpBridge::from_config(&backend, &login);
        assert!(bridge.credentials.is_none());
        assert_eq!(bridge.address(), "127.0.0.1:7000");

        login.enabled = true;
        let bridge = TcpBridge::from_config(&backend, &login);
        assert_eq!(bridge.credentials, Some(credentials()));
    }
}
