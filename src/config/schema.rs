//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP listener configuration.
    pub listener: ListenerConfig,

    /// TCP backend the bridge connects to.
    pub backend: BackendConfig,

    /// Optional login handshake performed after connecting.
    pub login: LoginConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// When the bridge opens its TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectMode {
    /// Connect before serving; startup fails if the backend is unreachable.
    /// A connection lost later is not re-established.
    #[default]
    Eager,
    /// Connect on the first POST and again after every teardown.
    Lazy,
}

/// TCP backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend host.
    pub host: String,

    /// Backend port. Zero means "not set"; usually supplied on the command line.
    pub port: u16,

    /// Size of the fixed read buffer used for short-read framing.
    pub read_buffer_size: usize,

    /// Eager or lazy connection establishment.
    pub connect_mode: ConnectMode,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            read_buffer_size: 1024,
            connect_mode: ConnectMode::Eager,
        }
    }
}

impl BackendConfig {
    /// `host:port` string used for connecting and logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Login handshake configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Perform the login handshake after each connect.
    pub enabled: bool,

    pub username: String,

    pub password: String,

    /// Sent on the wire as `databaseName`.
    pub database_name: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: test credentials. Override them in the config file.
            username: "testuser".to_string(),
            password: "testpassword".to_string(),
            database_name: "mydatabase".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
