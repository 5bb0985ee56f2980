//! HTTP-to-TCP relay library.
//!
//! Accepts JSON over HTTP, forwards it as a JSON line over one persistent
//! TCP connection and returns the backend's reply as the HTTP response.

pub mod bridge;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use bridge::{BridgeError, TcpBridge};
pub use config::RelayConfig;
pub use http::RelayServer;
pub use lifecycle::Shutdown;
