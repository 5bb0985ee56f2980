//! Bridge error type.

use thiserror::Error;

/// Errors raised by the TCP bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No open connection, and the bridge is not allowed to open one now.
    #[error("TCP connection is not established")]
    NotConnected,

    /// The backend could not be reached.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket failure during an exchange.
    #[error("TCP I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend answered the login with an `error` key.
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// The backend closed the connection instead of answering the login.
    #[error("no login response")]
    NoLoginResponse,

    /// The login reply was not JSON.
    #[error("invalid login response: {0}")]
    InvalidLoginResponse(#[source] serde_json::Error),

    /// The outgoing message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl BridgeError {
    /// True for failures that happen while establishing the connection
    /// (connect or login), as opposed to failures mid-exchange.
    pub fn is_establish_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::NotConnected
                | BridgeError::Connect { .. }
                | BridgeError::LoginRejected(_)
                | BridgeError::NoLoginResponse
                | BridgeError::InvalidLoginResponse(_)
        )
    }
}
