//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and addresses.
//! Every violation is reported, not just the first.

use std::net::SocketAddr;

use crate::config::schema::RelayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("backend.port must be set (non-zero)")]
    MissingBackendPort,

    #[error("backend.host must not be empty")]
    EmptyBackendHost,

    #[error("backend.read_buffer_size must be greater than zero")]
    ZeroReadBuffer,

    #[error("listener.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backend.port == 0 {
        errors.push(ValidationError::MissingBackendPort);
    }
    if config.backend.host.trim().is_empty() {
        errors.push(ValidationError::EmptyBackendHost);
    }
    if config.backend.read_buffer_size == 0 {
        errors.push(ValidationError::ZeroReadBuffer);
    }
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
