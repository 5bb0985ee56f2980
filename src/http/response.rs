//! Response construction.
//!
//! # Responsibilities
//! - Build JSON responses for the client
//! - Map a raw backend reply onto a status code and JSON body
//!
//! # Design Decisions
//! - Replies that are empty or not JSON are reported in the body with
//!   status 200; they are backend problems, not relay faults
//! - A reply that is not UTF-8 is a generic server error

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

/// Body of every `GET`.
pub const SERVICE_MESSAGE: &str = "Simple HTTP service is running (try POST requests)";

pub const INVALID_CLIENT_JSON: &str = "Invalid JSON data";
pub const TCP_CONNECTION_FAILED: &str = "TCP connection failed.";
pub const TCP_COMMUNICATION_ERROR: &str = "TCP communication error";
pub const SERVER_ERROR: &str = "HTTP Server Error";
pub const NO_TCP_RESPONSE: &str = "No TCP response";
pub const INVALID_TCP_JSON: &str = "Invalid JSON from TCP";

/// How a backend reply is presented to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// The reply parsed as JSON.
    Json(Value),
    /// The backend sent nothing.
    Empty,
    /// The reply is text but not JSON.
    NotJson(String),
    /// The reply is not valid UTF-8.
    NotUtf8,
}

impl ReplyOutcome {
    /// Classify raw reply bytes.
    pub fn from_reply(reply: &[u8]) -> Self {
        if reply.is_empty() {
            return Self::Empty;
        }
        let text = match std::str::from_utf8(reply) {
            Ok(text) => text,
            Err(_) => return Self::NotUtf8,
        };
        match serde_json::from_str(text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::NotJson(text.to_string()),
        }
    }

    /// Status code and body for the client.
    pub fn into_parts(self) -> (StatusCode, Value) {
        match self {
            Self::Json(value) => (StatusCode::OK, value),
            Self::Empty => (StatusCode::OK, json!({ "warning": NO_TCP_RESPONSE })),
            Self::NotJson(raw) => (
                StatusCode::OK,
                json!({ "error": INVALID_TCP_JSON, "raw_response": raw }),
            ),
            Self::NotUtf8 => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": SERVER_ERROR }),
            ),
        }
    }
}

/// A JSON response with the given status.
pub fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// `{"error": message}` with the given status.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    json_response(status, json!({ "error": message }))
}

/// Response for a handler that panicked.
pub fn panic_response(_err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("HTTP handler panicked");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR)
}
