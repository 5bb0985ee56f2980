//! TCP bridge subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP POST body (validated JSON)
//!     → connection.rs (ensure connected, optional login)
//!     → framing.rs (encode as JSON line, write)
//!     → Backend
//!     → framing.rs (short-read framed reply)
//!     → HTTP response
//! ```
//!
//! # Design Decisions
//! - One long-lived connection per process, owned by the HTTP server state
//! - One exchange at a time; no pipelining
//! - Failures close the connection; nothing is retried

pub mod connection;
pub mod error;
pub mod framing;

pub use connection::{Credentials, TcpBridge};
pub use error::BridgeError;
pub use framing::{encode_message, read_frame, Frame};
