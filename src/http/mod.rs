//! HTTP front subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection from client
//!     → server.rs (Axum setup, middleware, handlers)
//!     → request.rs (request ID)
//!     → bridge (POST only, under the bridge lock)
//!     → response.rs (map reply to status + JSON)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, MakeRelayRequestId, X_REQUEST_ID};
pub use response::{ReplyOutcome, SERVICE_MESSAGE};
pub use server::{AppState, RelayServer};
