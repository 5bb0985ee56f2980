//! HTTP server setup and request handling.
//!
//! # Responsibilities
//! - Create Axum Router with the status and relay handlers
//! - Wire up middleware (request ID, tracing, panic guard) and the body limit
//! - Serialize bridge access across concurrent requests
//! - Close the bridge before the listener on shutdown

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::bridge::TcpBridge;
use crate::config::RelayConfig;
use crate::http::request::{request_id, MakeRelayRequestId};
use crate::http::response::{
    error_response, json_response, panic_response, ReplyOutcome, INVALID_CLIENT_JSON,
    SERVICE_MESSAGE, TCP_COMMUNICATION_ERROR, TCP_CONNECTION_FAILED,
};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single backend connection. Held for a whole exchange.
    pub bridge: Arc<Mutex<TcpBridge>>,
}

/// HTTP server for the relay.
pub struct RelayServer {
    router: Router,
    config: RelayConfig,
    bridge: Arc<Mutex<TcpBridge>>,
}

impl RelayServer {
    /// Create a new server owning `bridge`.
    pub fn new(config: RelayConfig, bridge: TcpBridge) -> Self {
        let bridge = Arc::new(Mutex::new(bridge));
        let state = AppState {
            bridge: bridge.clone(),
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            bridge,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(status_handler).post(relay_handler))
            .route("/{*path}", get(status_handler).post(relay_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.listener.max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRelayRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(CatchPanicLayer::custom(panic_response)),
            )
    }

    /// Shared handle to the bridge.
    pub fn bridge(&self) -> Arc<Mutex<TcpBridge>> {
        self.bridge.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// On shutdown the bridge is shut down first (after any in-flight exchange
    /// releases it), then the listener stops accepting and open requests drain.
    /// Requests that reach the bridge after that get 500 without reconnecting.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.address(),
            "HTTP server started"
        );

        let bridge = self.bridge.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutting down server");
                bridge.lock().await.shutdown().await;
            })
            .await?;

        self.bridge.lock().await.shutdown().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// `GET`: fixed informational payload, independent of bridge state.
async fn status_handler(headers: HeaderMap) -> Response {
    let start_time = Instant::now();
    tracing::info!(request_id = %request_id(&headers), "GET request served");
    metrics::record_request("GET", StatusCode::OK.as_u16(), start_time);
    json_response(StatusCode::OK, json!({ "message": SERVICE_MESSAGE }))
}

/// `POST`: forward the JSON body to the backend and return its reply.
async fn relay_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers).to_string();

    let response = match body {
        Ok(body) => relay(&state, &request_id, &body).await,
        Err(rejection) => {
            tracing::warn!(request_id = %request_id, error = %rejection, "Failed to read request body");
            error_response(rejection.status(), &rejection.body_text())
        }
    };

    metrics::record_request("POST", response.status().as_u16(), start_time);
    tracing::info!(
        request_id = %request_id,
        status = response.status().as_u16(),
        "POST response sent"
    );
    response
}

async fn relay(state: &AppState, request_id: &str, body: &[u8]) -> Response {
    let message: Value = match serde_json::from_slice(body) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Invalid JSON from client");
            return error_response(StatusCode::BAD_REQUEST, INVALID_CLIENT_JSON);
        }
    };

    let exchange = {
        let mut bridge = state.bridge.lock().await;
        match bridge.ensure_connected().await {
            Ok(()) => {
                tracing::debug!(request_id = %request_id, backend = %bridge.address(), "Forwarding to TCP backend");
                bridge.forward(&message).await
            }
            Err(e) => Err(e),
        }
    };

    let reply = match exchange {
        Ok(reply) => reply,
        Err(e) if e.is_establish_failure() => {
            tracing::error!(request_id = %request_id, error = %e, "TCP connection failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, TCP_CONNECTION_FAILED);
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "TCP communication error");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, TCP_COMMUNICATION_ERROR);
        }
    };

    let outcome = ReplyOutcome::from_reply(&reply);
    match &outcome {
        ReplyOutcome::Empty => {
            tracing::warn!(request_id = %request_id, "No TCP response")
        }
        ReplyOutcome::NotJson(_) => {
            tracing::error!(request_id = %request_id, "Invalid JSON from TCP server")
        }
        ReplyOutcome::NotUtf8 => {
            tracing::error!(request_id = %request_id, "TCP reply is not UTF-8")
        }
        ReplyOutcome::Json(_) => {}
    }

    let (status, body) = outcome.into_parts();
    json_response(status, body)
}
