//! Streaming proxy HTTP server.
//!
//! A byte-transparent relay between browser/CLI clients and the backend
//! inference service. The client posts `{session_id, prompt}`; the proxy
//! forwards it to the backend query endpoint and pipes the response body
//! back **unbuffered**, chunk by chunk, so the caller sees tokens as they
//! are produced rather than one burst at completion.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Forward a query, relay the answer stream |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses carry a JSON body with a `detail` field, the same shape
//! the backend uses, so clients parse one schema regardless of where the
//! failure happened:
//!
//! ```json
//! { "detail": "backend unreachable: connection refused" }
//! ```
//!
//! A non-success backend status is **not** relayed as a stream: the proxy
//! forwards the backend's status and JSON body as a plain
//! `application/json` response. Relaying it with event-stream headers would
//! feed an error body to the client's frame parser as if it were answer
//! frames.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::query::Query;

/// Shared state passed to route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    /// Application configuration (wrapped in `Arc` for cheap cloning).
    config: Arc<Config>,
    /// Shared outbound HTTP client; reused across requests for connection
    /// pooling. No request timeout — answer streams are open-ended.
    client: reqwest::Client,
}

/// Builds the proxy router. Split out from [`run_server`] so tests can
/// serve it on an ephemeral port.
pub fn app(config: Arc<Config>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        config,
        client: reqwest::Client::new(),
    };

    Router::new()
        .route("/api/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the streaming proxy.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = app(Arc::new(config.clone()));

    println!("docchat proxy listening on http://{}", bind_addr);
    println!("forwarding queries to {}", config.backend.base_url);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Internal error type that converts into a `{"detail": ...}` response.
struct AppError {
    status: StatusCode,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.detail });
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 502 Bad Gateway error (backend unreachable).
fn bad_gateway(detail: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        detail: detail.into(),
    }
}

/// Constructs a 500 error for response assembly failures.
fn internal(detail: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: detail.into(),
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/query ============

/// Handler for `POST /api/query`.
///
/// Forwards the query to the backend and relays the answer stream. The
/// proxy performs no interpretation of the stream's contents; success
/// bodies are relayed byte-identical and incrementally via
/// [`Body::from_stream`]. If the backend cannot be reached the request
/// fails immediately with `502` — never a silently empty stream.
async fn handle_query(
    State(state): State<AppState>,
    Json(query): Json<Query>,
) -> Result<Response, AppError> {
    let url = format!(
        "{}/api/query",
        state.config.backend.base_url.trim_end_matches('/')
    );

    let upstream = state
        .client
        .post(&url)
        .json(&query)
        .send()
        .await
        .map_err(|e| bad_gateway(format!("backend unreachable: {}", e)))?;

    let status = upstream.status();
    if !status.is_success() {
        // Status gating: forward the error body as plain JSON, preserving
        // the backend's status, instead of dressing it up as a stream.
        let body = upstream.bytes().await.unwrap_or_default();
        return Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|e| internal(e.to_string()));
    }

    // Relay the body as it arrives, preserving chunk timing. The headers
    // mark the payload as an event stream, disable caching, and keep the
    // connection open for the duration of the backend response.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| internal(e.to_string()))
}
