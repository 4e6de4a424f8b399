//! Liveness endpoint.

use axum::http::StatusCode;

/// `GET /health`: 200 with body `OK` while the process is serving requests.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
