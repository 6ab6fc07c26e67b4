//! Pass-through relay in front of the story generation backend.
//!
//! `POST /generate` forwards the request body untouched and pipes the
//! backend's SSE response straight back. `GET /generate` and `GET /health`
//! relay the backend health check.

pub mod error;
pub mod handlers;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::RelayError;

/// Shared per-process relay state. Cloned into every request.
#[derive(Clone)]
pub struct RelayState {
    pub client: reqwest::Client,
    pub backend_url: String,
}

impl RelayState {
    pub fn new(backend_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            backend_url: backend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.backend_url, path)
    }
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/generate", get(handlers::health).post(handlers::generate))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
