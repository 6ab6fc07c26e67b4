use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure modes of the relay. Each one renders as a JSON body, never as a
/// bare connection drop.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Could not open the forward request at all
    #[error("Failed to connect to backend")]
    Connect(#[source] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("{body}")]
    Backend { status: StatusCode, body: String },

    #[error("Backend not reachable")]
    HealthUnreachable,

    #[error("Failed to build response")]
    Response(#[from] axum::http::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::Connect(_) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Failed to connect to backend" })),
            )
                .into_response(),
            RelayError::Backend { status, body } => {
                (status, Json(json!({ "error": body }))).into_response()
            }
            RelayError::HealthUnreachable => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "status": "error", "message": "Backend not reachable" })),
            )
                .into_response(),
            RelayError::Response(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to build response" })),
            )
                .into_response(),
        }
    }
}
