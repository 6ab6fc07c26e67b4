use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use futures_util::Stream;
use tracing::{debug, error, warn};

use crate::{RelayError, RelayState};

/// Build an SSE response that streams `stream` through without buffering.
fn build_sse_response(
    stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> Result<Response<Body>, RelayError> {
    let body = Body::from_stream(stream);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no") // Disable nginx buffering if present
        .body(body)?;

    Ok(response)
}

/// `POST /generate`: forward the JSON body as-is and relay the event stream.
pub async fn generate(
    State(state): State<RelayState>,
    body: Bytes,
) -> Result<Response<Body>, RelayError> {
    let target_url = state.endpoint("/generate");
    debug!("Forwarding {} byte request to {}", body.len(), target_url);

    let response = state
        .client
        .post(&target_url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|e| {
            error!("Failed to connect to backend at {}: {:?}", target_url, e);
            RelayError::Connect(e)
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!("Backend returned status {}: {}", status, body);
        return Err(RelayError::Backend { status, body });
    }

    build_sse_response(response.bytes_stream())
}

/// `GET /health` (and `GET /generate`): relay the backend's health JSON.
pub async fn health(State(state): State<RelayState>) -> Result<impl IntoResponse, RelayError> {
    let target_url = state.endpoint("/health");

    let response = state.client.get(&target_url).send().await.map_err(|e| {
        warn!("Health check against {} failed: {}", target_url, e);
        RelayError::HealthUnreachable
    })?;

    let status = response.status();
    let payload: serde_json::Value = response.json().await.map_err(|e| {
        warn!("Backend health response was not JSON: {}", e);
        RelayError::HealthUnreachable
    })?;

    Ok((status, Json(payload)))
}
