use std::time::Duration;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures_util::Stream;
use reqwest::Client;

use crate::error::GenerateError;
use crate::state::GenerateRequest;

/// HTTP client for the story generation backend (or the relay in front of it).
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Like [`BackendClient::new`] but gives up on connecting after `timeout`.
    pub fn with_connect_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a generation and hand back the raw SSE byte stream.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static, GenerateError> {
        let url = format!("{}/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(GenerateError::Connect)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Status { status, body });
        }

        Ok(response.bytes_stream())
    }

    /// Query the backend's health endpoint.
    pub async fn health(&self) -> Result<serde_json::Value> {
        let url = format!("{}/health", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Health check failed with status: {}", response.status()));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = BackendClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
