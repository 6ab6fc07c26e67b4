use thiserror::Error;

/// Everything that can end a generation before the stream completes normally.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("could not reach backend: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("error while reading stream: {0}")]
    Read(String),

    #[error("stream idle for {0}s")]
    IdleTimeout(u64),
}
