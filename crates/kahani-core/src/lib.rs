pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod sse;
pub mod state;

// Re-export main types for convenience
pub use client::BackendClient;
pub use config::Config;
pub use controller::{
    consume_stream, drive_generation, localized_failure, ChatController, ChatUpdate,
    GenerationPhase, PendingGeneration, StreamEnd,
};
pub use error::GenerateError;
pub use sse::{parse_line, LineBuffer, SseLine};
pub use state::{ChatMessage, ChatRole, Conversation, GenerateRequest, MessageId};
