//! Chat controller: owns the conversation and turns a streamed generation
//! into per-token message updates.
//!
//! The network side runs in [`drive_generation`] on its own task and reports
//! back through an mpsc channel of [`ChatUpdate`]s. The UI drains that
//! channel and feeds each update to [`ChatController::apply`], so every state
//! mutation happens in one place, in arrival order.

use std::fmt::Display;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::client::BackendClient;
use crate::error::GenerateError;
use crate::sse::{parse_line, LineBuffer, SseLine};
use crate::state::{
    clamp_max_length, ChatMessage, ChatRole, Conversation, GenerateRequest, MessageId,
    DEFAULT_MAX_LENGTH, MAX_LENGTH_STEP,
};

/// Lifecycle of the most recent generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

/// Messages from the generation task to whoever owns the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    /// Backend accepted the request and the body is being read
    Streaming { id: MessageId },
    Token { id: MessageId, text: String },
    /// `error` field inside a data event
    BackendError { id: MessageId, message: String },
    /// Connection, status or read failure
    Failed { id: MessageId, reason: String },
    /// Always the last update for a generation
    Finished { id: MessageId },
}

/// A submission that has been recorded in the conversation but not yet sent
#[derive(Debug, Clone)]
pub struct PendingGeneration {
    pub message_id: MessageId,
    pub request: GenerateRequest,
}

/// How the read loop ended when no error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Saw `event: done`; the rest of the body was not read
    DoneEvent,
    /// The body ran out
    Closed,
}

/// User-facing text shown in place of a reply that failed
pub fn localized_failure(reason: &str) -> String {
    format!("معذرت، کہانی نہیں بن سکی۔ خرابی: {}", reason)
}

pub struct ChatController {
    conversation: Conversation,
    phase: GenerationPhase,
    in_flight: Option<MessageId>,
    max_length: u32,
    idle_timeout: Option<Duration>,
}

impl Default for ChatController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl ChatController {
    pub fn new(max_length: u32) -> Self {
        Self {
            conversation: Conversation::new(),
            phase: GenerationPhase::Idle,
            in_flight: None,
            max_length: clamp_max_length(max_length),
            idle_timeout: None,
        }
    }

    /// Fail a generation when no bytes arrive for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<&MessageId> {
        self.in_flight.as_ref()
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    pub fn max_length(&self) -> u32 {
        self.max_length
    }

    pub fn set_max_length(&mut self, value: u32) {
        self.max_length = clamp_max_length(value);
    }

    pub fn increase_max_length(&mut self) {
        self.set_max_length(self.max_length.saturating_add(MAX_LENGTH_STEP));
    }

    pub fn decrease_max_length(&mut self) {
        self.set_max_length(self.max_length.saturating_sub(MAX_LENGTH_STEP));
    }

    /// Record a user submission and its empty reply placeholder.
    ///
    /// Returns `None` without touching any state when the prefix is blank or
    /// another generation is still in flight.
    pub fn submit(&mut self, prefix: &str) -> Option<PendingGeneration> {
        let prefix = prefix.trim();
        if prefix.is_empty() || self.in_flight.is_some() {
            return None;
        }

        let reply = ChatMessage::assistant_placeholder();
        let message_id = reply.id.clone();

        self.conversation.push(ChatMessage::user(prefix));
        self.conversation.push(reply);
        self.in_flight = Some(message_id.clone());
        self.phase = GenerationPhase::Sending;

        Some(PendingGeneration {
            message_id,
            request: GenerateRequest::new(prefix, self.max_length),
        })
    }

    /// Apply one update from the generation task. Updates for anything other
    /// than the in-flight message (e.g. after a cancel) are dropped.
    pub fn apply(&mut self, update: ChatUpdate) {
        let target = match &update {
            ChatUpdate::Streaming { id }
            | ChatUpdate::Token { id, .. }
            | ChatUpdate::BackendError { id, .. }
            | ChatUpdate::Failed { id, .. }
            | ChatUpdate::Finished { id } => id,
        };
        if self.in_flight.as_ref() != Some(target) {
            tracing::debug!("Dropping update for inactive message {}", target);
            return;
        }

        match update {
            ChatUpdate::Streaming { .. } => {
                self.phase = GenerationPhase::Streaming;
            }
            ChatUpdate::Token { id, text } => {
                self.conversation.update(&id, |mut msg| {
                    msg.content.push_str(&text);
                    msg
                });
            }
            ChatUpdate::BackendError { id, message } => {
                self.conversation.update(&id, |msg| ChatMessage {
                    role: ChatRole::Error,
                    content: message,
                    ..msg
                });
            }
            ChatUpdate::Failed { id, reason } => {
                self.conversation.update(&id, |msg| ChatMessage {
                    role: ChatRole::Error,
                    content: localized_failure(&reason),
                    ..msg
                });
                self.phase = GenerationPhase::Failed;
            }
            ChatUpdate::Finished { id } => {
                let errored = self
                    .conversation
                    .get(&id)
                    .is_some_and(|m| m.role == ChatRole::Error);
                self.phase = if errored {
                    GenerationPhase::Failed
                } else {
                    GenerationPhase::Completed
                };
                self.in_flight = None;
            }
        }
    }

    /// Stop waiting on the current generation. Partial content is kept.
    /// The caller is responsible for aborting the task that feeds updates.
    pub fn cancel(&mut self) -> Option<MessageId> {
        let id = self.in_flight.take()?;
        self.phase = GenerationPhase::Cancelled;
        Some(id)
    }

    /// Submit, stream and apply a whole generation inline.
    pub async fn run(&mut self, client: &BackendClient, prefix: &str) -> Option<MessageId> {
        self.run_with(client, prefix, |_| {}).await
    }

    /// Like [`ChatController::run`], calling `observe` with each update
    /// before it is applied.
    pub async fn run_with<F>(
        &mut self,
        client: &BackendClient,
        prefix: &str,
        mut observe: F,
    ) -> Option<MessageId>
    where
        F: FnMut(&ChatUpdate),
    {
        let pending = self.submit(prefix)?;
        let id = pending.message_id.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let generation = drive_generation(client.clone(), pending, tx, self.idle_timeout);
        let apply_updates = async {
            while let Some(update) = rx.recv().await {
                observe(&update);
                self.apply(update);
            }
        };
        tokio::join!(generation, apply_updates);

        Some(id)
    }
}

/// Send the request, read the stream and report everything through `tx`.
/// Ends with [`ChatUpdate::Finished`] whatever happens.
pub async fn drive_generation(
    client: BackendClient,
    pending: PendingGeneration,
    tx: mpsc::UnboundedSender<ChatUpdate>,
    idle_timeout: Option<Duration>,
) {
    let id = pending.message_id;

    let result: Result<StreamEnd, GenerateError> = async {
        tracing::info!(
            "Requesting {} tokens from {}",
            pending.request.max_length,
            client.base_url()
        );
        // A backend that accepts the connection but never answers counts as idle too
        let stream = match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, client.generate(&pending.request))
                .await
                .map_err(|_| GenerateError::IdleTimeout(limit.as_secs()))??,
            None => client.generate(&pending.request).await?,
        };
        let _ = tx.send(ChatUpdate::Streaming { id: id.clone() });
        consume_stream(stream, &id, &tx, idle_timeout).await
    }
    .await;

    match result {
        Ok(end) => tracing::info!("Generation {} finished: {:?}", id, end),
        Err(e) => {
            tracing::warn!("Generation {} failed: {}", id, e);
            let _ = tx.send(ChatUpdate::Failed {
                id: id.clone(),
                reason: e.to_string(),
            });
        }
    }

    let _ = tx.send(ChatUpdate::Finished { id });
}

/// Read an SSE byte stream to the end (or to `event: done`), sending a
/// [`ChatUpdate`] for every token or error event.
pub async fn consume_stream<S, B, E>(
    stream: S,
    id: &MessageId,
    tx: &mpsc::UnboundedSender<ChatUpdate>,
    idle_timeout: Option<Duration>,
) -> Result<StreamEnd, GenerateError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut buffer = LineBuffer::new();
    tokio::pin!(stream);

    loop {
        let next = match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| GenerateError::IdleTimeout(limit.as_secs()))?,
            None => stream.next().await,
        };

        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|e| GenerateError::Read(e.to_string()))?;

        for line in buffer.push(chunk.as_ref()) {
            if dispatch_line(&line, id, tx) {
                return Ok(StreamEnd::DoneEvent);
            }
        }
    }

    if let Some(line) = buffer.finish() {
        if dispatch_line(&line, id, tx) {
            return Ok(StreamEnd::DoneEvent);
        }
    }

    Ok(StreamEnd::Closed)
}

/// Returns true when the line terminates the stream.
fn dispatch_line(line: &str, id: &MessageId, tx: &mpsc::UnboundedSender<ChatUpdate>) -> bool {
    match parse_line(line) {
        SseLine::Token(text) => {
            let _ = tx.send(ChatUpdate::Token { id: id.clone(), text });
            false
        }
        SseLine::Error(message) => {
            let _ = tx.send(ChatUpdate::BackendError { id: id.clone(), message });
            false
        }
        SseLine::Done => true,
        SseLine::Ignored => false,
    }
}
