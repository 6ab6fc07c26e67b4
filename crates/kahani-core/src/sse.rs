//! Line-buffered decoding of the backend's server-sent event stream.
//!
//! Network chunks do not line up with SSE lines, so bytes are carried over in a
//! [`LineBuffer`] until a newline arrives. Each complete line is then
//! classified by [`parse_line`]. Decoding is best-effort: a malformed data
//! payload is dropped and the stream carries on.

use serde::Deserialize;

const DATA_PREFIX: &str = "data:";
const DONE_EVENT: &str = "event: done";

/// Carry-over buffer that turns arbitrary byte chunks into complete lines.
///
/// Buffering happens on raw bytes, so a multi-byte UTF-8 character split
/// across two chunks is reassembled before it is decoded.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed. The trailing
    /// partial line stays buffered for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&raw[..raw.len() - 1]));
        }
        lines
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// What a single SSE line means to the chat controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Text to append to the in-progress message
    Token(String),
    /// Backend-signalled application error
    Error(String),
    /// `event: done` terminator
    Done,
    /// Blank lines, comments, other fields, empty or undecodable payloads
    Ignored,
}

#[derive(Deserialize)]
struct EventPayload {
    token: Option<String>,
    error: Option<String>,
}

/// Classify one line of the stream.
pub fn parse_line(line: &str) -> SseLine {
    if line.trim() == DONE_EVENT {
        return SseLine::Done;
    }

    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Ignored;
    };

    let payload = rest.trim();
    if payload.is_empty() || payload == "{}" {
        return SseLine::Ignored;
    }

    match serde_json::from_str::<EventPayload>(payload) {
        Ok(EventPayload { error: Some(error), .. }) => SseLine::Error(error),
        Ok(EventPayload { token: Some(token), .. }) => SseLine::Token(token),
        Ok(_) => SseLine::Ignored,
        Err(e) => {
            tracing::debug!("Discarding undecodable data line {:?}: {}", payload, e);
            SseLine::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_line_is_carried_over() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"data: {\"tok").is_empty());
        let lines = buf.push(b"en\":\"x\"}\ndata: ");
        assert_eq!(lines, vec!["data: {\"token\":\"x\"}".to_string()]);
        assert_eq!(buf.finish().as_deref(), Some("data: "));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"event: token\r\ndata: {}\r\n\r\n");
        assert_eq!(lines, vec!["event: token", "data: {}", ""]);
    }

    #[test]
    fn test_split_multibyte_character() {
        let text = "data: {\"token\":\"کہانی\"}\n";
        let bytes = text.as_bytes();
        // Split inside the first Urdu character
        let cut = text.find('ک').unwrap() + 1;

        let mut buf = LineBuffer::new();
        assert!(buf.push(&bytes[..cut]).is_empty());
        let lines = buf.push(&bytes[cut..]);
        assert_eq!(parse_line(&lines[0]), SseLine::Token("کہانی".to_string()));
    }

    #[test]
    fn test_token_line() {
        assert_eq!(
            parse_line("data: {\"token\": \" بادشاہ\"}"),
            SseLine::Token(" بادشاہ".to_string())
        );
        // No space after the colon
        assert_eq!(parse_line("data:{\"token\":\"y\"}"), SseLine::Token("y".to_string()));
    }

    #[test]
    fn test_error_line() {
        assert_eq!(
            parse_line("data: {\"error\":\"boom\"}"),
            SseLine::Error("boom".to_string())
        );
        assert_eq!(
            parse_line("data: {\"token\":\"a\",\"error\":\"boom\"}"),
            SseLine::Error("boom".to_string())
        );
    }

    #[test]
    fn test_empty_payloads_are_ignored() {
        assert_eq!(parse_line("data:"), SseLine::Ignored);
        assert_eq!(parse_line("data:   "), SseLine::Ignored);
        assert_eq!(parse_line("data: {}"), SseLine::Ignored);
    }

    #[test]
    fn test_malformed_payload_is_ignored() {
        assert_eq!(parse_line("data: {not json"), SseLine::Ignored);
        assert_eq!(parse_line("data: [1, 2]"), SseLine::Ignored);
        assert_eq!(parse_line("data: {\"token\": 5}"), SseLine::Ignored);
    }

    #[test]
    fn test_done_event() {
        assert_eq!(parse_line("event: done"), SseLine::Done);
        assert_eq!(parse_line("event: done  "), SseLine::Done);
    }

    #[test]
    fn test_other_lines_are_ignored() {
        for line in ["", "event: token", ": keep-alive", "id: 4", "retry: 100"] {
            assert_eq!(parse_line(line), SseLine::Ignored, "line {:?}", line);
        }
    }
}
