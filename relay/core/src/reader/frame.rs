//! Frame decoding
//!
//! Splits the response body into lines and keeps the ones of the form
//! `data: <json>`. Splitting happens on raw bytes, so a line (or a UTF-8
//! sequence) cut in half by the transport is reassembled from the carried-over
//! remainder on the next push.

use thiserror::Error;

use crate::events::StreamEvent;

const DATA_PREFIX: &[u8] = b"data:";

/// A frame payload that did not decode into an event
#[derive(Debug, Error)]
#[error("malformed frame: {source}")]
pub struct FrameError {
    /// Underlying JSON error
    #[from]
    pub source: serde_json::Error,
}

/// Incremental newline framing with carry-over
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched; it holds no newline
    scanned: usize,
}

impl FrameDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every complete frame payload it finished
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + offset;
            if let Some(payload) = frame_payload(&self.buffer[consumed..end]) {
                frames.push(payload);
            }
            consumed = end + 1;
            search_from = consumed;
        }
        self.buffer.drain(..consumed);
        self.scanned = self.buffer.len();
        frames
    }

    /// Bytes held back waiting for a newline
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Take the trailing partial line, if it is a frame
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        frame_payload(&rest)
    }
}

/// Payload of a `data:` line, or `None` for blank and other lines
fn frame_payload(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(b" ").unwrap_or(payload);
    if payload.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(String::from_utf8_lossy(payload).into_owned())
}

/// Decode one frame payload
pub fn parse_frame(payload: &str) -> Result<StreamEvent, FrameError> {
    Ok(serde_json::from_str(payload)?)
}
