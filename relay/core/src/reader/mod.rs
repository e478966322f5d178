//! Stream Reader
//!
//! Turns a response body into decoded [`StreamEvent`]s while enforcing two
//! liveness checks:
//!
//! - **token**: the [`StreamToken`] the read started with is still current
//! - **conversation**: the active conversation is still the one being read
//!   (only when `cancel_on_conversation_switch` is set)
//!
//! Liveness is checked after every wait for bytes and again right before
//! each event is handed over. The first failed check cancels the body and
//! ends the read without calling `on_done` or `on_error`.
//!
//! ```text
//!   body.next_chunk().await ──► live? ──no──► body.cancel() ─► Cancelled
//!            │                    │yes
//!            │                    ▼
//!            │              FrameDecoder::push
//!            │                    │ for each frame
//!            │                    ▼
//!            │         parse ──err──► warn, skip
//!            │                    │ok
//!            │                    ▼
//!            │              live? ──no──► body.cancel() ─► Cancelled
//!            │                    │yes
//!            │                    ▼
//!            │            handler.on_event(event)
//!            ▼
//!   end of body ─► trailing frame ─► live? ─► handler.on_done() ─► Completed
//! ```

mod body;
mod frame;

use std::sync::Arc;

use thiserror::Error;

pub use body::{ByteStream, ResponseBody};
pub use frame::{parse_frame, FrameDecoder, FrameError};

use crate::config::ReaderConfig;
use crate::conversation::{ActiveConversation, ConversationId};
use crate::events::StreamEvent;
use crate::token::StreamToken;

// ============================================================================
// Errors and outcomes
// ============================================================================

/// Failure of the underlying byte source
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP-level failure while reading the body
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O failure while reading the body
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other interruption reported by the source
    #[error("stream interrupted: {0}")]
    Interrupted(String),
}

/// How a read ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The body ended and `on_done` was called
    Completed,
    /// The body failed and `on_error` was called
    Failed,
    /// Liveness was lost; the body was cancelled and no terminal callback ran
    Cancelled,
}

// ============================================================================
// Handlers
// ============================================================================

/// Receives what a live read produces
pub trait ReaderHandler: Send {
    /// A decoded event
    fn on_event(&mut self, event: StreamEvent);

    /// The body ended normally
    fn on_done(&mut self);

    /// The body failed while the read was still live
    fn on_error(&mut self, error: TransportError);
}

/// [`ReaderHandler`] built from three closures
pub struct ReaderCallbacks<E, D, F> {
    /// Called for each event
    pub on_event: E,
    /// Called once at the end of the body
    pub on_done: D,
    /// Called once on transport failure
    pub on_error: F,
}

impl<E, D, F> ReaderHandler for ReaderCallbacks<E, D, F>
where
    E: FnMut(StreamEvent) + Send,
    D: FnMut() + Send,
    F: FnMut(TransportError) + Send,
{
    fn on_event(&mut self, event: StreamEvent) {
        (self.on_event)(event);
    }

    fn on_done(&mut self) {
        (self.on_done)();
    }

    fn on_error(&mut self, error: TransportError) {
        (self.on_error)(error);
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Cancellable reader of event streams
#[derive(Clone)]
pub struct StreamReader {
    active: Arc<dyn ActiveConversation>,
    config: ReaderConfig,
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StreamReader {
    /// Reader with the default configuration
    pub fn new(active: Arc<dyn ActiveConversation>) -> Self {
        Self::with_config(active, ReaderConfig::default())
    }

    /// Reader with an explicit configuration
    pub fn with_config(active: Arc<dyn ActiveConversation>, config: ReaderConfig) -> Self {
        Self { active, config }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Whether a read for `conversation_id` started with `token` may continue
    #[must_use]
    pub fn is_live(&self, token: &StreamToken, conversation_id: &ConversationId) -> bool {
        if !token.is_live() {
            return false;
        }
        if !self.config.cancel_on_conversation_switch {
            return true;
        }
        self.active.active_conversation().as_ref() == Some(conversation_id)
    }

    /// Read `body` to the end or until liveness is lost
    ///
    /// Frames that fail to decode are logged and skipped. A transport failure
    /// is reported to `handler` only while the read is live.
    pub async fn process<B, H>(
        &self,
        mut body: B,
        handler: &mut H,
        token: StreamToken,
        conversation_id: &ConversationId,
    ) -> ReadOutcome
    where
        B: ResponseBody,
        H: ReaderHandler + ?Sized,
    {
        let mut decoder = FrameDecoder::new();
        let mut delivered = 0usize;

        tracing::debug!(
            conversation_id = %conversation_id,
            token = token.value(),
            "Stream read started"
        );

        loop {
            let next = body.next_chunk().await;
            if !self.is_live(&token, conversation_id) {
                return cancel(&mut body, conversation_id, &token, delivered).await;
            }

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(error)) => {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        error = %error,
                        "Stream transport failed"
                    );
                    handler.on_error(error);
                    return ReadOutcome::Failed;
                }
                None => break,
            };

            for payload in decoder.push(chunk.as_ref()) {
                let Some(event) = decode(&payload, conversation_id) else {
                    continue;
                };
                if !self.is_live(&token, conversation_id) {
                    return cancel(&mut body, conversation_id, &token, delivered).await;
                }
                handler.on_event(event);
                delivered += 1;
            }
        }

        if let Some(payload) = decoder.finish() {
            if let Some(event) = decode(&payload, conversation_id) {
                if !self.is_live(&token, conversation_id) {
                    return cancel(&mut body, conversation_id, &token, delivered).await;
                }
                handler.on_event(event);
                delivered += 1;
            }
        }

        if !self.is_live(&token, conversation_id) {
            return cancel(&mut body, conversation_id, &token, delivered).await;
        }

        tracing::debug!(
            conversation_id = %conversation_id,
            events = delivered,
            "Stream read complete"
        );
        handler.on_done();
        ReadOutcome::Completed
    }
}

fn decode(payload: &str, conversation_id: &ConversationId) -> Option<StreamEvent> {
    match parse_frame(payload) {
        Ok(event) => Some(event),
        Err(error) => {
            tracing::warn!(
                conversation_id = %conversation_id,
                error = %error,
                "Skipping malformed frame"
            );
            None
        }
    }
}

async fn cancel<B: ResponseBody>(
    body: &mut B,
    conversation_id: &ConversationId,
    token: &StreamToken,
    delivered: usize,
) -> ReadOutcome {
    body.cancel().await;
    tracing::debug!(
        conversation_id = %conversation_id,
        token = token.value(),
        events = delivered,
        "Stream superseded, read cancelled"
    );
    ReadOutcome::Cancelled
}
