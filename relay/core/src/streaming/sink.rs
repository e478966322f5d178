//! Registry sink
//!
//! The reader handler used when a read feeds a [`StreamRegistry`] directly.

use super::registry::StreamRegistry;
use crate::conversation::ConversationId;
use crate::events::StreamEvent;
use crate::reader::{ReaderHandler, TransportError};

/// Forwards reader output for one conversation into a registry
///
/// Events go to `handle_event`, the end of the body to `end`. A transport
/// failure is recorded as the stream's error before the stream is ended.
#[derive(Clone, Debug)]
pub struct RegistrySink {
    registry: StreamRegistry,
    conversation_id: ConversationId,
}

impl RegistrySink {
    /// Sink for `conversation_id`
    pub fn new(registry: StreamRegistry, conversation_id: ConversationId) -> Self {
        Self {
            registry,
            conversation_id,
        }
    }

    /// Conversation this sink writes to
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }
}

impl ReaderHandler for RegistrySink {
    fn on_event(&mut self, event: StreamEvent) {
        self.registry.handle_event(&self.conversation_id, &event);
    }

    fn on_done(&mut self) {
        self.registry.end(&self.conversation_id);
    }

    fn on_error(&mut self, error: TransportError) {
        let event = StreamEvent::Error {
            content: error.to_string(),
        };
        self.registry.handle_event(&self.conversation_id, &event);
        self.registry.end(&self.conversation_id);
    }
}
