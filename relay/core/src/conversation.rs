//! Conversation identity and the "active conversation" collaborator
//!
//! The core never owns which conversation the user is looking at. It reads
//! that value through the [`ActiveConversation`] accessor, which the
//! application injects. [`ActiveConversationCell`] is a ready-made, shareable
//! implementation for applications that do not already track it elsewhere.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Core Types
// ============================================================================

/// Identifier of a conversation
///
/// Conversation identifiers are assigned by the server, so this wraps an
/// opaque string rather than a generated value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier (for local drafts and tests)
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kind of response being streamed
///
/// Agent streams can be stopped by the user; normal chat streams cannot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Regular chat completion
    #[default]
    Normal,
    /// Agent session with tools
    Agent,
}

impl StreamKind {
    /// Whether a stream of this kind accepts a stop request
    #[must_use]
    pub fn is_stoppable(self) -> bool {
        matches!(self, Self::Agent)
    }

    /// Wire name of this kind
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Active Conversation Accessor
// ============================================================================

/// Read-only view of the conversation currently in front of the user
pub trait ActiveConversation: Send + Sync {
    /// The active conversation, if any
    fn active_conversation(&self) -> Option<ConversationId>;
}

impl<F> ActiveConversation for F
where
    F: Fn() -> Option<ConversationId> + Send + Sync,
{
    fn active_conversation(&self) -> Option<ConversationId> {
        self()
    }
}

/// Shareable, settable active-conversation slot
///
/// Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct ActiveConversationCell {
    inner: Arc<RwLock<Option<ConversationId>>>,
}

impl ActiveConversationCell {
    /// Create an empty cell (no conversation active)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cell with `id` already active
    #[must_use]
    pub fn with_active(id: ConversationId) -> Self {
        let cell = Self::new();
        cell.set(id);
        cell
    }

    /// Make `id` the active conversation
    pub fn set(&self, id: ConversationId) {
        tracing::debug!(conversation_id = %id, "Active conversation changed");
        *self.inner.write() = Some(id);
    }

    /// Clear the active conversation
    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Current value
    #[must_use]
    pub fn get(&self) -> Option<ConversationId> {
        self.inner.read().clone()
    }
}

impl ActiveConversation for ActiveConversationCell {
    fn active_conversation(&self) -> Option<ConversationId> {
        self.get()
    }
}
