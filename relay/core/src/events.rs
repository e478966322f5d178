//! Wire Events
//!
//! Every meaningful frame of the push stream is `data: ` followed by a JSON
//! object with a string `type` discriminant. [`StreamEvent`] is the closed set
//! of those objects; a frame whose `type` is not listed here fails to decode
//! and is skipped by the reader like any other malformed frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded frame of the response stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Server-assigned identifier of the message being streamed
    MessageId {
        /// Message identifier
        id: String,
        /// Ordinal sent by some producers; the registry keeps the position
        /// given to `start`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<u32>,
    },
    /// Agent session identifier (for resuming)
    SessionId {
        /// Session identifier
        session_id: String,
    },
    /// A fragment of extended thinking
    Thinking {
        /// Thinking fragment
        content: String,
    },
    /// A fragment of response text
    Text {
        /// Text fragment
        content: String,
    },
    /// A tool invocation
    ToolUse {
        /// Tool-use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input
        #[serde(default)]
        input: Value,
    },
    /// The result of a tool invocation
    ToolResult {
        /// Identifier of the invocation this answers
        tool_use_id: String,
        /// Result payload
        #[serde(default)]
        content: Value,
        /// Whether the tool reported failure
        #[serde(default)]
        is_error: bool,
    },
    /// Embedded rich content
    SurfaceContent {
        /// Surface identifier
        content_id: String,
        /// `html` or `markdown`
        #[serde(default = "default_surface_type")]
        content_type: String,
        /// Optional display title
        #[serde(default)]
        title: Option<String>,
        /// Inline content
        #[serde(default)]
        content: Option<String>,
        /// Stored file reference
        #[serde(default)]
        filename: Option<String>,
    },
    /// A web search began
    WebSearchStart {
        /// Search tool-use identifier
        id: String,
        /// Tool name
        #[serde(default = "default_search_name")]
        name: String,
    },
    /// The query of a web search became known
    WebSearchQuery {
        /// Search tool-use identifier
        #[serde(default)]
        id: Option<String>,
        /// Full query
        #[serde(default)]
        query: Option<String>,
        /// Query as streamed by the model
        #[serde(default)]
        partial_query: Option<String>,
    },
    /// Results of a web search arrived
    WebSearchResult {
        /// Search tool-use identifier
        tool_use_id: String,
        /// Result entries
        #[serde(default)]
        results: Vec<Value>,
    },
    /// The producer reported an error
    Error {
        /// Error description
        #[serde(default)]
        content: String,
    },
    /// The user stopped the stream
    Stopped {
        /// Stop notice
        #[serde(default)]
        content: Option<String>,
    },
    /// The producer finished
    Done {
        /// Unused trailer
        #[serde(default)]
        content: Option<String>,
    },
}

fn default_surface_type() -> String {
    "html".to_string()
}

fn default_search_name() -> String {
    "web_search".to_string()
}

impl StreamEvent {
    /// Wire value of the `type` discriminant
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageId { .. } => "message_id",
            Self::SessionId { .. } => "session_id",
            Self::Thinking { .. } => "thinking",
            Self::Text { .. } => "text",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::SurfaceContent { .. } => "surface_content",
            Self::WebSearchStart { .. } => "web_search_start",
            Self::WebSearchQuery { .. } => "web_search_query",
            Self::WebSearchResult { .. } => "web_search_result",
            Self::Error { .. } => "error",
            Self::Stopped { .. } => "stopped",
            Self::Done { .. } => "done",
        }
    }

    /// Text fragment
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Thinking fragment
    pub fn thinking(content: impl Into<String>) -> Self {
        Self::Thinking {
            content: content.into(),
        }
    }

    /// Tool invocation
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Successful tool result with a string payload
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: Value::String(content.into()),
            is_error: false,
        }
    }
}

/// What a subscriber is being told about
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StreamUpdate<'a> {
    /// An event was applied to the state
    Event(&'a StreamEvent),
    /// The stream was finalized by an explicit `end`
    Complete,
}

impl StreamUpdate<'_> {
    /// Update type string handed to the display layer
    #[must_use]
    pub fn update_type(&self) -> &'static str {
        match self {
            Self::Event(event) => event.event_type(),
            Self::Complete => "complete",
        }
    }

    /// The raw event, when there is one
    #[must_use]
    pub fn event(&self) -> Option<&StreamEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Complete => None,
        }
    }
}
