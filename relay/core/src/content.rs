//! Content Blocks
//!
//! Finalized units of assembled output. Blocks serialize with the same
//! `type`-tagged shape the server stores, so a projection can be persisted or
//! sent to a renderer unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A finalized unit of assembled output
///
/// `StreamState::content_blocks` never holds [`ContentBlock::ToolResult`];
/// results live in `tool_results` and only appear in a projection, right
/// after the `tool_use` they answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Response text
    Text {
        /// Accumulated text
        text: String,
    },
    /// Extended thinking
    Thinking {
        /// Accumulated thinking content
        content: String,
    },
    /// A tool invocation
    ToolUse {
        /// Tool-use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input as sent by the model
        #[serde(default)]
        input: Value,
    },
    /// The result of a tool invocation (projection only)
    ToolResult {
        /// Identifier of the `tool_use` this answers
        tool_use_id: String,
        /// Result payload
        #[serde(default)]
        content: Value,
        /// Whether the tool reported failure
        #[serde(default)]
        is_error: bool,
    },
    /// Embedded rich content (HTML or markdown surface)
    SurfaceContent {
        /// Surface identifier
        content_id: String,
        /// `html` or `markdown`
        content_type: String,
        /// Optional display title
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Inline content, when not stored as a file
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        /// Stored file reference, when not inline
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    /// A server-side web search
    ///
    /// The only block that changes after it is appended: the query and the
    /// results arrive as later events.
    WebSearch {
        /// Search tool-use identifier
        id: String,
        /// Tool name
        name: String,
        /// Search query (empty until known)
        query: String,
        /// Search results (empty until known)
        results: Vec<Value>,
    },
}

impl ContentBlock {
    /// Wire name of the block type
    #[must_use]
    pub fn block_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::SurfaceContent { .. } => "surface_content",
            Self::WebSearch { .. } => "web_search",
        }
    }

    /// Whether this is a plain text block
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }
}

/// Stored outcome of a tool invocation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Result payload
    pub content: Value,
    /// Whether the tool reported failure
    pub is_error: bool,
}

/// Message content in its persisted shape
///
/// A lone text block collapses to a plain string; anything richer stays a
/// list of blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text
    Text(String),
    /// Ordered content blocks
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Collapse finalized blocks into the persisted shape
    #[must_use]
    pub fn from_blocks(mut blocks: Vec<ContentBlock>) -> Self {
        if blocks.len() > 1 || has_special_blocks(&blocks) {
            return Self::Blocks(blocks);
        }
        match blocks.pop() {
            Some(ContentBlock::Text { text }) => Self::Text(text),
            Some(other) => Self::Blocks(vec![other]),
            None => Self::Text(String::new()),
        }
    }
}

/// Plain text of every text block, joined by newlines
#[must_use]
pub fn extract_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether any block is something other than plain text
#[must_use]
pub fn has_special_blocks(blocks: &[ContentBlock]) -> bool {
    blocks.iter().any(|block| !block.is_text())
}
