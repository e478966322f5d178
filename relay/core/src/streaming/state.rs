//! Stream State
//!
//! The per-conversation accumulation state and the event-driven state machine
//! that assembles [`ContentBlock`]s from an interleaved event stream.
//!
//! Text and thinking arrive as fragments and are buffered until something of a
//! different kind shows up; at that point the buffer is flushed into a block.
//! At most one of the two buffers is non-empty at any time.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::content::{ContentBlock, MessageContent, ToolResult};
use crate::conversation::{ConversationId, StreamKind};
use crate::events::StreamEvent;

/// Accumulated state of one streamed message
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StreamState {
    /// Conversation this stream belongs to
    pub conversation_id: ConversationId,
    /// Server-assigned message identifier, once known
    pub message_id: Option<String>,
    /// Agent session identifier, once known
    pub session_id: Option<String>,
    /// Ordinal of this message within the conversation
    pub position: u32,
    /// Normal chat or agent
    pub kind: StreamKind,
    /// Finalized blocks in rendering order
    pub content_blocks: Vec<ContentBlock>,
    /// Text not yet flushed into a block
    pub current_text: String,
    /// Thinking not yet flushed into a block
    pub current_thinking: String,
    /// Tool results keyed by tool-use id
    pub tool_results: HashMap<String, ToolResult>,
    /// Whether the stream has finished (never resets)
    pub is_complete: bool,
    /// Last error reported by the producer
    pub error: Option<String>,
}

impl StreamState {
    /// Fresh, empty state
    #[must_use]
    pub fn new(conversation_id: ConversationId, kind: StreamKind, position: u32) -> Self {
        Self {
            conversation_id,
            message_id: None,
            session_id: None,
            position,
            kind,
            content_blocks: Vec::new(),
            current_text: String::new(),
            current_thinking: String::new(),
            tool_results: HashMap::new(),
            is_complete: false,
            error: None,
        }
    }

    /// True until the stream completes
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_complete
    }

    /// Apply one event
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::MessageId { id, .. } => {
                self.message_id = Some(id.clone());
            }
            StreamEvent::SessionId { session_id } => {
                self.session_id = Some(session_id.clone());
            }
            StreamEvent::Thinking { content } => {
                self.flush_text();
                self.current_thinking.push_str(content);
            }
            StreamEvent::Text { content } => {
                self.flush_thinking();
                self.current_text.push_str(content);
            }
            StreamEvent::ToolUse { id, name, input } => {
                self.flush_buffers();
                self.content_blocks.push(ContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                });
            }
            StreamEvent::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                self.tool_results.insert(
                    tool_use_id.clone(),
                    ToolResult {
                        content: content.clone(),
                        is_error: *is_error,
                    },
                );
            }
            StreamEvent::SurfaceContent {
                content_id,
                content_type,
                title,
                content,
                filename,
            } => {
                self.flush_buffers();
                self.content_blocks.push(ContentBlock::SurfaceContent {
                    content_id: content_id.clone(),
                    content_type: content_type.clone(),
                    title: title.clone(),
                    content: content.clone(),
                    filename: filename.clone(),
                });
            }
            StreamEvent::WebSearchStart { id, name } => {
                self.flush_buffers();
                self.content_blocks.push(ContentBlock::WebSearch {
                    id: id.clone(),
                    name: name.clone(),
                    query: String::new(),
                    results: Vec::new(),
                });
            }
            StreamEvent::WebSearchQuery {
                id,
                query,
                partial_query,
            } => {
                let Some(id) = id.as_deref() else {
                    tracing::debug!(
                        conversation_id = %self.conversation_id,
                        "Search query without an id dropped"
                    );
                    return;
                };
                let new_query = query.clone().or_else(|| partial_query.clone());
                match self.web_search_mut(id) {
                    Some((query, _)) => {
                        if let Some(new_query) = new_query {
                            *query = new_query;
                        }
                    }
                    None => tracing::debug!(
                        conversation_id = %self.conversation_id,
                        search_id = %id,
                        "Search query for unknown search dropped"
                    ),
                }
            }
            StreamEvent::WebSearchResult {
                tool_use_id,
                results,
            } => match self.web_search_mut(tool_use_id) {
                Some((_, slot)) => *slot = results.clone(),
                None => tracing::debug!(
                    conversation_id = %self.conversation_id,
                    search_id = %tool_use_id,
                    "Search results for unknown search dropped"
                ),
            },
            StreamEvent::Error { content } => {
                self.error = Some(content.clone());
            }
            StreamEvent::Stopped { .. } => {
                // Buffers are left as they are; `project` still shows them.
                self.is_complete = true;
            }
            StreamEvent::Done { .. } => {}
        }
    }

    /// Flush both buffers and mark the stream complete
    pub fn finish(&mut self) {
        self.flush_buffers();
        self.is_complete = true;
    }

    /// Point-in-time view of the assembled content
    ///
    /// Each `tool_use` is followed by its result when one is known, and any
    /// unflushed thinking then text is appended at the end. Never mutates.
    #[must_use]
    pub fn project(&self) -> Vec<ContentBlock> {
        let mut blocks =
            Vec::with_capacity(self.content_blocks.len() + self.tool_results.len() + 2);

        for block in &self.content_blocks {
            blocks.push(block.clone());
            if let ContentBlock::ToolUse { id, .. } = block {
                if let Some(result) = self.tool_results.get(id) {
                    blocks.push(ContentBlock::ToolResult {
                        tool_use_id: id.clone(),
                        content: result.content.clone(),
                        is_error: result.is_error,
                    });
                }
            }
        }

        if !self.current_thinking.is_empty() {
            blocks.push(ContentBlock::Thinking {
                content: self.current_thinking.clone(),
            });
        }
        if !self.current_text.is_empty() {
            blocks.push(ContentBlock::Text {
                text: self.current_text.clone(),
            });
        }

        blocks
    }

    /// Finalized content in its persisted shape
    ///
    /// Unflushed buffers are not included.
    #[must_use]
    pub fn message_content(&self) -> MessageContent {
        MessageContent::from_blocks(self.content_blocks.clone())
    }

    fn flush_text(&mut self) {
        if !self.current_text.is_empty() {
            let text = std::mem::take(&mut self.current_text);
            self.content_blocks.push(ContentBlock::Text { text });
        }
    }

    fn flush_thinking(&mut self) {
        if !self.current_thinking.is_empty() {
            let content = std::mem::take(&mut self.current_thinking);
            self.content_blocks.push(ContentBlock::Thinking { content });
        }
    }

    fn flush_buffers(&mut self) {
        self.flush_thinking();
        self.flush_text();
    }

    /// Most recent `web_search` block with this id
    fn web_search_mut(&mut self, search_id: &str) -> Option<(&mut String, &mut Vec<Value>)> {
        self.content_blocks.iter_mut().rev().find_map(|block| match block {
            ContentBlock::WebSearch {
                id, query, results, ..
            } if id == search_id => Some((query, results)),
            _ => None,
        })
    }
}
