//! Mock streams
//!
//! Deterministic event scripts shaped like what the chat and agent endpoints
//! send, plus helpers that render them as wire bytes and cut them into
//! chunks. Used by the integration tests and by `relay-replay --mock`.

use futures::stream;
use serde_json::json;
use uuid::Uuid;

use crate::events::StreamEvent;
use crate::reader::{ByteStream, TransportError};

const THINKING_LINES: &[&str] = &[
    "Let me analyze this request step by step.",
    "First, I need to understand what the user is asking for.",
    "I should provide a helpful response that shows the rendering capabilities.",
];

const TEXT_CHUNKS: &[&str] = &[
    "Hello! ",
    "I'm a ",
    "**mock response** ",
    "designed for ",
    "testing purposes.\n\n",
    "Here's some code:\n",
    "```rust\n",
    "fn hello() {\n",
    "    println!(\"Hello, World!\");\n",
    "}\n",
    "```\n",
];

const SEARCH_QUERY_PARTS: &[&str] = &["mock ", "search ", "query"];

const STOP_NOTICE: &str = "Stream stopped by user";

/// Which optional sections a script contains
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockOptions {
    /// Emit thinking before the answer
    pub thinking: bool,
    /// Emit a web search (normal scripts)
    pub web_search: bool,
    /// Emit a tool use and its result (agent scripts)
    pub tool_use: bool,
    /// Emit a surface content block (agent scripts)
    pub surface: bool,
    /// Replace everything after this many events with `stopped`
    pub stop_after: Option<usize>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            thinking: true,
            web_search: false,
            tool_use: true,
            surface: true,
            stop_after: None,
        }
    }
}

/// Script of a normal chat response
#[must_use]
pub fn normal_script(options: &MockOptions, position: u32) -> Vec<StreamEvent> {
    let mut events = vec![StreamEvent::MessageId {
        id: Uuid::new_v4().to_string(),
        position: Some(position),
    }];

    if options.thinking {
        events.extend(thinking());
    }

    if options.web_search {
        let search_id = format!("search_{}", Uuid::new_v4().simple());
        events.push(StreamEvent::WebSearchStart {
            id: search_id.clone(),
            name: "web_search".to_string(),
        });
        let mut partial = String::new();
        for part in SEARCH_QUERY_PARTS {
            partial.push_str(part);
            events.push(StreamEvent::WebSearchQuery {
                id: Some(search_id.clone()),
                query: None,
                partial_query: Some(partial.clone()),
            });
        }
        events.push(StreamEvent::WebSearchResult {
            tool_use_id: search_id,
            results: vec![
                json!({
                    "title": "Example Result 1 - Mock Search",
                    "url": "https://example.com/result1",
                    "snippet": "This is a mock search result for testing."
                }),
                json!({
                    "title": "Example Result 2 - Test Data",
                    "url": "https://example.com/result2",
                    "snippet": "Another mock result demonstrating web search rendering."
                }),
            ],
        });
    }

    events.extend(TEXT_CHUNKS.iter().map(|chunk| StreamEvent::text(*chunk)));
    events.push(StreamEvent::Done { content: None });
    apply_stop(events, options.stop_after)
}

/// Script of an agent session
#[must_use]
pub fn agent_script(options: &MockOptions) -> Vec<StreamEvent> {
    let mut events = vec![
        StreamEvent::MessageId {
            id: Uuid::new_v4().to_string(),
            position: None,
        },
        StreamEvent::SessionId {
            session_id: format!("mock_session_{}", Uuid::new_v4().simple()),
        },
    ];

    if options.thinking {
        events.extend(thinking());
    }

    events.push(StreamEvent::text("I'll read that file for you.\n"));

    if options.tool_use {
        events.push(StreamEvent::tool_use(
            "mock_tool_001",
            "Read",
            json!({"path": "/mock/path/to/file.txt"}),
        ));
        events.push(StreamEvent::tool_result(
            "mock_tool_001",
            "Mock file contents:\nLine 1\nLine 2\nLine 3",
        ));
    }

    events.extend(
        [
            "\n\nI found the file. ",
            "The file contains **mock data** ",
            "for testing purposes.\n",
        ]
        .into_iter()
        .map(StreamEvent::text),
    );

    if options.surface {
        events.push(StreamEvent::SurfaceContent {
            content_id: "mock_surface_001".to_string(),
            content_type: "html".to_string(),
            title: Some("Mock Dashboard".to_string()),
            content: Some(
                "<div><h2>Mock Surface Content</h2><p>Item A</p></div>".to_string(),
            ),
            filename: None,
        });
    }

    events.push(StreamEvent::text("Let me know if you need anything else!"));
    events.push(StreamEvent::Done { content: None });
    apply_stop(events, options.stop_after)
}

/// Script that reports an error after a little text
#[must_use]
pub fn error_script(message: &str) -> Vec<StreamEvent> {
    vec![
        StreamEvent::text("Starting response... "),
        StreamEvent::Error {
            content: message.to_string(),
        },
    ]
}

/// Render events as `data: <json>` frames
#[must_use]
pub fn to_sse(events: &[StreamEvent]) -> Vec<u8> {
    let mut out = Vec::new();
    for event in events {
        match serde_json::to_string(event) {
            Ok(json) => {
                out.extend_from_slice(b"data: ");
                out.extend_from_slice(json.as_bytes());
                out.extend_from_slice(b"\n\n");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to render mock event"),
        }
    }
    out
}

/// Body that yields `bytes` in chunks of `chunk_size` (at least one byte)
pub fn chunked_body(
    bytes: &[u8],
    chunk_size: usize,
) -> ByteStream<stream::Iter<std::vec::IntoIter<Result<Vec<u8>, TransportError>>>> {
    let chunks: Vec<Result<Vec<u8>, TransportError>> = bytes
        .chunks(chunk_size.max(1))
        .map(|chunk| Ok(chunk.to_vec()))
        .collect();
    ByteStream::new(stream::iter(chunks))
}

fn thinking() -> impl Iterator<Item = StreamEvent> {
    THINKING_LINES
        .iter()
        .map(|line| StreamEvent::thinking(format!("{line}\n")))
}

fn apply_stop(mut events: Vec<StreamEvent>, stop_after: Option<usize>) -> Vec<StreamEvent> {
    if let Some(limit) = stop_after {
        if limit < events.len() {
            events.truncate(limit);
            events.push(StreamEvent::Stopped {
                content: Some(STOP_NOTICE.to_string()),
            });
        }
    }
    events
}
