//! Relay Core - incremental stream accumulation for chat and agent responses
//!
//! This crate reads server-pushed response streams (text and thinking
//! fragments, tool invocations and results, rich surface content, web-search
//! updates) and accumulates them into a queryable state per conversation,
//! independent of which conversation is on screen.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   bytes    ┌──────────────────────────────────────┐
//! │ ResponseBody │──────────► │            StreamReader              │
//! │ (HTTP, mock) │ ◄── cancel │  FrameDecoder ─► parse ─► live? ──┐  │
//! └──────────────┘            └───────────────────────────────────┼──┘
//!                                      ▲ StreamToken              │ StreamEvent
//!                                      │ ActiveConversation       ▼
//! ┌──────────────┐            ┌──────────────────────────────────────┐
//! │ StreamTokens │            │           StreamRegistry             │
//! │  (authority) │            │  ConversationId ─► StreamState       │
//! └──────────────┘            │  apply ─► fan-out to subscribers     │
//!                             └──────────────────┬───────────────────┘
//!                                                │ (StreamUpdate, &StreamState)
//!                                                ▼
//!                                          display layer
//! ```
//!
//! # Key Types
//!
//! - [`StreamTokens`] / [`StreamToken`]: cooperative cancellation
//! - [`StreamReader`]: frame decoding with liveness checks
//! - [`StreamRegistry`]: per-conversation [`StreamState`] and fan-out
//! - [`StreamEvent`]: the wire events
//! - [`ContentBlock`]: assembled output
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use relay_core::{
//!     ActiveConversationCell, ConversationId, RegistrySink, StreamKind,
//!     StreamReader, StreamRegistry, StreamTokens, mock,
//! };
//!
//! let registry = StreamRegistry::new();
//! let tokens = StreamTokens::new();
//! let id = ConversationId::from("conv-1");
//! let active = ActiveConversationCell::with_active(id.clone());
//! let reader = StreamReader::new(Arc::new(active));
//!
//! registry.start(id.clone(), StreamKind::Agent, 0);
//! let _sub = registry.subscribe(&id, |update, state| {
//!     println!("{}: {} blocks", update.update_type(), state.content_blocks.len());
//! });
//!
//! let body = mock::chunked_body(&mock::to_sse(&mock::agent_script(&Default::default())), 64);
//! let mut sink = RegistrySink::new(registry.clone(), id.clone());
//! reader.process(body, &mut sink, tokens.issue(), &id).await;
//!
//! let blocks = registry.project(&id);
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod content;
pub mod conversation;
pub mod events;
pub mod mock;
pub mod reader;
pub mod streaming;
pub mod token;

// Re-export commonly used types
pub use client::{HttpBody, StreamClient};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, EndpointConfig, ReaderConfig, RelayConfig,
};
pub use content::{extract_text, has_special_blocks, ContentBlock, MessageContent, ToolResult};
pub use conversation::{ActiveConversation, ActiveConversationCell, ConversationId, StreamKind};
pub use events::{StreamEvent, StreamUpdate};
pub use reader::{
    parse_frame, ByteStream, FrameDecoder, FrameError, ReadOutcome, ReaderCallbacks,
    ReaderHandler, ResponseBody, StreamReader, TransportError,
};
pub use streaming::{
    RegistrySink, StreamRegistry, StreamState, StreamStatus, Subscriber, SubscriberId,
    Subscription,
};
pub use token::{StreamToken, StreamTokens};
