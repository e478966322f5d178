//! Streaming state and the stream registry
//!
//! - [`StreamState`]: the accumulation state machine for one message
//! - [`StreamRegistry`]: per-conversation states plus subscriber fan-out
//! - [`RegistrySink`]: connects a [`crate::StreamReader`] to a registry

mod registry;
mod sink;
mod state;

pub use registry::{StreamRegistry, StreamStatus, Subscriber, SubscriberId, Subscription};
pub use sink::RegistrySink;
pub use state::StreamState;
