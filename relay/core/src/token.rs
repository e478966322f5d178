//! Stream Token Authority
//!
//! A single monotonically increasing counter. Starting a stream or switching
//! conversations issues a new token, which makes every previously issued
//! token stale. Readers compare the token they were started with against the
//! current value; there is no grace window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Issues stream tokens
///
/// Clones share the same counter, so one authority can be handed to the
/// conversation-switch logic and to every place that starts a stream.
#[derive(Clone, Debug, Default)]
pub struct StreamTokens {
    current: Arc<AtomicU64>,
}

impl StreamTokens {
    /// Create an authority whose counter starts at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter and return a token for the new value
    ///
    /// Every token issued before this call becomes stale.
    #[must_use = "issuing a token invalidates older ones; pass it to the reader"]
    pub fn issue(&self) -> StreamToken {
        let value = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(token = value, "Stream token issued");
        StreamToken {
            value,
            current: Arc::clone(&self.current),
        }
    }

    /// Current counter value
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// Token captured when a read began
///
/// Passed by value into [`crate::StreamReader::process`].
#[derive(Clone, Debug)]
pub struct StreamToken {
    value: u64,
    current: Arc<AtomicU64>,
}

impl StreamToken {
    /// The counter value this token was issued for
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// True while no newer token has been issued
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.value
    }
}
