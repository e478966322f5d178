//! Stream Registry - per-conversation accumulation and fan-out
//!
//! The registry owns one [`StreamState`] per conversation and tells every
//! subscriber of that conversation about each accepted update.
//!
//! # Architecture
//!
//! ```text
//!                        StreamRegistry
//!           ┌──────────────────────────────────────────────┐
//!           │ HashMap<ConversationId, StreamEntry>         │
//!           │   - wrapped in Arc<Mutex<>>                  │
//!           │   - state: Arc<StreamState> (in place)       │
//!           │   - subscribers: Vec<(SubscriberId, ..)>     │
//!           └──────────────────────┬───────────────────────┘
//!                                  │ handle_event / end
//!                                  ▼
//!                 snapshot state + subscriber list
//!                         (lock released)
//!                                  │
//!              ┌───────────────────┼───────────────────┐
//!              ▼                   ▼                   ▼
//!         subscriber 1        subscriber 2        subscriber 3
//! ```
//!
//! # Re-entrancy
//!
//! Fan-out runs after the lock is released, over the subscriber list as it
//! was when the update was applied. A subscriber may call back into the
//! registry, including unsubscribing itself, and every subscriber in the
//! snapshot still receives the update. A panicking subscriber is logged and
//! skipped.
//!
//! # Snapshots
//!
//! The registry is the only long-lived owner of each state, so events are
//! applied in place. [`StreamRegistry::get`] returns an owned copy and
//! [`StreamRegistry::with_state`] reads without copying. The state is shared
//! only while a fan-out is in flight; an event applied during that window
//! (a subscriber feeding the registry) copies it once.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;

use super::state::StreamState;
use crate::content::ContentBlock;
use crate::conversation::{ConversationId, StreamKind};
use crate::events::{StreamEvent, StreamUpdate};

// ============================================================================
// Subscribers
// ============================================================================

/// Callback invoked for every update of a stream
pub type Subscriber = Arc<dyn Fn(&StreamUpdate<'_>, &StreamState) + Send + Sync>;

/// Identifier of one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw numeric value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Handle returned by [`StreamRegistry::subscribe`]
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    registry: Weak<Mutex<HashMap<ConversationId, StreamEntry>>>,
    conversation_id: ConversationId,
    id: Option<SubscriberId>,
}

impl Subscription {
    /// Identifier of the registration, `None` if subscribing failed
    #[must_use]
    pub fn id(&self) -> Option<SubscriberId> {
        self.id
    }

    /// Whether a subscriber was actually registered
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.id.is_some()
    }

    /// Remove exactly this registration
    ///
    /// Safe to call more than once, after the stream was removed, or from
    /// inside the subscriber itself.
    pub fn unsubscribe(&self) {
        let (Some(id), Some(inner)) = (self.id, self.registry.upgrade()) else {
            return;
        };
        remove_subscriber(&inner, &self.conversation_id, id);
    }
}

// ============================================================================
// Status
// ============================================================================

/// Streaming status of one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    /// Whether a stream exists and has not completed
    pub streaming: bool,
    /// Kind of the stream, if one exists
    pub kind: Option<StreamKind>,
    /// Whether a stop request makes sense right now
    pub stoppable: bool,
}

impl StreamStatus {
    fn idle() -> Self {
        Self {
            streaming: false,
            kind: None,
            stoppable: false,
        }
    }

    fn of(state: &StreamState) -> Self {
        let streaming = state.is_active();
        Self {
            streaming,
            kind: Some(state.kind),
            stoppable: streaming && state.kind.is_stoppable(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

struct StreamEntry {
    state: Arc<StreamState>,
    subscribers: Vec<(SubscriberId, Subscriber)>,
}

impl fmt::Debug for StreamEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamEntry")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Registry of stream states, keyed by conversation
///
/// Cheap to clone; clones share the same streams. Construct one at
/// application start and hand clones to the reader sink and display layer.
#[derive(Clone, Debug, Default)]
pub struct StreamRegistry {
    inner: Arc<Mutex<HashMap<ConversationId, StreamEntry>>>,
}

impl StreamRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh state for `conversation_id`
    ///
    /// Any existing state for the conversation is replaced and its
    /// subscribers are dropped without notice.
    pub fn start(
        &self,
        conversation_id: ConversationId,
        kind: StreamKind,
        position: u32,
    ) -> StreamState {
        let state = StreamState::new(conversation_id.clone(), kind, position);
        let entry = StreamEntry {
            state: Arc::new(state.clone()),
            subscribers: Vec::new(),
        };

        let previous = self.inner.lock().insert(conversation_id.clone(), entry);

        if let Some(previous) = previous {
            let dropped = previous.subscribers.len();
            if previous.state.is_active() {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    dropped_subscribers = dropped,
                    "Replacing a stream that was still active"
                );
            } else {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    dropped_subscribers = dropped,
                    "Replacing completed stream"
                );
            }
        }

        tracing::info!(
            conversation_id = %conversation_id,
            kind = %kind,
            position,
            "Stream started"
        );
        state
    }

    /// Snapshot of the current state
    ///
    /// The copy is independent of later events.
    #[must_use]
    pub fn get(&self, conversation_id: &ConversationId) -> Option<StreamState> {
        self.with_state(conversation_id, StreamState::clone)
    }

    /// Read the current state without copying it
    ///
    /// `read` runs under the registry lock and must not call back into the
    /// registry.
    pub fn with_state<R>(
        &self,
        conversation_id: &ConversationId,
        read: impl FnOnce(&StreamState) -> R,
    ) -> Option<R> {
        self.inner
            .lock()
            .get(conversation_id)
            .map(|entry| read(&entry.state))
    }

    /// True iff a state exists and has not completed
    #[must_use]
    pub fn is_active(&self, conversation_id: &ConversationId) -> bool {
        self.inner
            .lock()
            .get(conversation_id)
            .is_some_and(|entry| entry.state.is_active())
    }

    /// Register `callback` for updates of `conversation_id`
    ///
    /// If the conversation has no state, nothing is registered and the
    /// returned handle is inert.
    pub fn subscribe<F>(&self, conversation_id: &ConversationId, callback: F) -> Subscription
    where
        F: Fn(&StreamUpdate<'_>, &StreamState) + Send + Sync + 'static,
    {
        let id = {
            let mut streams = self.inner.lock();
            streams.get_mut(conversation_id).map(|entry| {
                let id = SubscriberId::next();
                entry.subscribers.push((id, Arc::new(callback)));
                id
            })
        };

        match id {
            Some(id) => tracing::debug!(
                conversation_id = %conversation_id,
                subscriber = %id,
                "Subscriber registered"
            ),
            None => tracing::warn!(
                conversation_id = %conversation_id,
                "Cannot subscribe to unknown stream"
            ),
        }

        Subscription {
            registry: Arc::downgrade(&self.inner),
            conversation_id: conversation_id.clone(),
            id,
        }
    }

    /// Remove a registration; unknown ids are ignored
    pub fn unsubscribe(&self, conversation_id: &ConversationId, subscriber: SubscriberId) {
        remove_subscriber(&self.inner, conversation_id, subscriber);
    }

    /// Number of subscribers of a stream
    #[must_use]
    pub fn subscriber_count(&self, conversation_id: &ConversationId) -> usize {
        self.inner
            .lock()
            .get(conversation_id)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Apply `event` to the conversation's state and fan it out
    pub fn handle_event(&self, conversation_id: &ConversationId, event: &StreamEvent) {
        let Some((state, subscribers)) = self.mutate(conversation_id, |state| state.apply(event))
        else {
            tracing::warn!(
                conversation_id = %conversation_id,
                event_type = event.event_type(),
                "Event for unknown stream ignored"
            );
            return;
        };

        tracing::trace!(
            conversation_id = %conversation_id,
            event_type = event.event_type(),
            "Event applied"
        );
        fan_out(&StreamUpdate::Event(event), &state, &subscribers);
    }

    /// Flush buffers, mark complete and notify subscribers
    pub fn end(&self, conversation_id: &ConversationId) {
        let Some((state, subscribers)) = self.mutate(conversation_id, StreamState::finish) else {
            tracing::warn!(
                conversation_id = %conversation_id,
                "End for unknown stream ignored"
            );
            return;
        };

        tracing::info!(
            conversation_id = %conversation_id,
            blocks = state.content_blocks.len(),
            "Stream complete"
        );
        fan_out(&StreamUpdate::Complete, &state, &subscribers);
    }

    /// Delete the state and all its subscribers
    ///
    /// Returns the final state, if there was one.
    pub fn remove(&self, conversation_id: &ConversationId) -> Option<StreamState> {
        let removed = self.inner.lock().remove(conversation_id);
        match removed {
            Some(mut entry) => {
                entry.subscribers.clear();
                tracing::debug!(conversation_id = %conversation_id, "Stream removed");
                Some(Arc::unwrap_or_clone(entry.state))
            }
            None => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    "Remove for unknown stream ignored"
                );
                None
            }
        }
    }

    /// Projection of the conversation's current state
    #[must_use]
    pub fn project(&self, conversation_id: &ConversationId) -> Option<Vec<ContentBlock>> {
        self.with_state(conversation_id, StreamState::project)
    }

    /// Streaming status of one conversation
    #[must_use]
    pub fn status(&self, conversation_id: &ConversationId) -> StreamStatus {
        self.inner
            .lock()
            .get(conversation_id)
            .map_or_else(StreamStatus::idle, |entry| StreamStatus::of(&entry.state))
    }

    /// Status of every stream that has not completed
    #[must_use]
    pub fn active_streams(&self) -> Vec<(ConversationId, StreamStatus)> {
        let mut active: Vec<_> = self
            .inner
            .lock()
            .iter()
            .filter(|(_, entry)| entry.state.is_active())
            .map(|(id, entry)| (id.clone(), StreamStatus::of(&entry.state)))
            .collect();
        active.sort_by(|a, b| a.0.cmp(&b.0));
        active
    }

    /// Number of streams held
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no streams are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Mutate a state under the lock, returning snapshots for fan-out
    fn mutate(
        &self,
        conversation_id: &ConversationId,
        apply: impl FnOnce(&mut StreamState),
    ) -> Option<(Arc<StreamState>, Vec<Subscriber>)> {
        let mut streams = self.inner.lock();
        let entry = streams.get_mut(conversation_id)?;
        // Clones only if a fan-out of this stream is still running
        apply(Arc::make_mut(&mut entry.state));
        let subscribers = entry
            .subscribers
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        Some((Arc::clone(&entry.state), subscribers))
    }
}

fn remove_subscriber(
    inner: &Mutex<HashMap<ConversationId, StreamEntry>>,
    conversation_id: &ConversationId,
    subscriber: SubscriberId,
) {
    let mut streams = inner.lock();
    if let Some(entry) = streams.get_mut(conversation_id) {
        let before = entry.subscribers.len();
        entry.subscribers.retain(|(id, _)| *id != subscriber);
        if entry.subscribers.len() != before {
            tracing::debug!(
                conversation_id = %conversation_id,
                subscriber = %subscriber,
                "Subscriber removed"
            );
        }
    }
}

fn fan_out(update: &StreamUpdate<'_>, state: &StreamState, subscribers: &[Subscriber]) {
    for subscriber in subscribers {
        let delivered = catch_unwind(AssertUnwindSafe(|| subscriber(update, state)));
        if delivered.is_err() {
            tracing::error!(
                conversation_id = %state.conversation_id,
                update_type = update.update_type(),
                "Subscriber panicked during fan-out"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn conv(id: &str) -> ConversationId {
        ConversationId::from(id)
    }

    fn recorder(registry: &StreamRegistry, id: &ConversationId) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _ = registry.subscribe(id, move |update, _state| {
            sink.lock().push(update.update_type().to_string());
        });
        seen
    }

    #[test]
    fn test_start_and_get() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        assert!(registry.get(&id).is_none());

        let state = registry.start(id.clone(), StreamKind::Normal, 2);
        assert_eq!(state.position, 2);
        assert!(registry.is_active(&id));
        assert_eq!(registry.get(&id).map(|s| s.position), Some(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_conversation_is_noop() {
        let registry = StreamRegistry::new();
        let id = conv("missing");
        registry.handle_event(&id, &StreamEvent::text("x"));
        registry.end(&id);
        assert!(registry.remove(&id).is_none());
        assert!(!registry.is_active(&id));
        assert!(registry.project(&id).is_none());

        let subscription = registry.subscribe(&id, |_, _| {});
        assert!(!subscription.is_registered());
        subscription.unsubscribe();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_unaffected_by_later_events() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        registry.start(id.clone(), StreamKind::Normal, 0);
        registry.handle_event(&id, &StreamEvent::text("a"));
        let snapshot = registry.get(&id).unwrap();

        registry.handle_event(&id, &StreamEvent::text("b"));
        assert_eq!(snapshot.current_text, "a");
        assert_eq!(registry.get(&id).unwrap().current_text, "ab");
    }

    #[test]
    fn test_held_snapshot_does_not_force_copies() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        registry.start(id.clone(), StreamKind::Normal, 0);
        let _subscription = registry.subscribe(&id, |_, _| {});
        registry.handle_event(&id, &StreamEvent::text("first"));
        registry.handle_event(&id, &StreamEvent::tool_use("t1", "Read", json!({})));

        let entry_state = |registry: &StreamRegistry| {
            let streams = registry.inner.lock();
            let state = &streams[&id].state;
            (Arc::as_ptr(state), Arc::strong_count(state))
        };

        let snapshot = registry.get(&id).unwrap();
        let (before, _) = entry_state(&registry);
        for _ in 0..1000 {
            registry.handle_event(&id, &StreamEvent::text("x"));
        }
        let (after, owners) = entry_state(&registry);

        assert_eq!(before, after);
        assert_eq!(owners, 1);
        assert_eq!(snapshot.content_blocks.len(), 2);
        assert!(snapshot.current_text.is_empty());
        assert_eq!(
            registry.with_state(&id, |state| state.current_text.len()),
            Some(1000)
        );
    }

    #[test]
    fn test_fan_out_receives_updates_and_completion() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        registry.start(id.clone(), StreamKind::Normal, 0);
        let seen = recorder(&registry, &id);

        registry.handle_event(&id, &StreamEvent::text("x"));
        registry.handle_event(&id, &StreamEvent::Done { content: None });
        registry.end(&id);

        assert_eq!(*seen.lock(), vec!["text", "done", "complete"]);
        assert!(!registry.is_active(&id));
    }

    #[test]
    fn test_subscriber_sees_state_after_event() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        registry.start(id.clone(), StreamKind::Normal, 0);
        let texts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&texts);
        let _subscription = registry.subscribe(&id, move |_, state| {
            sink.lock().push(state.current_text.clone());
        });

        registry.handle_event(&id, &StreamEvent::text("he"));
        registry.handle_event(&id, &StreamEvent::text("y"));
        assert_eq!(*texts.lock(), vec!["he", "hey"]);
    }

    #[test]
    fn test_unsubscribe_by_handle_and_id() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        registry.start(id.clone(), StreamKind::Normal, 0);

        let first = registry.subscribe(&id, |_, _| {});
        let second = registry.subscribe(&id, |_, _| {});
        assert_eq!(registry.subscriber_count(&id), 2);

        first.unsubscribe();
        first.unsubscribe();
        assert_eq!(registry.subscriber_count(&id), 1);

        registry.unsubscribe(&id, second.id().unwrap());
        registry.unsubscribe(&id, second.id().unwrap());
        assert_eq!(registry.subscriber_count(&id), 0);
    }

    #[test]
    fn test_self_unsubscribe_during_fan_out() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        registry.start(id.clone(), StreamKind::Normal, 0);

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));
        let handle_slot = Arc::clone(&slot);
        let counter = Arc::clone(&calls);
        let subscription = registry.subscribe(&id, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(subscription) = handle_slot.lock().as_ref() {
                subscription.unsubscribe();
            }
        });
        *slot.lock() = Some(subscription);
        let later = recorder(&registry, &id);

        registry.handle_event(&id, &StreamEvent::text("a"));
        registry.handle_event(&id, &StreamEvent::text("b"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*later.lock(), vec!["text", "text"]);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        registry.start(id.clone(), StreamKind::Normal, 0);
        let _bad = registry.subscribe(&id, |_, _| panic!("subscriber bug"));
        let seen = recorder(&registry, &id);

        registry.handle_event(&id, &StreamEvent::text("a"));

        assert_eq!(*seen.lock(), vec!["text"]);
        assert_eq!(registry.get(&id).unwrap().current_text, "a");
    }

    #[test]
    fn test_start_replaces_state_and_drops_subscribers() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        registry.start(id.clone(), StreamKind::Agent, 0);
        registry.handle_event(&id, &StreamEvent::text("old"));
        let seen = recorder(&registry, &id);

        registry.start(id.clone(), StreamKind::Normal, 1);
        registry.handle_event(&id, &StreamEvent::text("new"));

        assert!(seen.lock().is_empty());
        let state = registry.get(&id).unwrap();
        assert_eq!(state.current_text, "new");
        assert_eq!(state.kind, StreamKind::Normal);
        assert_eq!(registry.subscriber_count(&id), 0);
    }

    #[test]
    fn test_end_flushes_and_stopped_does_not() {
        let registry = StreamRegistry::new();
        let ended = conv("ended");
        let stopped = conv("stopped");
        registry.start(ended.clone(), StreamKind::Agent, 0);
        registry.start(stopped.clone(), StreamKind::Agent, 0);

        registry.handle_event(&ended, &StreamEvent::text("a"));
        registry.end(&ended);
        let state = registry.get(&ended).unwrap();
        assert!(state.is_complete);
        assert!(state.current_text.is_empty() && state.current_thinking.is_empty());

        registry.handle_event(&stopped, &StreamEvent::thinking("b"));
        registry.handle_event(&stopped, &StreamEvent::Stopped { content: None });
        let state = registry.get(&stopped).unwrap();
        assert!(state.is_complete);
        assert_eq!(state.current_thinking, "b");
    }

    #[test]
    fn test_streams_are_partitioned() {
        let registry = StreamRegistry::new();
        let a = conv("a");
        let b = conv("b");
        registry.start(a.clone(), StreamKind::Normal, 0);
        registry.start(b.clone(), StreamKind::Normal, 0);

        registry.handle_event(&a, &StreamEvent::text("for a"));
        registry.handle_event(&b, &StreamEvent::thinking("for b"));

        assert_eq!(registry.get(&a).unwrap().current_text, "for a");
        assert!(registry.get(&a).unwrap().current_thinking.is_empty());
        assert_eq!(registry.get(&b).unwrap().current_thinking, "for b");
    }

    #[test]
    fn test_remove_clears_everything() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        registry.start(id.clone(), StreamKind::Normal, 0);
        let subscription = registry.subscribe(&id, |_, _| {});

        let removed = registry.remove(&id);
        assert!(removed.is_some());
        assert!(registry.get(&id).is_none());
        assert_eq!(registry.subscriber_count(&id), 0);
        subscription.unsubscribe();
    }

    #[test]
    fn test_project_through_registry() {
        let registry = StreamRegistry::new();
        let id = conv("c1");
        registry.start(id.clone(), StreamKind::Agent, 0);
        registry.handle_event(&id, &StreamEvent::tool_use("t1", "Read", json!({})));
        registry.handle_event(&id, &StreamEvent::tool_result("t1", "ok"));

        let projected = registry.project(&id).unwrap();
        assert_eq!(projected.len(), 2);
        assert_eq!(projected[1].block_type(), "tool_result");
        assert_eq!(registry.project(&id), Some(projected));
    }

    #[test]
    fn test_status_and_active_streams() {
        let registry = StreamRegistry::new();
        let agent = conv("agent");
        let chat = conv("chat");
        assert_eq!(registry.status(&agent), StreamStatus::idle());

        registry.start(agent.clone(), StreamKind::Agent, 0);
        registry.start(chat.clone(), StreamKind::Normal, 0);

        assert_eq!(
            registry.status(&agent),
            StreamStatus {
                streaming: true,
                kind: Some(StreamKind::Agent),
                stoppable: true,
            }
        );
        assert!(!registry.status(&chat).stoppable);
        assert_eq!(registry.active_streams().len(), 2);

        registry.end(&agent);
        assert!(!registry.status(&agent).stoppable);
        assert_eq!(
            registry
                .active_streams()
                .into_iter()
                .map(|(id, _)| id)
                .collect::<Vec<_>>(),
            vec![chat]
        );
    }

    #[test]
    fn test_independent_registries() {
        let first = StreamRegistry::new();
        let second = StreamRegistry::new();
        first.start(conv("c1"), StreamKind::Normal, 0);
        assert!(second.get(&conv("c1")).is_none());

        let shared = first.clone();
        assert!(shared.get(&conv("c1")).is_some());
    }
}
