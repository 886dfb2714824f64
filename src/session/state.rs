//! Observable chat session container.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::types::{ChatMessage, ResearchReport};

/// Events buffered per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 256;

/// A change to a [`ChatSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A message was appended to the transcript.
    MessageAdded(ChatMessage),
    /// Text of the assistant reply currently being streamed.
    AssistantDelta(String),
    /// The typing indicator changed.
    Typing(bool),
    /// The error message was set or cleared.
    Error(Option<String>),
    /// The opened report changed (by id).
    ResearchChanged(Option<String>),
    /// The transcript was cleared.
    Cleared,
}

/// Point-in-time copy of a session's state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub current_research: Option<ResearchReport>,
    pub is_typing: bool,
    pub error_message: Option<String>,
}

/// A single chat session.
///
/// Clones share the same state and event channel.
#[derive(Debug, Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    state: RwLock<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Create an empty session with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Create an empty session with a specific id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self::from_state(SessionState {
            id: id.into(),
            ..SessionState::default()
        })
    }

    /// Restore a session from a snapshot. The typing flag is reset.
    #[must_use]
    pub fn from_state(mut state: SessionState) -> Self {
        state.is_typing = false;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                state: RwLock::new(state),
                events,
            }),
        }
    }

    /// Get the session id.
    #[must_use]
    pub fn id(&self) -> String {
        self.read().id.clone()
    }

    /// Copy the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.read().clone()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────

    /// Receive every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Same as [`subscribe`](Self::subscribe), as a `Stream`.
    pub fn events(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.subscribe())
    }

    pub(crate) fn notify(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.inner.events.send(event);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transcript
    // ─────────────────────────────────────────────────────────────────────

    /// Append a message to the transcript.
    pub fn add_message(&self, message: ChatMessage) {
        self.write().messages.push(message.clone());
        self.notify(SessionEvent::MessageAdded(message));
    }

    /// Get all messages in the transcript.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.read().messages.clone()
    }

    /// Get the number of messages in the transcript.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.read().messages.len()
    }

    /// Research id of the most recent assistant message that has one.
    #[must_use]
    pub fn latest_research_id(&self) -> Option<String> {
        self.read()
            .messages
            .iter()
            .rev()
            .find_map(|m| m.research_id.clone())
    }

    /// Remove all messages.
    pub fn clear_messages(&self) {
        self.write().messages.clear();
        self.notify(SessionEvent::Cleared);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Report, typing, error
    // ─────────────────────────────────────────────────────────────────────

    /// Set or clear the report being viewed.
    pub fn set_current_research(&self, research: Option<ResearchReport>) {
        let id = research.as_ref().map(|r| r.id.clone());
        self.write().current_research = research;
        self.notify(SessionEvent::ResearchChanged(id));
    }

    #[must_use]
    pub fn current_research(&self) -> Option<ResearchReport> {
        self.read().current_research.clone()
    }

    /// Whether a reply is in flight.
    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.read().is_typing
    }

    pub(crate) fn set_typing(&self, typing: bool) {
        let changed = {
            let mut state = self.write();
            std::mem::replace(&mut state.is_typing, typing) != typing
        };
        if changed {
            self.notify(SessionEvent::Typing(typing));
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.read().error_message.clone()
    }

    /// Record an error for display.
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.write().error_message = Some(message.clone());
        self.notify(SessionEvent::Error(Some(message)));
    }

    /// Dismiss the current error, if any.
    pub fn clear_error(&self) {
        let had_error = self.write().error_message.take().is_some();
        if had_error {
            self.notify(SessionEvent::Error(None));
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
