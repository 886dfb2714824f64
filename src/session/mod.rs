//! Chat session state.
//!
//! A [`ChatSession`] is the client-side state container behind a chat
//! screen: the transcript, the report currently opened, the "typing"
//! indicator and the last error. Every change is broadcast as a
//! [`SessionEvent`] so any number of views can follow along.
//!
//! # Example
//!
//! ```rust
//! use bulldozer_client::session::{ChatSession, SessionEvent};
//! use bulldozer_client::types::ChatMessage;
//!
//! let session = ChatSession::new();
//! let mut events = session.subscribe();
//!
//! session.add_message(ChatMessage::user("Hello!"));
//! assert_eq!(session.message_count(), 1);
//! assert!(matches!(events.try_recv(), Ok(SessionEvent::MessageAdded(_))));
//! ```

mod send;
mod state;

pub use state::{ChatSession, SessionEvent, SessionState};
