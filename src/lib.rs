//! Bulldozer research assistant client
//!
//! Client core for a chat-and-report research assistant backed by a remote
//! research agent. The chat endpoint answers with a Server-Sent-Events body;
//! everything else is plain JSON.
//!
//! # Architecture
//!
//! - **Stream decoding**: `data: ` line framing, JSON content fragments,
//!   `[DONE]` sentinel, research id correlation
//! - **API client**: `reqwest`-based access to chat, research and config
//!   endpoints
//! - **Session**: observable transcript/typing/error container and send flow
//!
//! # Modules
//!
//! - [`stream`]: Batch and incremental chat stream decoder
//! - [`client`]: HTTP client for the backend API
//! - [`session`]: Chat session state and send flow
//! - [`types`]: Wire DTOs
//! - [`config`]: Layered configuration
//! - [`error`]: Error types

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod stream;
pub mod types;

pub use client::Client;
pub use error::{Error, Result};
pub use session::ChatSession;
pub use stream::{DecodedMessage, StreamDecoder, StreamUpdate, decode};
