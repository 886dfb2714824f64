//! Error types for the API client boundary.
//!
//! Malformed stream frames never show up here: the decoder skips them and
//! only the aggregate [`DecodedMessage`](crate::stream::DecodedMessage) is
//! returned.

use thiserror::Error;

/// Client error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The base URL or an endpoint built from it is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The outgoing request body could not be serialized.
    #[error("Failed to encode request: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The request could not be sent or the response could not be read.
    #[error("Network connection failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a status other than `200 OK`.
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body text, if any.
        message: String,
    },

    /// A JSON endpoint returned a body that is not the expected type.
    #[error("Failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// HTTP status for [`Error::Server`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
