//! Error types for the unichat core.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while decoding frames, running sessions or wiring sinks.
#[derive(Error, Debug)]
pub enum Error {
    /// A frame was recognized but its payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The setup handshake failed or never arrived.
    #[error("Setup error: {0}")]
    Setup(String),

    /// Transport-level failure (connect, send, unexpected close).
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Scraper registration or lookup failure.
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a setup error.
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a registry error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Whether the error originates from frame content rather than the session itself.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Json(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
