//! Session lifecycle states.

use std::fmt;

use crate::error::{Error, Result};

/// Lifecycle of one scraper session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Attached, waiting for the setup handshake.
    #[default]
    Idle,
    /// Setup confirmed, nothing emitted yet.
    Ready,
    /// Healthy, emitting heartbeats.
    Working,
    /// A recoverable fault happened; the transport is still alive.
    Error,
    /// Terminal.
    Fatal,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Working => "working",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }

    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        match (self, target) {
            (Idle, Ready) => true,
            (Ready, Working) => true,
            (Working, Error) => true,
            (Error, Working) => true,
            // Setup timeout, transport loss or an unrecoverable adapter signal
            (Idle | Ready | Working | Error, Fatal) => true,
            _ => false,
        }
    }

    /// Move to `target`, or fail with [`Error::InvalidStateTransition`].
    pub fn transition(&mut self, target: SessionState) -> Result<()> {
        if !self.can_transition_to(target) {
            return Err(Error::invalid_transition(*self, target));
        }
        *self = target;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
