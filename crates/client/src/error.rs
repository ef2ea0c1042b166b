//! Client-side error types.

use quizroom_shared::EncodeError;
use thiserror::Error;

/// Failures of the realtime link. These never reach the UI as errors; the
/// connection loop turns them into a reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("connection refused for game {0}")]
    Refused(String),
    #[error("connection attempt for game {0} timed out")]
    TimedOut(String),
    #[error("link closed")]
    LinkClosed,
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// A session hook was called by a component that is not rendered under
/// `ActiveGameProvider`. This is a mistake in the view tree, not a runtime
/// condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{hook}() must be called from a component rendered inside ActiveGameProvider")]
pub struct MissingProviderError {
    pub hook: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("{0} is required when joining as a player")]
    MissingPlayerId(&'static str),
}
