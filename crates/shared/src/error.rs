//! Shared error types for the session codec.

use thiserror::Error;

/// Why an inbound frame could not be turned into an event.
///
/// Unknown envelope types are *not* errors; they decode to
/// [`ServerEvent::Unknown`](crate::ServerEvent::Unknown).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The frame is not a `{type, payload}` envelope at all.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
    /// A recognized `type` whose payload failed shape validation.
    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: String, reason: String },
    /// A client frame whose `type` is not a command.
    #[error("unsupported command type: {0}")]
    UnsupportedCommand(String),
}

impl DecodeError {
    pub(crate) fn malformed(kind: &str, reason: impl ToString) -> Self {
        DecodeError::Malformed {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Envelope type the error relates to, when one could be read.
    pub fn kind(&self) -> Option<&str> {
        match self {
            DecodeError::InvalidEnvelope(_) => None,
            DecodeError::Malformed { kind, .. } | DecodeError::UnsupportedCommand(kind) => {
                Some(kind)
            }
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to encode {kind}: {source}")]
pub struct EncodeError {
    pub kind: String,
    #[source]
    pub source: serde_json::Error,
}
