//! Errors raised while normalizing events and building claims

use thiserror::Error;

use crate::types::EventKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The event cannot be relayed; dropped by the caller
    #[error("unsupported {kind} event: {reason}")]
    UnsupportedEvent { kind: EventKind, reason: String },

    #[error("event kind {0} has no destination route")]
    UnsupportedClaimKind(EventKind),

    #[error("unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl BridgeError {
    pub(crate) fn unsupported(kind: EventKind, reason: impl Into<String>) -> Self {
        BridgeError::UnsupportedEvent {
            kind,
            reason: reason.into(),
        }
    }
}
