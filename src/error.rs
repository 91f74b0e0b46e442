// Typed error surface for the synchronization core.
// Every fallible operation returns one of these; nothing is swallowed
// silently except the explicitly best-effort presence and cleanup writes.

use thiserror::Error;

use crate::models::MessageStatus;

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// A document or lookup target does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Store-level authorization failure, surfaced as-is.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Rejected before any write was attempted.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// An illegal status transition was attempted.
    #[error("illegal status transition: {from:?} -> {to:?}")]
    Conflict {
        from: MessageStatus,
        to: MessageStatus,
    },

    /// Network/availability failure from the store or blob collaborator.
    /// Multi-step operations interrupted by this leave partial state that
    /// callers must treat as resumable.
    #[error("transient store error: {0}")]
    Transient(String),
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
