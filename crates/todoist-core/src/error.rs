//! Error types for the sync client
//!
//! The variants follow where a failure happens: input validation and local
//! lookups fail before anything is queued or sent, transport failures leave
//! the queue as it was, and per-command rejections are reported after the
//! accepted part of a commit has been applied.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::id::{Id, IdError};
use crate::models::EntityKind;
use crate::storage::StorageError;
use crate::sync::TransportError;

/// A command the server rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub uuid: Uuid,
    /// Wire type, e.g. `item_update`
    pub command: String,
    pub target: Id,
    pub error_code: Option<i64>,
    pub reason: String,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.command, self.target, self.reason)?;
        if let Some(code) = self.error_code {
            write!(f, " (code {})", code)?;
        }
        Ok(())
    }
}

fn join_failures(failures: &[CommandFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid id: {0}")]
    InvalidId(#[from] IdError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No such {kind} id: {id}")]
    NotFound { kind: EntityKind, id: Id },

    #[error("Item {id} has {open} incomplete sub-item(s); complete them first or force completion")]
    IncompleteChildren { id: Id, open: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("{} command(s) rejected by the server: {}", .0.len(), join_failures(.0))]
    PartialCommandFailure(Vec<CommandFailure>),

    #[error("Failed to sync: {0}")]
    Consistency(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: Id) -> Self {
        Error::NotFound { kind, id }
    }

    /// Whether re-running the same sync may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Cancelled | Error::Consistency(_)
        )
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found(EntityKind::Item, Id::Permanent(42));
        assert_eq!(err.to_string(), "No such item id: 42");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_partial_failure_lists_commands() {
        let err = Error::PartialCommandFailure(vec![CommandFailure {
            uuid: Uuid::new_v4(),
            command: "item_update".to_string(),
            target: Id::Permanent(7),
            error_code: Some(22),
            reason: "Item not found".to_string(),
        }]);
        let msg = err.to_string();
        assert!(msg.starts_with("1 command(s) rejected"));
        assert!(msg.contains("item_update 7: Item not found (code 22)"));
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        let err = Error::from(TransportError::Timeout);
        assert!(err.is_retryable());
        assert!(Error::Cancelled.is_retryable());
    }
}
