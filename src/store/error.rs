//! Depot error types
//!
//! every failure a remote depot can report is a variant of `RemoteError`.
//! callers only need to distinguish a handful of categories, so the helper
//! methods at the bottom classify variants for them.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::types::{ChangelistId, DepotPath, InvalidNameError, WorkspaceName};

/// the main error type for depot operations
#[derive(Debug, Error)]
pub enum RemoteError {
    /// the depot could not be reached or opened
    #[error("connection error: {0}")]
    Connection(String),

    /// the depot user may not perform the operation
    #[error("access denied: {0}")]
    Access(String),

    /// the depot rejected the request
    #[error("request rejected: {0}")]
    Request(String),

    /// the depot path does not exist at head
    #[error("file not found: {0}")]
    NotFound(DepotPath),

    /// the workspace is not registered
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(WorkspaceName),

    /// the changelist is not registered
    #[error("changelist not found: {0}")]
    ChangelistNotFound(ChangelistId),

    /// a depot path or workspace name failed validation
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// I/O error on a local file
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// the depot bookkeeping file could not be read or written
    #[error("state error: {0}")]
    State(#[from] serde_json::Error),

    /// the main line moved while a submit was in flight
    #[error("concurrent modification: {0} was updated by another submit")]
    ConcurrentModification(String),

    /// data integrity check failed
    #[error("corrupted data at {path}: {reason}")]
    CorruptedData { path: String, reason: String },
}

impl RemoteError {
    /// shorthand for a rejected request
    pub fn request(message: impl Into<String>) -> Self {
        RemoteError::Request(message.into())
    }

    /// attach a local path to an io error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RemoteError::Io {
            path: path.into(),
            source,
        }
    }

    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RemoteError::NotFound(_)
                | RemoteError::WorkspaceNotFound(_)
                | RemoteError::ChangelistNotFound(_)
        )
    }

    /// check if this error is recoverable by retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::ConcurrentModification(_) | RemoteError::Connection(_)
        )
    }
}

/// result type alias for depot operations
pub type RemoteResult<T> = Result<T, RemoteError>;
