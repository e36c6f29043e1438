//! Publish transaction error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::{DepotPath, RemoteError};
use crate::transaction::state::TransactionState;

/// Result type for publish transaction operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors that can occur during a publish transaction.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A transaction is already held by this repository handle.
    #[error("a transaction for {active} is already active; cannot begin {requested}")]
    AlreadyActive { active: String, requested: String },

    /// Commit or put without a transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// The ephemeral workspace could not be set up.
    #[error("workspace initialization failed at {}: {reason}", path.display())]
    WorkspaceInit { path: PathBuf, reason: String },

    /// Depot error.
    #[error("depot error: {0}")]
    Remote(#[from] RemoteError),

    /// Copying a payload into the workspace failed.
    #[error("staging copy failed: {0}")]
    Copy(#[from] CopyError),

    /// The destination was already staged by an earlier put.
    #[error("{path} is already staged in this transaction")]
    AlreadyStaged { path: DepotPath },

    /// The depot rejected a file on submit.
    #[error("commit failed for {path}: {message}")]
    CommitFailed { path: DepotPath, message: String },

    /// Illegal lifecycle transition.
    #[error("invalid transaction state transition: {from} -> {to}")]
    InvalidState {
        from: TransactionState,
        to: TransactionState,
    },
}

impl PublishError {
    /// Check if this error comes from using the lifecycle out of order.
    pub fn is_lifecycle_misuse(&self) -> bool {
        matches!(
            self,
            PublishError::AlreadyActive { .. }
                | PublishError::NoActiveTransaction
                | PublishError::InvalidState { .. }
        )
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Remote(e) => e.is_retryable(),
            PublishError::Copy(_) => true,
            _ => false,
        }
    }
}

/// Local file errors while staging a payload.
#[derive(Debug, Error)]
pub enum CopyError {
    /// The parent directory of the workspace copy could not be created.
    #[error("cannot create directory {}: {source}", dir.display())]
    MissingParent {
        dir: PathBuf,
        source: std::io::Error,
    },

    /// Opening, reading or writing a file failed.
    #[error("cannot copy {} to {}: {source}", from.display(), to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}
