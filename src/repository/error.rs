//! Repository error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::RemoteError;
use crate::transaction::PublishError;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("depot error: {0}")]
    Remote(#[from] RemoteError),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl RepositoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RepositoryError::Io {
            path: path.into(),
            source,
        }
    }

    /// true when the path does not exist in the depot
    pub fn is_not_found(&self) -> bool {
        match self {
            RepositoryError::Remote(e) => e.is_not_found(),
            RepositoryError::Publish(PublishError::Remote(e)) => e.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            RepositoryError::Publish(e) => e.is_retryable(),
            RepositoryError::Remote(e) => e.is_retryable(),
            RepositoryError::Io { .. } => false,
        }
    }
}
