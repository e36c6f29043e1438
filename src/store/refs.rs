//! Main line reference management.
//!
//! the depot has exactly one line of history, `refs/heads/main`. every
//! submit advances it with compare-and-swap so two depot handles sharing a
//! repository can never lose each other's commits.

use git2::{ErrorCode, Repository};

use crate::store::error::{RemoteError, RemoteResult};
use crate::store::types::CommitId;

/// Manages the depot's main reference.
pub struct RefManager;

impl RefManager {
    /// the one branch the depot commits to
    pub const MAIN_REF: &'static str = "refs/heads/main";

    /// Get the current head of the main line.
    ///
    /// returns None for a depot that has no commits yet.
    pub fn head_commit(repo: &Repository) -> RemoteResult<Option<CommitId>> {
        let reference = match repo.find_reference(Self::MAIN_REF) {
            Ok(r) => r,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let commit = reference.peel_to_commit()?;
        Ok(Some(CommitId::new(commit.id())))
    }

    /// Check if the main line exists.
    pub fn main_exists(repo: &Repository) -> bool {
        repo.find_reference(Self::MAIN_REF).is_ok()
    }

    /// Initialize the main line if it doesn't exist.
    ///
    /// This should be called after creating the initial commit.
    /// Also ensures HEAD points to main.
    pub fn init_main_branch(repo: &Repository, initial_commit: CommitId) -> RemoteResult<()> {
        if !Self::main_exists(repo) {
            repo.reference(Self::MAIN_REF, initial_commit.raw(), false, "init depot")?;
        }

        repo.set_head(Self::MAIN_REF)?;

        Ok(())
    }

    /// Advance main only if it still points to the expected commit.
    ///
    /// This provides compare-and-swap semantics for safe concurrent submits.
    /// Returns error if main was moved by another submit.
    pub fn update_main_if_unchanged(
        repo: &Repository,
        expected: CommitId,
        new_target: CommitId,
    ) -> RemoteResult<()> {
        let message = format!("submit {}", new_target.short());
        match repo.reference_matching(
            Self::MAIN_REF,
            new_target.raw(),
            true,
            expected.raw(),
            &message,
        ) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == ErrorCode::Modified || e.code() == ErrorCode::NotFound => Err(
                RemoteError::ConcurrentModification(Self::MAIN_REF.to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }
}
