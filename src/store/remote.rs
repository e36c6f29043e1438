//! the depot client interface consumed by the publish transaction.

use crate::store::error::RemoteResult;
use crate::store::types::{
    ChangelistId, ChangelistSummary, DepotPath, DirListing, FileResult, HeadState, WorkspaceName,
    WorkspaceSpec,
};

/// An authenticated handle to a versioned depot.
///
/// All calls are blocking. A handle has at most one active workspace at a
/// time; the staging calls (`stage_add`, `stage_edit`, `sync_no_merge`,
/// `revert`) act through it.
pub trait RemoteStore {
    /// the user this handle is authenticated as
    fn user(&self) -> Option<String>;

    /// head-revision state of a path; a path the depot never saw is `HeadState::missing()`
    fn head_state(&self, path: &DepotPath) -> RemoteResult<HeadState>;

    // ==================== workspaces ====================

    fn create_workspace(&self, spec: &WorkspaceSpec) -> RemoteResult<()>;

    fn set_active_workspace(&self, name: &WorkspaceName) -> RemoteResult<()>;

    /// remove a workspace registration; it must have no open files or pending changelists
    fn delete_workspace(&self, name: &WorkspaceName) -> RemoteResult<()>;

    // ==================== staging ====================

    /// open files for add; the local copies must already be in the workspace root
    fn stage_add(&self, paths: &[DepotPath], change: ChangelistId) -> RemoteResult<()>;

    /// open files for edit; each file must have been synced first
    fn stage_edit(&self, paths: &[DepotPath], change: ChangelistId) -> RemoteResult<()>;

    /// record the head revision as had without transferring content
    fn sync_no_merge(&self, paths: &[DepotPath]) -> RemoteResult<()>;

    /// revert every file opened in the active workspace under `subtree`
    fn revert(&self, subtree: &DepotPath) -> RemoteResult<Vec<DepotPath>>;

    // ==================== changelists ====================

    fn create_changelist(
        &self,
        description: &str,
        owner: &str,
        workspace: &WorkspaceName,
    ) -> RemoteResult<ChangelistId>;

    /// the files currently opened against a changelist
    fn refresh_changelist(&self, change: ChangelistId) -> RemoteResult<Vec<DepotPath>>;

    /// Submit atomically; per-file outcomes are reported, not raised.
    ///
    /// When any file is rejected nothing is committed, and files that passed
    /// validation come back as `Info` notes rather than `Valid`.
    fn submit(&self, change: ChangelistId) -> RemoteResult<Vec<FileResult>>;

    /// changelists of one owner and workspace, newest first, at most `limit`
    fn list_pending_changelists(
        &self,
        owner: &str,
        workspace: &WorkspaceName,
        limit: usize,
    ) -> RemoteResult<Vec<ChangelistSummary>>;

    fn delete_pending_changelist(&self, change: ChangelistId) -> RemoteResult<()>;

    // ==================== read side ====================

    /// content of the head revision
    fn read_file(&self, path: &DepotPath) -> RemoteResult<Vec<u8>>;

    /// immediate children of a depot directory
    fn list_dir(&self, path: &DepotPath) -> RemoteResult<DirListing>;
}
