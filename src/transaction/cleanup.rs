//! Cleanup / rollback protocol.
//!
//! Runs at the end of every transaction that provisioned a workspace,
//! whether it committed, failed or was aborted. Each step runs even when an
//! earlier one failed; problems are collected as warnings and never raised.

use tracing::{debug, warn};

use crate::store::{ChangelistId, ChangelistStatus, DepotPath, RemoteStore};
use crate::transaction::workspace::Workspace;

/// What cleanup did, and what it could not do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub reverted: Vec<DepotPath>,
    pub deleted_changelists: Vec<ChangelistId>,
    /// changelists listed as pending that turned out not to be
    pub anomalies: Vec<String>,
    pub workspace_deleted: bool,
    pub local_dir_removed: bool,
    pub warnings: Vec<String>,
}

impl CleanupReport {
    /// true when nothing was left behind
    pub fn is_clean(&self) -> bool {
        self.workspace_deleted
            && self.local_dir_removed
            && self.warnings.is_empty()
            && self.anomalies.is_empty()
    }

    fn warn(&mut self, workspace: &Workspace, message: String) {
        warn!(workspace = %workspace.name(), "{}", message);
        self.warnings.push(message);
    }
}

/// Tear down a workspace: revert, drop pending changelists, delete the
/// workspace, remove the local directory.
pub fn run<S: RemoteStore>(store: &S, workspace: &Workspace, lookback: usize) -> CleanupReport {
    let mut report = CleanupReport::default();
    let name = workspace.name();

    // 1. revert anything still open under the mapped root
    match store.revert(&workspace.view().depot_root) {
        Ok(reverted) => report.reverted = reverted,
        Err(e) => report.warn(workspace, format!("revert failed: {}", e)),
    }

    // 2. pending changelists, e.g. when every put was skipped
    match store.list_pending_changelists(workspace.owner(), name, lookback) {
        Ok(listed) => {
            for summary in listed {
                if summary.status != ChangelistStatus::Pending {
                    let anomaly = format!(
                        "change {} listed as pending but is {}",
                        summary.id, summary.status
                    );
                    warn!(workspace = %name, change = %summary.id, "{}", anomaly);
                    report.anomalies.push(anomaly);
                    continue;
                }
                match store.delete_pending_changelist(summary.id) {
                    Ok(()) => report.deleted_changelists.push(summary.id),
                    Err(e) => report.warn(
                        workspace,
                        format!("could not delete pending change {}: {}", summary.id, e),
                    ),
                }
            }
        }
        Err(e) => report.warn(workspace, format!("listing pending changes failed: {}", e)),
    }

    // 3. the workspace identity
    match store.delete_workspace(name) {
        Ok(()) => report.workspace_deleted = true,
        Err(e) => report.warn(workspace, format!("could not delete workspace: {}", e)),
    }

    // 4. the local staging directory
    match std::fs::remove_dir_all(workspace.root()) {
        Ok(()) => report.local_dir_removed = true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => report.local_dir_removed = true,
        Err(e) => report.warn(
            workspace,
            format!(
                "could not remove staging directory {}: {}",
                workspace.root().display(),
                e
            ),
        ),
    }

    debug!(
        workspace = %name,
        reverted = report.reverted.len(),
        deleted_changelists = report.deleted_changelists.len(),
        clean = report.is_clean(),
        "cleanup finished"
    );
    report
}
