//! test support: a depot wrapper that injects failures and records calls.

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::store::depot::GitDepot;
use crate::store::error::{RemoteError, RemoteResult};
use crate::store::remote::RemoteStore;
use crate::store::types::{
    ChangelistId, ChangelistSummary, DepotPath, DirListing, FileResult, HeadState, WorkspaceName,
    WorkspaceSpec,
};

/// a fresh git depot in a temp dir, acting as `alice`
pub fn depot_fixture() -> (TempDir, GitDepot) {
    let dir = TempDir::new().unwrap();
    let depot = GitDepot::init(dir.path().join("depot.git"))
        .unwrap()
        .with_user("alice");
    (dir, depot)
}

/// failures to inject; each message becomes a `RemoteError`
#[derive(Debug, Default)]
pub struct Faults {
    pub no_user: bool,
    pub head_state: Option<String>,
    pub create_workspace: Option<String>,
    pub set_active: Option<String>,
    pub create_changelist: Option<String>,
    pub stage: Option<String>,
    pub submit: Option<String>,
    /// returned from submit instead of submitting
    pub submit_results: Option<Vec<FileResult>>,
    pub revert: Option<String>,
    pub list_changelists: Option<String>,
    pub delete_workspace: Option<String>,
    /// appended to every changelist listing
    pub extra_changelists: Vec<ChangelistSummary>,
}

/// wraps a `GitDepot`; healthy calls pass straight through
pub struct FaultyStore {
    inner: GitDepot,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<String>>,
}

impl FaultyStore {
    pub fn new(inner: GitDepot) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn configure(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.faults.lock());
    }

    pub fn inner(&self) -> &GitDepot {
        &self.inner
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == name).count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().push(name.to_string());
    }

    fn check(&self, name: &str, pick: impl FnOnce(&Faults) -> &Option<String>) -> RemoteResult<()> {
        self.record(name);
        match pick(&self.faults.lock()) {
            Some(message) => Err(RemoteError::Connection(message.clone())),
            None => Ok(()),
        }
    }
}

impl RemoteStore for FaultyStore {
    fn user(&self) -> Option<String> {
        if self.faults.lock().no_user {
            None
        } else {
            self.inner.user()
        }
    }

    fn head_state(&self, path: &DepotPath) -> RemoteResult<HeadState> {
        self.check("head_state", |f| &f.head_state)?;
        self.inner.head_state(path)
    }

    fn create_workspace(&self, spec: &WorkspaceSpec) -> RemoteResult<()> {
        self.check("create_workspace", |f| &f.create_workspace)?;
        self.inner.create_workspace(spec)
    }

    fn set_active_workspace(&self, name: &WorkspaceName) -> RemoteResult<()> {
        self.check("set_active_workspace", |f| &f.set_active)?;
        self.inner.set_active_workspace(name)
    }

    fn delete_workspace(&self, name: &WorkspaceName) -> RemoteResult<()> {
        self.check("delete_workspace", |f| &f.delete_workspace)?;
        self.inner.delete_workspace(name)
    }

    fn stage_add(&self, paths: &[DepotPath], change: ChangelistId) -> RemoteResult<()> {
        self.check("stage_add", |f| &f.stage)?;
        self.inner.stage_add(paths, change)
    }

    fn stage_edit(&self, paths: &[DepotPath], change: ChangelistId) -> RemoteResult<()> {
        self.check("stage_edit", |f| &f.stage)?;
        self.inner.stage_edit(paths, change)
    }

    fn sync_no_merge(&self, paths: &[DepotPath]) -> RemoteResult<()> {
        self.record("sync_no_merge");
        self.inner.sync_no_merge(paths)
    }

    fn revert(&self, subtree: &DepotPath) -> RemoteResult<Vec<DepotPath>> {
        self.check("revert", |f| &f.revert)?;
        self.inner.revert(subtree)
    }

    fn create_changelist(
        &self,
        description: &str,
        owner: &str,
        workspace: &WorkspaceName,
    ) -> RemoteResult<ChangelistId> {
        self.check("create_changelist", |f| &f.create_changelist)?;
        self.inner.create_changelist(description, owner, workspace)
    }

    fn refresh_changelist(&self, change: ChangelistId) -> RemoteResult<Vec<DepotPath>> {
        self.record("refresh_changelist");
        self.inner.refresh_changelist(change)
    }

    fn submit(&self, change: ChangelistId) -> RemoteResult<Vec<FileResult>> {
        self.check("submit", |f| &f.submit)?;
        if let Some(results) = self.faults.lock().submit_results.clone() {
            return Ok(results);
        }
        self.inner.submit(change)
    }

    fn list_pending_changelists(
        &self,
        owner: &str,
        workspace: &WorkspaceName,
        limit: usize,
    ) -> RemoteResult<Vec<ChangelistSummary>> {
        self.check("list_pending_changelists", |f| &f.list_changelists)?;
        let mut listed = self.inner.list_pending_changelists(owner, workspace, limit)?;
        listed.extend(self.faults.lock().extra_changelists.iter().cloned());
        Ok(listed)
    }

    fn delete_pending_changelist(&self, change: ChangelistId) -> RemoteResult<()> {
        self.record("delete_pending_changelist");
        self.inner.delete_pending_changelist(change)
    }

    fn read_file(&self, path: &DepotPath) -> RemoteResult<Vec<u8>> {
        self.record("read_file");
        self.inner.read_file(path)
    }

    fn list_dir(&self, path: &DepotPath) -> RemoteResult<DirListing> {
        self.record("list_dir");
        self.inner.list_dir(path)
    }
}
