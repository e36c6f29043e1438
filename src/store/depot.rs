//! Git-backed depot.
//!
//! `GitDepot` implements `RemoteStore` on top of a bare git repository. file
//! content and history live in git (one commit per submitted changelist on
//! `refs/heads/main`); workspaces and changelists live in the registry file
//! beside it.
//!
//! Lock order is registry then repository. Nothing takes the registry lock
//! while holding the repository lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use git2::Repository;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::store::blob::{self, BlobId};
use crate::store::commit::{self, CommitBuilder, CommitMessage, FileRevision};
use crate::store::error::{RemoteError, RemoteResult};
use crate::store::refs::RefManager;
use crate::store::registry::{
    ChangelistRecord, OpenedFile, Registry, WorkspaceRecord, STATE_FILE,
};
use crate::store::remote::RemoteStore;
use crate::store::tree::{self, PathMutator};
use crate::store::types::{
    ChangelistId, ChangelistStatus, ChangelistSummary, CommitId, DepotPath, DirListing,
    FileAction, FileResult, GitSignature, HeadState, WorkspaceName, WorkspaceSpec,
};

/// environment variable naming the depot user for `open_from_env`
pub const DEPOT_USER_ENV: &str = "DEPOT_USER";

/// A depot handle.
///
/// Handles created with `connect` share the repository and registry but
/// each has its own active workspace, like separate server connections.
pub struct GitDepot {
    shared: Arc<Shared>,
    user: Option<String>,
    active: Mutex<Option<WorkspaceName>>,
}

struct Shared {
    repo: Mutex<Repository>,
    path: PathBuf,
    state_path: PathBuf,
    registry_lock: Mutex<()>,
}

impl GitDepot {
    /// Open an existing depot.
    pub fn open(path: impl AsRef<Path>) -> RemoteResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open_bare(path).map_err(|e| {
            RemoteError::Connection(format!("cannot open depot at {}: {}", path.display(), e))
        })?;

        if !RefManager::main_exists(&repo) {
            return Err(RemoteError::Connection(format!(
                "{} is not an initialized depot",
                path.display()
            )));
        }

        Ok(Self::from_repo(repo, path))
    }

    /// Initialize a new depot.
    pub fn init(path: impl AsRef<Path>) -> RemoteResult<Self> {
        let path = path.as_ref();
        let repo = Repository::init_bare(path)?;

        let initial = commit::create_initial_commit(&repo, &GitSignature::depot())?;
        RefManager::init_main_branch(&repo, initial)?;
        debug!(path = %path.display(), "initialized depot");

        Ok(Self::from_repo(repo, path))
    }

    /// Open or initialize a depot.
    pub fn open_or_init(path: impl AsRef<Path>) -> RemoteResult<Self> {
        let path = path.as_ref();
        if path.join("HEAD").exists() {
            Self::open(path)
        } else {
            Self::init(path)
        }
    }

    /// Open a depot and take the user from `DEPOT_USER`.
    pub fn open_from_env(path: impl AsRef<Path>) -> RemoteResult<Self> {
        let depot = Self::open(path)?;
        Ok(match std::env::var(DEPOT_USER_ENV) {
            Ok(user) if !user.trim().is_empty() => depot.with_user(user.trim()),
            _ => depot,
        })
    }

    fn from_repo(repo: Repository, path: &Path) -> Self {
        let state_path = repo.path().join(STATE_FILE);
        Self {
            shared: Arc::new(Shared {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
                state_path,
                registry_lock: Mutex::new(()),
            }),
            user: None,
            active: Mutex::new(None),
        }
    }

    /// Set the user this handle acts as.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// A new handle on the same depot with no active workspace.
    pub fn connect(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            user: self.user.clone(),
            active: Mutex::new(None),
        }
    }

    /// Get the depot path.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// the workspace staging calls currently act through
    pub fn active_workspace(&self) -> Option<WorkspaceName> {
        self.active.lock().clone()
    }

    fn with_repo<F, T>(&self, f: F) -> RemoteResult<T>
    where
        F: FnOnce(&Repository) -> RemoteResult<T>,
    {
        let repo = self.shared.repo.lock();
        f(&repo)
    }

    fn read_registry(&self) -> RemoteResult<Registry> {
        let _guard = self.shared.registry_lock.lock();
        Registry::load(&self.shared.state_path)
    }

    /// load, mutate and save the registry; nothing is saved if `f` fails
    fn update_registry<F, T>(&self, f: F) -> RemoteResult<T>
    where
        F: FnOnce(&mut Registry) -> RemoteResult<T>,
    {
        let _guard = self.shared.registry_lock.lock();
        let mut registry = Registry::load(&self.shared.state_path)?;
        let result = f(&mut registry)?;
        registry.save(&self.shared.state_path)?;
        Ok(result)
    }

    fn require_user(&self) -> RemoteResult<&str> {
        self.user
            .as_deref()
            .ok_or_else(|| RemoteError::Access("no depot user set for this handle".to_string()))
    }

    fn require_active(&self) -> RemoteResult<WorkspaceName> {
        self.active_workspace()
            .ok_or_else(|| RemoteError::request("no active workspace on this handle"))
    }

    fn head(repo: &Repository) -> RemoteResult<CommitId> {
        RefManager::head_commit(repo)?.ok_or_else(|| RemoteError::CorruptedData {
            path: RefManager::MAIN_REF.to_string(),
            reason: "depot has no main line".to_string(),
        })
    }

    fn head_state_in(repo: &Repository, path: &DepotPath) -> RemoteResult<HeadState> {
        let head = Self::head(repo)?;
        let history = commit::file_history(repo, head, path)?;
        Ok(match history.last() {
            Some(rev) => HeadState {
                last_action: Some(rev.action),
                head_time: Some(rev.time),
                size: rev.size,
                revision: Some(rev.revision),
            },
            None => HeadState::missing(),
        })
    }

    fn check_stageable(
        record: &WorkspaceRecord,
        path: &DepotPath,
    ) -> RemoteResult<()> {
        if !record.spec.view.contains(path) {
            return Err(RemoteError::request(format!(
                "{} - file(s) not in client view",
                path
            )));
        }
        if let Some(opened) = record.opened.get(path) {
            return Err(RemoteError::request(format!(
                "{} - already opened for {} in change {}",
                path, opened.action, opened.change
            )));
        }
        Ok(())
    }

    fn check_open_change(
        registry: &Registry,
        change: ChangelistId,
        workspace: &WorkspaceName,
    ) -> RemoteResult<()> {
        let record = registry.changelist(change)?;
        if record.status != ChangelistStatus::Pending {
            return Err(RemoteError::request(format!(
                "change {} is already submitted",
                change
            )));
        }
        if &record.workspace != workspace {
            return Err(RemoteError::request(format!(
                "change {} belongs to workspace {}",
                change, record.workspace
            )));
        }
        Ok(())
    }

    // ==================== Administrative Operations ====================

    /// Delete a file at head as its own commit.
    pub fn delete_file(&self, path: &DepotPath) -> RemoteResult<CommitId> {
        let user = self.require_user()?.to_string();
        self.with_repo(|repo| {
            let head = Self::head(repo)?;
            let tree = commit::get_tree_at_commit(repo, head)?;
            let mut mutator = PathMutator::from_tree(repo, &tree);
            mutator.remove(path)?;
            let new_tree = mutator.write()?;

            let commit_id = CommitBuilder::new(repo)
                .tree(new_tree)
                .parent(head)
                .message(CommitMessage::delete(path))
                .signature(GitSignature::for_user(&user))
                .commit()?;
            RefManager::update_main_if_unchanged(repo, head, commit_id)?;
            info!(path = %path, user = %user, "deleted depot file");
            Ok(commit_id)
        })
    }

    /// Every revision of a file, oldest first.
    pub fn file_history(&self, path: &DepotPath) -> RemoteResult<Vec<FileRevision>> {
        self.with_repo(|repo| commit::file_history(repo, Self::head(repo)?, path))
    }

    /// Content of a specific revision.
    pub fn read_revision(&self, path: &DepotPath, revision: u32) -> RemoteResult<Vec<u8>> {
        self.with_repo(|repo| {
            let history = commit::file_history(repo, Self::head(repo)?, path)?;
            let blob = history
                .iter()
                .find(|r| r.revision == revision)
                .and_then(|r| r.blob)
                .ok_or_else(|| RemoteError::NotFound(path.clone()))?;
            blob::read_blob(repo, blob)
        })
    }

    /// Names of all registered workspaces.
    pub fn list_workspaces(&self) -> RemoteResult<Vec<WorkspaceName>> {
        Ok(self.read_registry()?.workspaces.into_keys().collect())
    }

    /// Summary of one changelist, whatever its status.
    pub fn describe_changelist(&self, change: ChangelistId) -> RemoteResult<ChangelistSummary> {
        Ok(self.read_registry()?.changelist(change)?.summary())
    }
}

/// note on files that passed validation in a change that was rejected
const NOT_SUBMITTED: &str = "not submitted: change rejected";

enum SubmitPlan {
    Rejected(Vec<FileResult>),
    Committed {
        commit: CommitId,
        files: Vec<Validated>,
    },
}

/// an opened file that passed submit validation
struct Validated {
    path: DepotPath,
    blob: BlobId,
    result: FileResult,
    new_revision: u32,
}

impl RemoteStore for GitDepot {
    fn user(&self) -> Option<String> {
        self.user.clone()
    }

    fn head_state(&self, path: &DepotPath) -> RemoteResult<HeadState> {
        self.with_repo(|repo| Self::head_state_in(repo, path))
    }

    fn create_workspace(&self, spec: &WorkspaceSpec) -> RemoteResult<()> {
        self.require_user()?;
        self.update_registry(|registry| {
            if registry.workspaces.contains_key(&spec.name) {
                return Err(RemoteError::request(format!(
                    "workspace {} already exists",
                    spec.name
                )));
            }
            registry
                .workspaces
                .insert(spec.name.clone(), WorkspaceRecord::new(spec.clone()));
            Ok(())
        })?;
        debug!(workspace = %spec.name, view = %spec.view, "created workspace");
        Ok(())
    }

    fn set_active_workspace(&self, name: &WorkspaceName) -> RemoteResult<()> {
        self.read_registry()?.workspace(name)?;
        *self.active.lock() = Some(name.clone());
        Ok(())
    }

    fn delete_workspace(&self, name: &WorkspaceName) -> RemoteResult<()> {
        self.update_registry(|registry| {
            let record = registry.workspace(name)?;
            if !record.opened.is_empty() {
                return Err(RemoteError::request(format!(
                    "workspace {} has {} open file(s); revert them first",
                    name,
                    record.opened.len()
                )));
            }
            if let Some(pending) = registry.pending_for(name).next() {
                return Err(RemoteError::request(format!(
                    "workspace {} has pending change {}",
                    name, pending.id
                )));
            }
            registry.workspaces.remove(name);
            Ok(())
        })?;

        let mut active = self.active.lock();
        if active.as_ref() == Some(name) {
            *active = None;
        }
        debug!(workspace = %name, "deleted workspace");
        Ok(())
    }

    fn stage_add(&self, paths: &[DepotPath], change: ChangelistId) -> RemoteResult<()> {
        let workspace = self.require_active()?;
        self.update_registry(|registry| {
            Self::check_open_change(registry, change, &workspace)?;
            let record = registry.workspace(&workspace)?;

            for path in paths {
                Self::check_stageable(record, path)?;
                if self.head_state(path)?.exists() {
                    return Err(RemoteError::request(format!(
                        "{} - can't add existing file",
                        path
                    )));
                }
                let on_disk = record.spec.local_path(path).is_some_and(|p| p.is_file());
                if !on_disk {
                    return Err(RemoteError::request(format!(
                        "{} - file(s) not on client",
                        path
                    )));
                }
            }

            let record = registry.workspace_mut(&workspace)?;
            for path in paths {
                record.opened.insert(
                    path.clone(),
                    OpenedFile {
                        action: FileAction::Add,
                        change,
                    },
                );
            }
            Ok(())
        })
    }

    fn stage_edit(&self, paths: &[DepotPath], change: ChangelistId) -> RemoteResult<()> {
        let workspace = self.require_active()?;
        self.update_registry(|registry| {
            Self::check_open_change(registry, change, &workspace)?;
            let record = registry.workspace(&workspace)?;

            for path in paths {
                Self::check_stageable(record, path)?;
                if !self.head_state(path)?.exists() {
                    return Err(RemoteError::NotFound(path.clone()));
                }
                if !record.have.contains_key(path) {
                    return Err(RemoteError::request(format!(
                        "{} - file(s) not on client; sync first",
                        path
                    )));
                }
            }

            let record = registry.workspace_mut(&workspace)?;
            for path in paths {
                record.opened.insert(
                    path.clone(),
                    OpenedFile {
                        action: FileAction::Edit,
                        change,
                    },
                );
            }
            Ok(())
        })
    }

    fn sync_no_merge(&self, paths: &[DepotPath]) -> RemoteResult<()> {
        let workspace = self.require_active()?;
        self.update_registry(|registry| {
            let mut synced = Vec::with_capacity(paths.len());
            {
                let record = registry.workspace(&workspace)?;
                for path in paths {
                    if !record.spec.view.contains(path) {
                        return Err(RemoteError::request(format!(
                            "{} - file(s) not in client view",
                            path
                        )));
                    }
                    let head = self.head_state(path)?;
                    match head.revision {
                        Some(revision) if head.exists() => synced.push((path.clone(), revision)),
                        _ => return Err(RemoteError::NotFound(path.clone())),
                    }
                }
            }

            let record = registry.workspace_mut(&workspace)?;
            record.have.extend(synced);
            Ok(())
        })
    }

    fn revert(&self, subtree: &DepotPath) -> RemoteResult<Vec<DepotPath>> {
        let workspace = self.require_active()?;
        let reverted = self.update_registry(|registry| {
            let record = registry.workspace_mut(&workspace)?;
            let reverted: Vec<DepotPath> = record
                .opened
                .keys()
                .filter(|p| *p == subtree || p.is_under(subtree))
                .cloned()
                .collect();
            for path in &reverted {
                record.opened.remove(path);
            }
            Ok(reverted)
        })?;
        debug!(workspace = %workspace, count = reverted.len(), "reverted open files");
        Ok(reverted)
    }

    fn create_changelist(
        &self,
        description: &str,
        owner: &str,
        workspace: &WorkspaceName,
    ) -> RemoteResult<ChangelistId> {
        self.require_user()?;
        let id = self.update_registry(|registry| {
            registry.workspace(workspace)?;
            let id = registry.allocate_change();
            registry.changelists.insert(
                id,
                ChangelistRecord {
                    id,
                    owner: owner.to_string(),
                    workspace: workspace.clone(),
                    description: description.to_string(),
                    status: ChangelistStatus::Pending,
                    created_at: Utc::now(),
                    submitted_at: None,
                    commit: None,
                },
            );
            Ok(id)
        })?;
        debug!(workspace = %workspace, change = %id, "created changelist");
        Ok(id)
    }

    fn refresh_changelist(&self, change: ChangelistId) -> RemoteResult<Vec<DepotPath>> {
        let registry = self.read_registry()?;
        Ok(registry
            .opened_in(change)?
            .into_iter()
            .map(|(path, _)| path)
            .collect())
    }

    fn submit(&self, change: ChangelistId) -> RemoteResult<Vec<FileResult>> {
        self.require_user()?;
        self.update_registry(|registry| {
            let record = registry.changelist(change)?.clone();
            if record.status != ChangelistStatus::Pending {
                return Err(RemoteError::request(format!(
                    "change {} is already submitted",
                    change
                )));
            }
            let files = registry.opened_in(change)?;
            if files.is_empty() {
                return Err(RemoteError::request(format!(
                    "change {} has no files to submit",
                    change
                )));
            }
            let workspace = registry.workspace(&record.workspace)?;

            let plan = self.with_repo(|repo| {
                let head = Self::head(repo)?;
                let tree = commit::get_tree_at_commit(repo, head)?;
                let mut mutator = PathMutator::from_tree(repo, &tree);

                let mut accepted = Vec::with_capacity(files.len());
                let mut rejected = Vec::new();
                for (path, action) in &files {
                    match validate_file(repo, &tree, workspace, path, *action) {
                        Ok(file) => {
                            mutator.upsert(path, file.blob)?;
                            accepted.push(file);
                        }
                        Err(message) => rejected.push(FileResult::error(path.clone(), message)),
                    }
                }

                if !rejected.is_empty() {
                    let mut results: Vec<FileResult> = accepted
                        .into_iter()
                        .map(|file| FileResult::info(file.path, NOT_SUBMITTED))
                        .collect();
                    results.extend(rejected);
                    return Ok(SubmitPlan::Rejected(results));
                }

                let new_tree = mutator.write()?;
                let commit_id = CommitBuilder::new(repo)
                    .tree(new_tree)
                    .parent(head)
                    .message(CommitMessage::submit(change, &record.description))
                    .signature(GitSignature::for_user(&record.owner))
                    .commit()?;
                RefManager::update_main_if_unchanged(repo, head, commit_id)?;

                Ok(SubmitPlan::Committed {
                    commit: commit_id,
                    files: accepted,
                })
            })?;

            let (commit_id, accepted) = match plan {
                SubmitPlan::Committed { commit, files } => (commit, files),
                SubmitPlan::Rejected(results) => {
                    // nothing reached main; the change stays pending with its files open
                    warn!(change = %change, "submit rejected");
                    return Ok(results);
                }
            };

            let mut results = Vec::with_capacity(accepted.len());
            let mut have = BTreeMap::new();
            for file in accepted {
                have.insert(file.path, file.new_revision);
                results.push(file.result);
            }

            let ws = registry.workspace_mut(&record.workspace)?;
            for path in have.keys() {
                ws.opened.remove(path);
            }
            ws.have.extend(have);

            let entry = registry.changelist_mut(change)?;
            entry.status = ChangelistStatus::Submitted;
            entry.submitted_at = Some(Utc::now());
            entry.commit = Some(commit_id.to_string());

            info!(change = %change, commit = %commit_id.short(), files = results.len(), "submitted change");
            Ok(results)
        })
    }

    fn list_pending_changelists(
        &self,
        owner: &str,
        workspace: &WorkspaceName,
        limit: usize,
    ) -> RemoteResult<Vec<ChangelistSummary>> {
        let registry = self.read_registry()?;
        Ok(registry
            .pending_for(workspace)
            .filter(|c| c.owner == owner)
            .rev()
            .take(limit)
            .map(ChangelistRecord::summary)
            .collect())
    }

    fn delete_pending_changelist(&self, change: ChangelistId) -> RemoteResult<()> {
        self.update_registry(|registry| {
            let record = registry.changelist(change)?;
            if record.status != ChangelistStatus::Pending {
                return Err(RemoteError::request(format!(
                    "change {} is {}, only pending changes can be deleted",
                    change, record.status
                )));
            }
            let open = registry.opened_in(change)?.len();
            if open > 0 {
                return Err(RemoteError::request(format!(
                    "change {} has {} open file(s) associated with it",
                    change, open
                )));
            }
            registry.changelists.remove(&change);
            Ok(())
        })?;
        debug!(change = %change, "deleted pending changelist");
        Ok(())
    }

    fn read_file(&self, path: &DepotPath) -> RemoteResult<Vec<u8>> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, Self::head(repo)?)?;
            let blob_id =
                tree::blob_id_at(&tree, path)?.ok_or_else(|| RemoteError::NotFound(path.clone()))?;
            blob::read_blob(repo, blob_id)
        })
    }

    fn list_dir(&self, path: &DepotPath) -> RemoteResult<DirListing> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, Self::head(repo)?)?;
            tree::list_dir(repo, &tree, path)
        })
    }
}

/// check one opened file against head and load its local content
///
/// the error string becomes the file's submit message.
fn validate_file(
    repo: &Repository,
    head_tree: &git2::Tree<'_>,
    workspace: &WorkspaceRecord,
    path: &DepotPath,
    action: FileAction,
) -> Result<Validated, String> {
    let head = GitDepot::head_state_in(repo, path).map_err(|e| e.to_string())?;
    let head_revision = head.revision.unwrap_or(0);

    match action {
        FileAction::Add if head.exists() => {
            return Err("file was added by another change; can't add existing file".to_string())
        }
        FileAction::Edit if !head.exists() => {
            return Err("file was deleted at head; can't edit".to_string())
        }
        FileAction::Edit if workspace.have.get(path) != Some(&head_revision) => {
            return Err(format!(
                "out of date: have #{}, head is #{}; sync and resolve",
                workspace.have.get(path).copied().unwrap_or(0),
                head_revision
            ))
        }
        _ => {}
    }

    let local = workspace
        .spec
        .local_path(path)
        .ok_or_else(|| "file(s) not in client view".to_string())?;
    let blob = blob::write_blob_from_file(repo, &local).map_err(|e| e.to_string())?;

    let head_blob = tree::blob_id_at(head_tree, path).map_err(|e| e.to_string())?;
    if head_blob == Some(blob) {
        return Ok(Validated {
            path: path.clone(),
            blob,
            result: FileResult::info(path.clone(), "content identical to head revision"),
            new_revision: head_revision,
        });
    }

    Ok(Validated {
        path: path.clone(),
        blob,
        result: FileResult::valid(path.clone()),
        new_revision: head_revision + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        depot: GitDepot,
        spec: WorkspaceSpec,
    }

    fn path(s: &str) -> DepotPath {
        DepotPath::new(s).unwrap()
    }

    fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let depot = GitDepot::init(dir.path().join("depot.git"))
            .unwrap()
            .with_user("alice");

        let name = WorkspaceName::new("ws_alice_1").unwrap();
        let spec = WorkspaceSpec {
            view: ViewMapping::for_destination(&path("//depot/acme/w/1.0/w.jar"), name.clone())
                .unwrap(),
            name: name.clone(),
            owner: "alice".to_string(),
            root: dir.path().join("ws"),
            created_at: Utc::now(),
        };
        std::fs::create_dir_all(&spec.root).unwrap();
        depot.create_workspace(&spec).unwrap();
        depot.set_active_workspace(&name).unwrap();

        Fixture {
            _dir: dir,
            depot,
            spec,
        }
    }

    impl Fixture {
        fn write_local(&self, p: &DepotPath, content: &str) {
            let local = self.spec.local_path(p).unwrap();
            std::fs::create_dir_all(local.parent().unwrap()).unwrap();
            std::fs::write(local, content).unwrap();
        }

        fn change(&self) -> ChangelistId {
            self.depot
                .create_changelist("Publishing acme#w;1.0", "alice", &self.spec.name)
                .unwrap()
        }

        /// add and submit a file in its own change
        fn publish(&self, p: &DepotPath, content: &str) -> Vec<FileResult> {
            self.write_local(p, content);
            let change = self.change();
            self.depot.stage_add(&[p.clone()], change).unwrap();
            self.depot.submit(change).unwrap()
        }
    }

    use crate::store::types::{SubmitStatus, ViewMapping};

    #[test]
    fn test_open_uninitialized_path_fails() {
        let dir = TempDir::new().unwrap();
        let result = GitDepot::open(dir.path().join("missing"));
        assert!(matches!(result, Err(RemoteError::Connection(_))));
    }

    #[test]
    fn test_open_or_init_reopens() {
        let dir = TempDir::new().unwrap();
        let location = dir.path().join("depot.git");
        GitDepot::open_or_init(&location).unwrap();
        let reopened = GitDepot::open_or_init(&location).unwrap();
        assert_eq!(reopened.path(), location.as_path());
    }

    #[test]
    fn test_head_state_of_unknown_file() {
        let fx = setup();
        let state = fx.depot.head_state(&path("//depot/acme/none.jar")).unwrap();
        assert!(!state.exists());
        assert_eq!(state.last_action, None);
    }

    #[test]
    fn test_add_and_submit() {
        let fx = setup();
        let jar = path("//depot/acme/w/1.0/w.jar");

        let results = fx.publish(&jar, "jar-v1");
        assert_eq!(results, vec![FileResult::valid(jar.clone())]);

        let state = fx.depot.head_state(&jar).unwrap();
        assert!(state.exists());
        assert_eq!(state.last_action, Some(FileAction::Add));
        assert_eq!(state.revision, Some(1));
        assert_eq!(state.size, Some(6));
        assert_eq!(fx.depot.read_file(&jar).unwrap(), b"jar-v1");
    }

    #[test]
    fn test_submit_is_atomic_across_files() {
        let fx = setup();
        let jar = path("//depot/acme/w/1.0/w.jar");
        let ivy = path("//depot/acme/w/1.0/ivy.xml");
        fx.write_local(&jar, "jar");
        fx.write_local(&ivy, "ivy");

        let change = fx.change();
        fx.depot.stage_add(&[jar.clone(), ivy.clone()], change).unwrap();
        assert_eq!(fx.depot.refresh_changelist(change).unwrap().len(), 2);

        let results = fx.depot.submit(change).unwrap();
        assert!(results.iter().all(|r| r.status == SubmitStatus::Valid));

        let history = fx.depot.file_history(&jar).unwrap();
        let other = fx.depot.file_history(&ivy).unwrap();
        assert_eq!(history[0].commit, other[0].commit);
        assert_eq!(
            fx.depot.describe_changelist(change).unwrap().status,
            ChangelistStatus::Submitted
        );
        assert!(fx.depot.refresh_changelist(change).unwrap().is_empty());
    }

    #[test]
    fn test_add_existing_file_rejected() {
        let fx = setup();
        let jar = path("//depot/acme/w/1.0/w.jar");
        fx.publish(&jar, "v1");

        let change = fx.change();
        let result = fx.depot.stage_add(&[jar], change);
        assert!(matches!(result, Err(RemoteError::Request(_))));
    }

    #[test]
    fn test_add_requires_local_file() {
        let fx = setup();
        let change = fx.change();
        let result = fx.depot.stage_add(&[path("//depot/acme/w/1.0/w.jar")], change);
        assert!(matches!(result, Err(RemoteError::Request(_))));
    }

    #[test]
    fn test_path_outside_view_rejected() {
        let fx = setup();
        let change = fx.change();
        let result = fx.depot.stage_add(&[path("//depot/other/w.jar")], change);
        assert!(matches!(result, Err(RemoteError::Request(_))));
    }

    #[test]
    fn test_double_open_rejected() {
        let fx = setup();
        let jar = path("//depot/acme/w/1.0/w.jar");
        fx.write_local(&jar, "v1");
        let change = fx.change();
        fx.depot.stage_add(&[jar.clone()], change).unwrap();

        let result = fx.depot.stage_add(&[jar], change);
        assert!(matches!(result, Err(RemoteError::Request(_))));
    }

    #[test]
    fn test_edit_requires_sync() {
        let fx = setup();
        let jar = path("//depot/acme/w/1.0/w.jar");
        fx.publish(&jar, "v1");

        let other = fx.depot.connect();
        let name = WorkspaceName::new("ws_alice_2").unwrap();
        let mut spec = fx.spec.clone();
        spec.name = name.clone();
        spec.view.workspace = name.clone();
        spec.root = fx.spec.root.with_file_name("ws2");
        other.create_workspace(&spec).unwrap();
        other.set_active_workspace(&name).unwrap();

        let change = other
            .create_changelist("edit", "alice", &name)
            .unwrap();
        let result = other.stage_edit(&[jar.clone()], change);
        assert!(matches!(result, Err(RemoteError::Request(_))));

        other.sync_no_merge(&[jar.clone()]).unwrap();
        other.stage_edit(&[jar], change).unwrap();
    }

    #[test]
    fn test_edit_and_unchanged_content() {
        let fx = setup();
        let jar = path("//depot/acme/w/1.0/w.jar");
        fx.publish(&jar, "v1");

        // edit with new content
        fx.depot.sync_no_merge(&[jar.clone()]).unwrap();
        fx.write_local(&jar, "v2");
        let change = fx.change();
        fx.depot.stage_edit(&[jar.clone()], change).unwrap();
        let results = fx.depot.submit(change).unwrap();
        assert_eq!(results[0].status, SubmitStatus::Valid);
        assert_eq!(fx.depot.head_state(&jar).unwrap().revision, Some(2));

        // edit with identical content
        let change = fx.change();
        fx.depot.stage_edit(&[jar.clone()], change).unwrap();
        let results = fx.depot.submit(change).unwrap();
        assert!(matches!(results[0].status, SubmitStatus::Info { .. }));
        assert_eq!(fx.depot.head_state(&jar).unwrap().revision, Some(2));

        assert_eq!(fx.depot.read_revision(&jar, 1).unwrap(), b"v1");
        assert_eq!(fx.depot.read_revision(&jar, 2).unwrap(), b"v2");
        assert!(fx.depot.read_revision(&jar, 3).unwrap_err().is_not_found());
    }

    #[test]
    fn test_out_of_date_edit_rejects_whole_change() {
        let fx = setup();
        let jar = path("//depot/acme/w/1.0/w.jar");
        let ivy = path("//depot/acme/w/1.0/ivy.xml");
        fx.publish(&jar, "v1");

        // stage an edit and an add in one change
        fx.depot.sync_no_merge(&[jar.clone()]).unwrap();
        fx.write_local(&jar, "mine");
        fx.write_local(&ivy, "ivy");
        let change = fx.change();
        fx.depot.stage_edit(&[jar.clone()], change).unwrap();
        fx.depot.stage_add(&[ivy.clone()], change).unwrap();

        // someone else bumps the head revision
        fx.depot.delete_file(&jar).unwrap();

        let results = fx.depot.submit(change).unwrap();
        assert!(results
            .iter()
            .any(|r| r.path == jar && matches!(r.status, SubmitStatus::Error { .. })));
        // the file that passed validation is not reported as submitted
        let ivy_result = results.iter().find(|r| r.path == ivy).unwrap();
        assert_eq!(
            ivy_result.status,
            SubmitStatus::Info {
                message: NOT_SUBMITTED.to_string()
            }
        );

        // nothing was committed; the change is still pending with its files
        assert!(!fx.depot.head_state(&ivy).unwrap().exists());
        assert_eq!(
            fx.depot.describe_changelist(change).unwrap().status,
            ChangelistStatus::Pending
        );
        assert_eq!(fx.depot.refresh_changelist(change).unwrap().len(), 2);
    }

    #[test]
    fn test_submit_empty_change_rejected() {
        let fx = setup();
        let change = fx.change();
        assert!(matches!(
            fx.depot.submit(change),
            Err(RemoteError::Request(_))
        ));
    }

    #[test]
    fn test_delete_file_and_re_add() {
        let fx = setup();
        let jar = path("//depot/acme/w/1.0/w.jar");
        fx.publish(&jar, "v1");
        fx.depot.delete_file(&jar).unwrap();

        let state = fx.depot.head_state(&jar).unwrap();
        assert_eq!(state.last_action, Some(FileAction::Delete));
        assert!(!state.exists());
        assert!(fx.depot.read_file(&jar).unwrap_err().is_not_found());

        // a deleted file can be added again
        let results = fx.publish(&jar, "v2");
        assert_eq!(results[0].status, SubmitStatus::Valid);
        assert_eq!(fx.depot.head_state(&jar).unwrap().revision, Some(3));
    }

    #[test]
    fn test_revert_and_cleanup_rules() {
        let fx = setup();
        let jar = path("//depot/acme/w/1.0/w.jar");
        fx.write_local(&jar, "v1");
        let change = fx.change();
        fx.depot.stage_add(&[jar.clone()], change).unwrap();

        // open files block deleting the change and the workspace
        assert!(fx.depot.delete_pending_changelist(change).is_err());
        assert!(fx.depot.delete_workspace(&fx.spec.name).is_err());

        let reverted = fx.depot.revert(&fx.spec.view.depot_root).unwrap();
        assert_eq!(reverted, vec![jar]);

        // the pending change still blocks the workspace
        assert!(fx.depot.delete_workspace(&fx.spec.name).is_err());

        let pending = fx
            .depot
            .list_pending_changelists("alice", &fx.spec.name, 1000)
            .unwrap();
        assert_eq!(pending.len(), 1);
        fx.depot.delete_pending_changelist(change).unwrap();

        fx.depot.delete_workspace(&fx.spec.name).unwrap();
        assert!(fx.depot.list_workspaces().unwrap().is_empty());
        assert_eq!(fx.depot.active_workspace(), None);
    }

    #[test]
    fn test_submitted_change_cannot_be_deleted() {
        let fx = setup();
        let jar = path("//depot/acme/w/1.0/w.jar");
        fx.write_local(&jar, "v1");
        let change = fx.change();
        fx.depot.stage_add(&[jar], change).unwrap();
        fx.depot.submit(change).unwrap();

        assert!(matches!(
            fx.depot.delete_pending_changelist(change),
            Err(RemoteError::Request(_))
        ));
        assert!(fx
            .depot
            .list_pending_changelists("alice", &fx.spec.name, 1000)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_list_dir() {
        let fx = setup();
        fx.publish(&path("//depot/acme/w/1.0/w.jar"), "jar");
        fx.publish(&path("//depot/acme/w/1.0/ivy.xml"), "ivy");
        fx.publish(&path("//depot/acme/w/2.0/w.jar"), "jar2");

        let versions = fx.depot.list_dir(&path("//depot/acme/w")).unwrap();
        assert_eq!(versions.dirs, vec!["1.0".to_string(), "2.0".to_string()]);

        let mut files = fx.depot.list_dir(&path("//depot/acme/w/1.0")).unwrap().files;
        files.sort();
        assert_eq!(files, vec!["ivy.xml".to_string(), "w.jar".to_string()]);
    }

    #[test]
    fn test_staging_needs_active_workspace() {
        let fx = setup();
        let fresh = fx.depot.connect();
        let change = fx.change();
        let result = fresh.stage_add(&[path("//depot/acme/w/1.0/w.jar")], change);
        assert!(matches!(result, Err(RemoteError::Request(_))));
    }

    #[test]
    fn test_anonymous_handle_cannot_create_workspace() {
        let fx = setup();
        let anonymous = GitDepot::open(fx.depot.path()).unwrap();
        assert_eq!(anonymous.user(), None);

        let mut spec = fx.spec.clone();
        spec.name = WorkspaceName::new("ws_anon").unwrap();
        assert!(matches!(
            anonymous.create_workspace(&spec),
            Err(RemoteError::Access(_))
        ));
    }
}
