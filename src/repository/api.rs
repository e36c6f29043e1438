//! Repository API - the caller-facing publish handle.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::PublishConfig;
use crate::repository::adapter::ArtifactRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::resource::Resource;
use crate::store::{DepotPath, GitDepot, RemoteStore};
use crate::transaction::{
    CleanupReport, CommitOutcome, ModuleId, PutOutcome, TransactionHandle, TransactionManager,
};

/// One logical connection to a depot.
///
/// Each handle guards its own transaction slot, so independent handles in
/// one process never see each other's transactions. Dropping a handle
/// with an active transaction aborts it.
pub struct PublishRepository<S: RemoteStore> {
    store: S,
    transactions: TransactionManager,
    resources: HashMap<DepotPath, Resource>,
}

impl PublishRepository<GitDepot> {
    /// Open the git-backed depot at `path`, as the user named by `DEPOT_USER`.
    pub fn open(path: impl AsRef<Path>, config: PublishConfig) -> RepositoryResult<Self> {
        Ok(Self::new(GitDepot::open_from_env(path)?, config))
    }
}

impl<S: RemoteStore> PublishRepository<S> {
    pub fn new(store: S, config: PublishConfig) -> Self {
        Self {
            store,
            transactions: TransactionManager::new(config),
            resources: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PublishConfig {
        self.transactions.config()
    }

    pub fn has_active_transaction(&self) -> bool {
        self.transactions.is_active()
    }

    // ==================== publishing ====================

    /// Begin publishing `module`. At most one transaction per handle.
    pub fn begin_transaction(&mut self, module: ModuleId) -> RepositoryResult<TransactionHandle> {
        Ok(self.transactions.begin(module)?)
    }

    /// Stage one file. The cached resource for `destination` is dropped
    /// whether or not the put succeeds.
    pub fn stage_put(
        &mut self,
        handle: &TransactionHandle,
        source: &Path,
        destination: &DepotPath,
        overwrite: bool,
    ) -> RepositoryResult<PutOutcome> {
        self.resources.remove(destination);
        Ok(self
            .transactions
            .put(&self.store, handle, source, destination, overwrite)?)
    }

    pub fn commit_transaction(
        &mut self,
        handle: TransactionHandle,
    ) -> RepositoryResult<CommitOutcome> {
        let outcome = self.transactions.commit(&self.store, handle)?;
        for file in &outcome.submitted {
            self.resources.remove(&file.path);
        }
        Ok(outcome)
    }

    /// Abort and clean up. Never fails; problems are logged.
    pub fn abort_transaction(&mut self, handle: TransactionHandle) -> Option<CleanupReport> {
        self.transactions.abort(&self.store, handle)
    }

    // ==================== reading ====================

    /// Download the head revision of `source` to `destination`.
    ///
    /// The file is written next to `destination` first and moved into place,
    /// so a failed download never leaves a partial file.
    pub fn get(&mut self, source: &DepotPath, destination: &Path) -> RepositoryResult<u64> {
        let content = self.store.read_file(source)?;

        let dir = match destination.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| RepositoryError::io(dir, e))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| RepositoryError::io(dir, e))?;
        tmp.write_all(&content)
            .map_err(|e| RepositoryError::io(tmp.path(), e))?;
        tmp.persist(destination)
            .map_err(|e| RepositoryError::io(destination, e.error))?;

        debug!(path = %source, to = %destination.display(), bytes = content.len(), "fetched file");
        Ok(content.len() as u64)
    }

    /// Names of the files and directories directly under `parent`.
    pub fn list(&mut self, parent: &DepotPath) -> RepositoryResult<Vec<String>> {
        Ok(self.store.list_dir(parent)?.names())
    }

    /// Head metadata for `path`, cached per path.
    pub fn resource(&mut self, path: &DepotPath) -> RepositoryResult<Resource> {
        if let Some(resource) = self.resources.get(path) {
            return Ok(resource.clone());
        }

        let head = self.store.head_state(path)?;
        let resource = Resource::from_head(path.clone(), &head);
        self.resources.insert(path.clone(), resource.clone());
        Ok(resource)
    }

    /// forget cached metadata for `path`
    pub fn invalidate(&mut self, path: &DepotPath) {
        self.resources.remove(path);
    }
}

impl<S: RemoteStore> ArtifactRepository for PublishRepository<S> {
    type Handle = TransactionHandle;

    fn get(&mut self, source: &DepotPath, destination: &Path) -> RepositoryResult<u64> {
        PublishRepository::get(self, source, destination)
    }

    fn put(
        &mut self,
        handle: &TransactionHandle,
        source: &Path,
        destination: &DepotPath,
        overwrite: bool,
    ) -> RepositoryResult<PutOutcome> {
        self.stage_put(handle, source, destination, overwrite)
    }

    fn list(&mut self, parent: &DepotPath) -> RepositoryResult<Vec<String>> {
        PublishRepository::list(self, parent)
    }

    fn resource(&mut self, path: &DepotPath) -> RepositoryResult<Resource> {
        PublishRepository::resource(self, path)
    }

    fn begin_transaction(&mut self, module: ModuleId) -> RepositoryResult<TransactionHandle> {
        PublishRepository::begin_transaction(self, module)
    }

    fn commit(&mut self, handle: TransactionHandle) -> RepositoryResult<CommitOutcome> {
        self.commit_transaction(handle)
    }

    fn abort(&mut self, handle: TransactionHandle) -> Option<CleanupReport> {
        self.abort_transaction(handle)
    }
}

impl<S: RemoteStore> Drop for PublishRepository<S> {
    fn drop(&mut self) {
        if !self.transactions.is_active() {
            return;
        }
        warn!("repository dropped with an active transaction; aborting");
        if let Some(report) = self.transactions.abort_active(&self.store) {
            if !report.is_clean() {
                warn!(warnings = report.warnings.len(), anomalies = report.anomalies.len(), "cleanup after drop was incomplete");
            }
        }
    }
}
