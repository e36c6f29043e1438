//! The capability interface a dependency resolver publishes through.

use std::path::Path;

use crate::repository::error::RepositoryResult;
use crate::repository::resource::Resource;
use crate::store::DepotPath;
use crate::transaction::{CleanupReport, CommitOutcome, ModuleId, PutOutcome};

/// Artifact storage as seen by a resolver.
///
/// Reads go straight to the depot. Writes only happen inside a publish
/// transaction, identified by the handle `begin_transaction` returns.
pub trait ArtifactRepository {
    type Handle;

    /// Download `source` to a local file; returns the number of bytes written.
    fn get(&mut self, source: &DepotPath, destination: &Path) -> RepositoryResult<u64>;

    /// Stage `source` for publishing at `destination`.
    fn put(
        &mut self,
        handle: &Self::Handle,
        source: &Path,
        destination: &DepotPath,
        overwrite: bool,
    ) -> RepositoryResult<PutOutcome>;

    /// names of the files and directories directly under `parent`
    fn list(&mut self, parent: &DepotPath) -> RepositoryResult<Vec<String>>;

    fn resource(&mut self, path: &DepotPath) -> RepositoryResult<Resource>;

    fn begin_transaction(&mut self, module: ModuleId) -> RepositoryResult<Self::Handle>;

    fn commit(&mut self, handle: Self::Handle) -> RepositoryResult<CommitOutcome>;

    /// never fails; problems are logged
    fn abort(&mut self, handle: Self::Handle) -> Option<CleanupReport>;
}
