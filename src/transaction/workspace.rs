//! Ephemeral workspace provisioning.
//!
//! Every transaction gets its own workspace: a unique name, a local staging
//! directory and a view that maps only the subtree being published. The
//! workspace is never reused.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::config::PublishConfig;
use crate::store::{
    ChangelistId, DepotPath, RemoteError, RemoteStore, ViewMapping, WorkspaceName, WorkspaceSpec,
};
use crate::transaction::error::{PublishError, PublishResult};
use crate::transaction::module::ModuleId;

/// A provisioned workspace owned by one transaction.
#[derive(Debug, Clone)]
pub struct Workspace {
    spec: WorkspaceSpec,
}

impl Workspace {
    pub fn name(&self) -> &WorkspaceName {
        &self.spec.name
    }

    pub fn owner(&self) -> &str {
        &self.spec.owner
    }

    /// local staging directory
    pub fn root(&self) -> &Path {
        &self.spec.root
    }

    pub fn view(&self) -> &ViewMapping {
        &self.spec.view
    }

    /// local mirror of a depot path, if the view covers it
    pub fn local_path(&self, destination: &DepotPath) -> Option<PathBuf> {
        self.spec.local_path(destination)
    }

    pub fn spec(&self) -> &WorkspaceSpec {
        &self.spec
    }
}

/// `<prefix><owner>_<token>`
pub fn workspace_name(prefix: &str, owner: &str, token: Ulid) -> Result<WorkspaceName, String> {
    let raw = format!(
        "{}{}_{}",
        prefix,
        WorkspaceName::sanitize(owner),
        token.to_string().to_lowercase()
    );
    WorkspaceName::new(raw).map_err(|e| e.to_string())
}

/// Create the workspace and the transaction's changelist.
///
/// On failure everything created so far is removed again (best effort)
/// before the error is returned.
pub fn provision<S: RemoteStore>(
    store: &S,
    first_destination: &DepotPath,
    token: Ulid,
    module: &ModuleId,
    config: &PublishConfig,
) -> PublishResult<(Workspace, ChangelistId)> {
    let owner = store.user().ok_or_else(|| PublishError::WorkspaceInit {
        path: config.staging_root.clone(),
        reason: "the depot did not report a user to own the workspace".to_string(),
    })?;

    let name = workspace_name(&config.workspace_prefix, &owner, token).map_err(|reason| {
        PublishError::WorkspaceInit {
            path: config.staging_root.clone(),
            reason,
        }
    })?;
    let view =
        ViewMapping::for_destination(first_destination, name.clone()).map_err(RemoteError::from)?;

    let root = config.staging_root.join(name.as_str());
    std::fs::create_dir_all(&root).map_err(|e| PublishError::WorkspaceInit {
        path: root.clone(),
        reason: e.to_string(),
    })?;

    let spec = WorkspaceSpec {
        name: name.clone(),
        owner: owner.clone(),
        root: root.clone(),
        view,
        created_at: Utc::now(),
    };

    if let Err(e) = store.create_workspace(&spec) {
        unwind(store, None, &root);
        return Err(e.into());
    }

    if let Err(e) = store.set_active_workspace(&name) {
        unwind(store, Some(&name), &root);
        return Err(e.into());
    }

    let change = match store.create_changelist(&module.publish_description(), &owner, &name) {
        Ok(change) => change,
        Err(e) => {
            unwind(store, Some(&name), &root);
            return Err(e.into());
        }
    };

    debug!(
        workspace = %name,
        change = %change,
        view = %spec.view,
        root = %root.display(),
        "provisioned workspace"
    );
    Ok((Workspace { spec }, change))
}

fn unwind<S: RemoteStore>(store: &S, registered: Option<&WorkspaceName>, root: &Path) {
    if let Some(name) = registered {
        if let Err(e) = store.delete_workspace(name) {
            warn!(workspace = %name, error = %e, "could not delete half-provisioned workspace");
        }
    }
    if let Err(e) = std::fs::remove_dir_all(root) {
        warn!(root = %root.display(), error = %e, "could not remove staging directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{depot_fixture, FaultyStore};

    fn module() -> ModuleId {
        ModuleId::new("acme", "widgets", "1.0")
    }

    fn dest() -> DepotPath {
        DepotPath::new("//depot/acme/widgets/1.0/widgets.jar").unwrap()
    }

    #[test]
    fn test_workspace_name_format() {
        let token = Ulid::new();
        let name = workspace_name("depotpub_", "bob@corp", token).unwrap();
        assert_eq!(
            name.as_str(),
            format!("depotpub_bob-corp_{}", token.to_string().to_lowercase())
        );
        assert!(workspace_name("bad prefix ", "bob", token).is_err());
    }

    #[test]
    fn test_provision_registers_and_activates() {
        let (dir, depot) = depot_fixture();
        let config = PublishConfig::new(dir.path().join("staging"));

        let (workspace, change) =
            provision(&depot, &dest(), Ulid::new(), &module(), &config).unwrap();

        assert!(workspace.root().is_dir());
        assert!(workspace.root().starts_with(dir.path().join("staging")));
        assert_eq!(workspace.owner(), "alice");
        assert_eq!(workspace.view().depot_side(), "//depot/acme/...");
        assert_eq!(depot.active_workspace().as_ref(), Some(workspace.name()));
        assert_eq!(depot.list_workspaces().unwrap(), vec![workspace.name().clone()]);

        let summary = depot.describe_changelist(change).unwrap();
        assert_eq!(summary.description, "Publishing acme#widgets;1.0");
        assert_eq!(&summary.workspace, workspace.name());
    }

    #[test]
    fn test_each_provision_is_unique() {
        let (dir, depot) = depot_fixture();
        let config = PublishConfig::new(dir.path());
        let (a, _) = provision(&depot, &dest(), Ulid::new(), &module(), &config).unwrap();
        let (b, _) = provision(&depot, &dest(), Ulid::new(), &module(), &config).unwrap();
        assert_ne!(a.name(), b.name());
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_unknown_owner() {
        let (dir, depot) = depot_fixture();
        let store = FaultyStore::new(depot);
        store.configure(|f| f.no_user = true);

        let result = provision(&store, &dest(), Ulid::new(), &module(), &PublishConfig::new(dir.path()));
        assert!(matches!(result, Err(PublishError::WorkspaceInit { .. })));
        assert_eq!(store.count("create_workspace"), 0);
    }

    #[test]
    fn test_registration_failure_removes_directory() {
        let (dir, depot) = depot_fixture();
        let staging = dir.path().join("staging");
        let store = FaultyStore::new(depot);
        store.configure(|f| f.create_workspace = Some("server down".into()));

        let result = provision(&store, &dest(), Ulid::new(), &module(), &PublishConfig::new(&staging));
        assert!(matches!(result, Err(PublishError::Remote(_))));
        assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[test]
    fn test_changelist_failure_unwinds_workspace() {
        let (dir, depot) = depot_fixture();
        let staging = dir.path().join("staging");
        let store = FaultyStore::new(depot);
        store.configure(|f| f.create_changelist = Some("quota exceeded".into()));

        let result = provision(&store, &dest(), Ulid::new(), &module(), &PublishConfig::new(&staging));
        assert!(matches!(result, Err(PublishError::Remote(_))));
        assert_eq!(store.count("delete_workspace"), 1);
        assert!(store.inner().list_workspaces().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[test]
    fn test_shallow_destination_rejected() {
        let (dir, depot) = depot_fixture();
        let shallow = DepotPath::new("//depot").unwrap();
        let result = provision(&depot, &shallow, Ulid::new(), &module(), &PublishConfig::new(dir.path()));
        assert!(matches!(result, Err(PublishError::Remote(_))));
    }
}
