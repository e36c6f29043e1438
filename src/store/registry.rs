//! server-side bookkeeping for the git depot.
//!
//! git only stores file content. workspaces, have-lists, opened files and
//! changelists live in a JSON document next to the repository
//! (`<gitdir>/depot-state.json`). the document is rewritten atomically on
//! every mutation.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::store::error::{RemoteError, RemoteResult};
use crate::store::types::{
    ChangelistId, ChangelistStatus, ChangelistSummary, DepotPath, FileAction, WorkspaceName,
    WorkspaceSpec,
};

/// file name of the registry inside the git directory
pub const STATE_FILE: &str = "depot-state.json";

/// a file opened in a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedFile {
    pub action: FileAction,
    pub change: ChangelistId,
}

/// a registered workspace and its server-side state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub spec: WorkspaceSpec,
    /// head revision each file was last synced at
    #[serde(default)]
    pub have: BTreeMap<DepotPath, u32>,
    #[serde(default)]
    pub opened: BTreeMap<DepotPath, OpenedFile>,
}

impl WorkspaceRecord {
    pub fn new(spec: WorkspaceSpec) -> Self {
        Self {
            spec,
            have: BTreeMap::new(),
            opened: BTreeMap::new(),
        }
    }

    /// files opened against a changelist, in path order
    pub fn opened_in(&self, change: ChangelistId) -> Vec<(DepotPath, FileAction)> {
        self.opened
            .iter()
            .filter(|(_, file)| file.change == change)
            .map(|(path, file)| (path.clone(), file.action))
            .collect()
    }
}

/// a changelist known to the depot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelistRecord {
    pub id: ChangelistId,
    pub owner: String,
    pub workspace: WorkspaceName,
    pub description: String,
    pub status: ChangelistStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    /// hex id of the commit a submitted changelist produced
    #[serde(default)]
    pub commit: Option<String>,
}

impl ChangelistRecord {
    pub fn summary(&self) -> ChangelistSummary {
        ChangelistSummary {
            id: self.id,
            status: self.status,
            owner: self.owner.clone(),
            workspace: self.workspace.clone(),
            description: self.description.clone(),
        }
    }
}

/// the whole registry document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub next_change: u64,
    #[serde(default)]
    pub workspaces: BTreeMap<WorkspaceName, WorkspaceRecord>,
    #[serde(default)]
    pub changelists: BTreeMap<ChangelistId, ChangelistRecord>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            next_change: 1,
            workspaces: BTreeMap::new(),
            changelists: BTreeMap::new(),
        }
    }
}

impl Registry {
    /// load the registry, or an empty one if the file doesn't exist yet
    pub fn load(path: &Path) -> RemoteResult<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(RemoteError::io(path, e)),
        }
    }

    /// write the registry through a temp file in the same directory
    pub fn save(&self, path: &Path) -> RemoteResult<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let bytes = serde_json::to_vec_pretty(self)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| RemoteError::io(dir, e))?;
        tmp.write_all(&bytes)
            .map_err(|e| RemoteError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| RemoteError::io(path, e.error))?;
        Ok(())
    }

    pub fn workspace(&self, name: &WorkspaceName) -> RemoteResult<&WorkspaceRecord> {
        self.workspaces
            .get(name)
            .ok_or_else(|| RemoteError::WorkspaceNotFound(name.clone()))
    }

    pub fn workspace_mut(&mut self, name: &WorkspaceName) -> RemoteResult<&mut WorkspaceRecord> {
        self.workspaces
            .get_mut(name)
            .ok_or_else(|| RemoteError::WorkspaceNotFound(name.clone()))
    }

    pub fn changelist(&self, id: ChangelistId) -> RemoteResult<&ChangelistRecord> {
        self.changelists
            .get(&id)
            .ok_or(RemoteError::ChangelistNotFound(id))
    }

    pub fn changelist_mut(&mut self, id: ChangelistId) -> RemoteResult<&mut ChangelistRecord> {
        self.changelists
            .get_mut(&id)
            .ok_or(RemoteError::ChangelistNotFound(id))
    }

    /// hand out the next changelist number
    pub fn allocate_change(&mut self) -> ChangelistId {
        let id = ChangelistId(self.next_change);
        self.next_change += 1;
        id
    }

    /// files opened against a changelist, looked up through its workspace
    pub fn opened_in(&self, id: ChangelistId) -> RemoteResult<Vec<(DepotPath, FileAction)>> {
        let change = self.changelist(id)?;
        Ok(self
            .workspaces
            .get(&change.workspace)
            .map(|ws| ws.opened_in(id))
            .unwrap_or_default())
    }

    /// pending changelists held by a workspace
    pub fn pending_for(
        &self,
        workspace: &WorkspaceName,
    ) -> impl DoubleEndedIterator<Item = &ChangelistRecord> + '_ {
        let workspace = workspace.clone();
        self.changelists
            .values()
            .filter(move |c| c.workspace == workspace && c.status == ChangelistStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::ViewMapping;
    use tempfile::TempDir;

    fn spec(name: &str) -> WorkspaceSpec {
        let name = WorkspaceName::new(name).unwrap();
        WorkspaceSpec {
            view: ViewMapping::for_destination(
                &DepotPath::new("//depot/acme/w.jar").unwrap(),
                name.clone(),
            )
            .unwrap(),
            name,
            owner: "alice".to_string(),
            root: "/tmp/ws".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::load(&dir.path().join(STATE_FILE)).unwrap();
        assert_eq!(registry.next_change, 1);
        assert!(registry.workspaces.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join(STATE_FILE);

        let mut registry = Registry::default();
        let ws = spec("ws1");
        let name = ws.name.clone();
        let mut record = WorkspaceRecord::new(ws);

        let change = registry.allocate_change();
        record.opened.insert(
            DepotPath::new("//depot/acme/w.jar").unwrap(),
            OpenedFile {
                action: FileAction::Add,
                change,
            },
        );
        registry.workspaces.insert(name.clone(), record);
        registry.changelists.insert(
            change,
            ChangelistRecord {
                id: change,
                owner: "alice".to_string(),
                workspace: name.clone(),
                description: "Publishing acme#w;1".to_string(),
                status: ChangelistStatus::Pending,
                created_at: Utc::now(),
                submitted_at: None,
                commit: None,
            },
        );
        registry.save(&state).unwrap();

        let loaded = Registry::load(&state).unwrap();
        assert_eq!(loaded.next_change, 2);
        assert_eq!(loaded.opened_in(change).unwrap().len(), 1);
        assert_eq!(loaded.pending_for(&name).count(), 1);
        assert_eq!(loaded.changelist(change).unwrap().summary().owner, "alice");
    }

    #[test]
    fn test_corrupt_state_is_reported() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join(STATE_FILE);
        std::fs::write(&state, b"{ not json").unwrap();

        assert!(matches!(Registry::load(&state), Err(RemoteError::State(_))));
    }

    #[test]
    fn test_lookup_errors() {
        let registry = Registry::default();
        let missing = WorkspaceName::new("nope").unwrap();
        assert!(registry.workspace(&missing).unwrap_err().is_not_found());
        assert!(registry.changelist(ChangelistId(9)).unwrap_err().is_not_found());
    }
}
