//! The publish transaction itself.
//!
//! A transaction is consumed by `commit` or `abort`, so a finished
//! transaction cannot be reused. Both paths end in the same cleanup.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use crate::config::PublishConfig;
use crate::store::{ChangelistId, DepotPath, FileResult, RemoteStore, SubmitStatus};
use crate::transaction::cleanup::{self, CleanupReport};
use crate::transaction::error::{PublishError, PublishResult};
use crate::transaction::module::ModuleId;
use crate::transaction::staging::{self, PutOutcome, StagedOperation};
use crate::transaction::state::TransactionState;
use crate::transaction::workspace::{self, Workspace};

/// a file that made it into the depot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedFile {
    pub path: DepotPath,
    /// note attached by the depot, e.g. for unchanged content
    pub note: Option<String>,
}

/// Result of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    pub submitted: Vec<SubmittedFile>,
    /// the changelist had no open files, so nothing was submitted
    pub nothing_to_publish: bool,
    /// None when no workspace was ever provisioned
    pub cleanup: Option<CleanupReport>,
}

/// Turn per-file submit results into the outcome.
///
/// Any rejected file fails the whole commit; the first one is reported.
pub fn classify(results: &[FileResult]) -> PublishResult<Vec<SubmittedFile>> {
    if let Some((path, message)) = results.iter().find_map(|r| match &r.status {
        SubmitStatus::Error { message } => Some((&r.path, message)),
        _ => None,
    }) {
        return Err(PublishError::CommitFailed {
            path: path.clone(),
            message: message.clone(),
        });
    }

    Ok(results
        .iter()
        .map(|r| SubmittedFile {
            path: r.path.clone(),
            note: match &r.status {
                SubmitStatus::Info { message } => Some(message.clone()),
                _ => None,
            },
        })
        .collect())
}

/// One atomic publish.
#[derive(Debug)]
pub struct PublishTransaction {
    id: Ulid,
    module: ModuleId,
    state: TransactionState,
    workspace: Option<Workspace>,
    change: Option<ChangelistId>,
    staged: Vec<StagedOperation>,
    config: PublishConfig,
    started_at: DateTime<Utc>,
    cleaned_up: bool,
}

impl PublishTransaction {
    /// Create a transaction; nothing touches the depot until the first put.
    pub fn new(module: ModuleId, config: PublishConfig) -> Self {
        Self {
            id: Ulid::new(),
            module,
            state: TransactionState::NotStarted,
            workspace: None,
            change: None,
            staged: Vec::new(),
            config,
            started_at: Utc::now(),
            cleaned_up: false,
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    pub fn change(&self) -> Option<ChangelistId> {
        self.change
    }

    pub fn staged(&self) -> &[StagedOperation] {
        &self.staged
    }

    /// number of staged operations
    pub fn pending_count(&self) -> usize {
        self.staged.len()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn advance(&mut self, to: TransactionState) -> PublishResult<()> {
        if !self.state.can_advance_to(to) {
            return Err(PublishError::InvalidState {
                from: self.state,
                to,
            });
        }
        debug!(tx = %self.id, module = %self.module, from = %self.state, to = %to, "transaction state");
        self.state = to;
        Ok(())
    }

    /// Stage one file. The first put provisions the workspace and changelist.
    ///
    /// A failed put leaves the transaction open.
    pub fn put<S: RemoteStore>(
        &mut self,
        store: &S,
        source: &Path,
        destination: &DepotPath,
        overwrite: bool,
    ) -> PublishResult<PutOutcome> {
        if !matches!(
            self.state,
            TransactionState::NotStarted | TransactionState::Open
        ) {
            return Err(PublishError::InvalidState {
                from: self.state,
                to: TransactionState::Open,
            });
        }

        // a second copy would overwrite the bytes already staged
        if self.staged.iter().any(|op| op.destination == *destination) {
            return Err(PublishError::AlreadyStaged {
                path: destination.clone(),
            });
        }

        if self.workspace.is_none() {
            let (workspace, change) =
                workspace::provision(store, destination, Ulid::new(), &self.module, &self.config)
                    .inspect_err(|e| {
                        warn!(tx = %self.id, module = %self.module, error = %e, "provisioning failed");
                    })?;
            self.workspace = Some(workspace);
            self.change = Some(change);
            self.advance(TransactionState::Open)?;
        }

        let (Some(workspace), Some(change)) = (&self.workspace, self.change) else {
            return Err(PublishError::NoActiveTransaction);
        };

        match staging::stage(store, workspace, change, source, destination, overwrite)? {
            Some(op) => {
                let mode = op.mode;
                self.staged.push(op);
                Ok(PutOutcome::Staged(mode))
            }
            None => Ok(PutOutcome::Skipped),
        }
    }

    /// Submit everything staged, then clean up.
    ///
    /// Cleanup runs whatever the submit outcome. A cleanup problem never
    /// replaces a submit error.
    pub fn commit<S: RemoteStore>(mut self, store: &S) -> PublishResult<CommitOutcome> {
        self.advance(TransactionState::Committing)?;

        let result = self.submit_changelist(store);
        let final_state = if result.is_ok() {
            TransactionState::Committed
        } else {
            TransactionState::Aborted
        };
        self.advance(final_state)?;
        let cleanup = self.finish(store);

        let (submitted, nothing_to_publish) = result?;
        Ok(CommitOutcome {
            submitted,
            nothing_to_publish,
            cleanup,
        })
    }

    /// Abandon the transaction and clean up. Never fails.
    pub fn abort<S: RemoteStore>(mut self, store: &S) -> Option<CleanupReport> {
        if !self.state.is_terminal() {
            // every non-terminal state may move to Aborted
            self.state = TransactionState::Aborted;
        }
        info!(tx = %self.id, module = %self.module, staged = self.staged.len(), "aborting publish");
        self.finish(store)
    }

    fn submit_changelist<S: RemoteStore>(
        &self,
        store: &S,
    ) -> PublishResult<(Vec<SubmittedFile>, bool)> {
        let Some(change) = self.change else {
            info!(module = %self.module, "nothing to publish");
            return Ok((Vec::new(), true));
        };

        let files = store.refresh_changelist(change)?;
        if files.is_empty() {
            info!(module = %self.module, change = %change, "nothing to publish");
            return Ok((Vec::new(), true));
        }

        let results = store.submit(change).inspect_err(|e| {
            error!(module = %self.module, change = %change, error = %e, "submit failed");
        })?;

        let submitted = classify(&results).inspect_err(|e| {
            error!(module = %self.module, change = %change, error = %e, "depot rejected the change");
        })?;

        for file in &submitted {
            match &file.note {
                Some(note) => info!(change = %change, path = %file.path, note = %note, "published"),
                None => info!(change = %change, path = %file.path, "published"),
            }
        }
        Ok((submitted, false))
    }

    /// run cleanup once, if a workspace was provisioned
    fn finish<S: RemoteStore>(&mut self, store: &S) -> Option<CleanupReport> {
        if self.cleaned_up {
            return None;
        }
        self.cleaned_up = true;
        self.workspace
            .as_ref()
            .map(|workspace| cleanup::run(store, workspace, self.config.pending_lookback))
    }
}
