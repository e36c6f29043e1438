//! Transaction manager - the single-flight lifecycle guard.
//!
//! A repository handle owns one manager. The manager holds at most one
//! transaction; the slot is a plain `Option` and is cleared whenever a
//! commit or abort finishes, however it finished.

use std::path::Path;

use tracing::{debug, warn};
use ulid::Ulid;

use crate::config::PublishConfig;
use crate::store::{DepotPath, RemoteStore};
use crate::transaction::cleanup::CleanupReport;
use crate::transaction::context::{CommitOutcome, PublishTransaction};
use crate::transaction::error::{PublishError, PublishResult};
use crate::transaction::module::ModuleId;
use crate::transaction::staging::PutOutcome;

/// Token for the transaction returned by `begin`.
///
/// Consumed by commit and abort.
#[derive(Debug, PartialEq, Eq)]
pub struct TransactionHandle {
    id: Ulid,
}

impl TransactionHandle {
    pub fn id(&self) -> Ulid {
        self.id
    }
}

/// Holds the active transaction, if any.
#[derive(Debug)]
pub struct TransactionManager {
    active: Option<PublishTransaction>,
    config: PublishConfig,
}

impl TransactionManager {
    pub fn new(config: PublishConfig) -> Self {
        Self {
            active: None,
            config,
        }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// the active transaction
    pub fn active(&self) -> Option<&PublishTransaction> {
        self.active.as_ref()
    }

    /// Start a transaction.
    ///
    /// Fails without side effects when one is already active.
    pub fn begin(&mut self, module: ModuleId) -> PublishResult<TransactionHandle> {
        if let Some(active) = &self.active {
            return Err(PublishError::AlreadyActive {
                active: active.module().to_string(),
                requested: module.to_string(),
            });
        }

        let tx = PublishTransaction::new(module, self.config.clone());
        let handle = TransactionHandle { id: tx.id() };
        debug!(tx = %tx.id(), module = %tx.module(), "began publish transaction");
        self.active = Some(tx);
        Ok(handle)
    }

    /// Stage a put in the active transaction.
    pub fn put<S: RemoteStore>(
        &mut self,
        store: &S,
        handle: &TransactionHandle,
        source: &Path,
        destination: &DepotPath,
        overwrite: bool,
    ) -> PublishResult<PutOutcome> {
        match self.active.as_mut() {
            Some(tx) if tx.id() == handle.id => tx.put(store, source, destination, overwrite),
            _ => Err(PublishError::NoActiveTransaction),
        }
    }

    /// Commit the active transaction. The slot is cleared either way.
    pub fn commit<S: RemoteStore>(
        &mut self,
        store: &S,
        handle: TransactionHandle,
    ) -> PublishResult<CommitOutcome> {
        let tx = self.take(&handle).ok_or(PublishError::NoActiveTransaction)?;
        tx.commit(store)
    }

    /// Abort the active transaction. Never fails.
    ///
    /// A handle that does not match the active transaction is ignored.
    pub fn abort<S: RemoteStore>(
        &mut self,
        store: &S,
        handle: TransactionHandle,
    ) -> Option<CleanupReport> {
        match self.take(&handle) {
            Some(tx) => tx.abort(store),
            None => {
                warn!(tx = %handle.id, "abort of a transaction that is not active; ignoring");
                None
            }
        }
    }

    /// Abort whatever is active, e.g. when the owning handle goes away.
    pub fn abort_active<S: RemoteStore>(&mut self, store: &S) -> Option<CleanupReport> {
        self.active.take().and_then(|tx| tx.abort(store))
    }

    fn take(&mut self, handle: &TransactionHandle) -> Option<PublishTransaction> {
        match &self.active {
            Some(tx) if tx.id() == handle.id => self.active.take(),
            _ => None,
        }
    }
}
