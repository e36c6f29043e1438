//! Publish transactions.
//!
//! A transaction stages files into an ephemeral workspace and a single
//! changelist, then submits that changelist in one step. Whatever happens,
//! the workspace is torn down at the end.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TransactionManager                        │
//! │        (single-flight guard, owns the active slot)          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │ PublishTransaction  │
//!                   └─────────────────────┘
//!        ┌─────────────┬───────┴───────┬─────────────┐
//!        ▼             ▼               ▼             ▼
//!  ┌───────────┐ ┌───────────┐  ┌────────────┐ ┌───────────┐
//!  │ workspace │ │  staging  │  │  classify  │ │  cleanup  │
//!  │(provision)│ │   (put)   │  │  (commit)  │ │ (always)  │
//!  └───────────┘ └───────────┘  └────────────┘ └───────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use depotpub::transaction::{ModuleId, TransactionManager};
//!
//! let mut manager = TransactionManager::new(config);
//! let handle = manager.begin(ModuleId::new("acme", "widgets", "1.0"))?;
//!
//! manager.put(&depot, &handle, jar, &"//depot/acme/widgets/1.0/widgets.jar".parse()?, false)?;
//! manager.put(&depot, &handle, ivy, &"//depot/acme/widgets/1.0/ivy.xml".parse()?, false)?;
//!
//! let outcome = manager.commit(&depot, handle)?;  // or manager.abort(&depot, handle);
//! ```

pub mod cleanup;
mod context;
mod error;
mod manager;
mod module;
mod staging;
mod state;
pub mod workspace;

pub use cleanup::CleanupReport;
pub use context::{classify, CommitOutcome, PublishTransaction, SubmittedFile};
pub use error::{CopyError, PublishError, PublishResult};
pub use manager::{TransactionHandle, TransactionManager};
pub use module::ModuleId;
pub use staging::{PutOutcome, StageMode, StagedOperation};
pub use state::TransactionState;
pub use workspace::Workspace;
