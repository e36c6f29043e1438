//! depot layer for depotpub
//!
//! this module defines the `RemoteStore` interface the publish transaction
//! talks to, and `GitDepot`, a changelist depot built on git. the upper
//! layers (transaction, repository) use this API and never touch git2
//! directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 GitDepot (impl RemoteStore)                 │
//! │   (workspaces, staging, changelists, submit, read side)     │
//! └─────────────────────────────────────────────────────────────┘
//!              │                                   │
//!              ▼                                   ▼
//!   ┌─────────────────────┐             ┌─────────────────────┐
//!   │      registry       │             │  tree / blob / refs │
//!   │ (depot-state.json)  │             │   (file content)    │
//!   └─────────────────────┘             └─────────────────────┘
//!                                                  │
//!                                                  ▼
//!                                       ┌─────────────────────┐
//!                                       │       commit        │
//!                                       │ (history, revisions)│
//!                                       └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use depotpub::store::{GitDepot, RemoteStore, DepotPath};
//!
//! let depot = GitDepot::open_or_init("./depot.git")?.with_user("alice");
//! let jar = DepotPath::new("//depot/acme/widgets/1.0/widgets.jar")?;
//! if depot.head_state(&jar)?.exists() {
//!     let bytes = depot.read_file(&jar)?;
//! }
//! ```

mod blob;
mod commit;
mod depot;
mod error;
mod refs;
mod registry;
mod remote;
mod tree;
mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export public API
pub use commit::{CommitInfo, FileRevision};
pub use depot::{GitDepot, DEPOT_USER_ENV};
pub use error::{RemoteError, RemoteResult};
pub use remote::RemoteStore;
pub use types::{
    BlobId, ChangelistId, ChangelistStatus, ChangelistSummary, CommitId, DepotPath, DirListing,
    FileAction, FileResult, GitSignature, HeadState, InvalidNameError, SubmitStatus, TreeId,
    ViewMapping, WorkspaceName, WorkspaceSpec,
};
