//! Caller-facing repository handle and the resolver capability interface.
//!
//! `PublishRepository` wraps a `RemoteStore`, owns the single transaction
//! slot for that connection and caches resource metadata per path.

mod adapter;
mod api;
mod error;
mod resource;

pub use adapter::ArtifactRepository;
pub use api::PublishRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use resource::Resource;
