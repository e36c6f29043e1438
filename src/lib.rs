//! depotpub - atomic multi-file publishing into a changelist depot
//!
//! A publish stages every artifact of a module revision into a private,
//! throwaway workspace and one changelist, then submits that changelist in
//! a single step: either every file lands in the depot or none does. The
//! workspace is torn down afterwards on every path.
//!
//! The depot is reached through the `RemoteStore` trait. `GitDepot` is a
//! complete implementation on top of a bare git repository.
//!
//! # Example
//!
//! ```no_run
//! use depotpub::config::PublishConfig;
//! use depotpub::repository::PublishRepository;
//! use depotpub::store::{DepotPath, GitDepot};
//! use depotpub::transaction::ModuleId;
//!
//! let depot = GitDepot::open_or_init("./depot.git").unwrap().with_user("ci");
//! let mut repo = PublishRepository::new(depot, PublishConfig::from_env().unwrap());
//!
//! let tx = repo.begin_transaction(ModuleId::new("acme", "widgets", "1.0")).unwrap();
//! let dest = DepotPath::new("//depot/acme/widgets/1.0/widgets.jar").unwrap();
//! repo.stage_put(&tx, "target/widgets.jar".as_ref(), &dest, false).unwrap();
//! repo.commit_transaction(tx).unwrap();
//! ```

pub mod config;
pub mod repository;
pub mod store;
pub mod transaction;
