//! Persistence engine.
//!
//! # Responsibility
//! - Provide create/read/update/soft-delete and batched enumeration for
//!   records of one schema over any `HashStore`.
//! - Keep store key layout and transform calls inside this boundary.
//!
//! # Invariants
//! - Not-found is `Ok(None)`/`Ok(false)`, never an error, on read paths.
//! - Store failures propagate unchanged inside `RepoError::Store`.

mod batches;
pub mod model_repo;

pub use batches::{BatchQuery, Batches};
pub use model_repo::{ModelRepository, RepoError, RepoResult};
