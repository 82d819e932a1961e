//! Typed record persistence over a hash key-value store.
//! Models declare attributes with named transforms; the repository moves
//! records between memory and the store.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod store;
pub mod transform;

pub use config::{ConfigError, RepositoryConfig, DEFAULT_BATCH_SIZE};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{Record, RecordId};
pub use model::value::Value;
pub use repo::{BatchQuery, Batches, ModelRepository, RepoError, RepoResult};
pub use schema::{
    AttributeDef, AttributeDefault, Schema, SchemaBuilder, SchemaError, ValidationRule,
    CREATED_AT, DELETED_FIELD, UPDATED_AT,
};
pub use store::{
    Fields, HashStore, InMemoryHashStore, MemberPage, MemberPages, SqliteHashStore, StoreError,
    StoreResult,
};
pub use transform::{
    default_registry, RegistryError, Transform, TransformError, TransformRegistry, BOOLEAN_TAG,
    FLOAT_TAG, INTEGER_TAG, JSON_TAG, STRING_TAG, TIME_TAG,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
