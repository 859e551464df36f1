//! Generic repository layer over SQLite.
//! Entity types register a descriptor once; every CRUD, query and delete path
//! then runs through one typed facade with audit and soft-delete conventions.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod schema;

pub use config::{ConfigError, RepoConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::audit::AuditFields;
pub use model::clock::{Clock, SystemClock};
pub use model::entity::Entity;
pub use model::key::{CoercionError, KeyField, KeyType, KeyValue};
pub use query::key::key_predicate;
pub use query::options::{Direction, QueryOptions};
pub use query::predicate::{CompareOp, Predicate};
pub use repo::async_repository::AsyncRepository;
pub use repo::error::{RepoError, RepoResult};
pub use repo::read::RelationLoader;
pub use repo::repository::Repository;
pub use schema::descriptor::EntityDescriptor;
pub use schema::{SchemaError, SchemaRegistry};

/// Field value type shared with the storage engine.
pub use rusqlite::types::Value;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
