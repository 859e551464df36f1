//! SQLite session bootstrap.
//!
//! # Responsibility
//! - Open file or in-memory connections with the pragmas repositories rely on.
//! - Apply caller-authored schema migrations before handing a connection out.
//!
//! # Invariants
//! - Applied migration version is tracked through `PRAGMA user_version`.
//! - Returned connections have `foreign_keys=ON` and a busy timeout set.

use thiserror::Error;

pub mod migrations;
mod open;

pub use migrations::Migration;
pub use open::{open_configured, open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Storage engine failures. Engine errors are carried as-is.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("migration {next} must come after {previous}; versions must strictly increase")]
    InvalidMigrationOrder { previous: u32, next: u32 },
}
