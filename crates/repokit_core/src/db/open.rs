//! Connection bootstrap.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have every supplied migration applied.

use super::migrations::{apply_migrations, Migration};
use super::DbResult;
use crate::config::RepoConfig;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) a database file and applies pending migrations.
pub fn open_db(path: impl AsRef<Path>, migrations: &[Migration]) -> DbResult<Connection> {
    open_logged("file", DEFAULT_BUSY_TIMEOUT, migrations, || {
        Connection::open(path)
    })
}

/// Opens a private in-memory database and applies migrations.
pub fn open_db_in_memory(migrations: &[Migration]) -> DbResult<Connection> {
    open_logged("memory", DEFAULT_BUSY_TIMEOUT, migrations, Connection::open_in_memory)
}

/// Opens the database described by `config`.
pub fn open_configured(config: &RepoConfig, migrations: &[Migration]) -> DbResult<Connection> {
    match &config.database_path {
        Some(path) => open_logged("file", config.busy_timeout(), migrations, || {
            Connection::open(path)
        }),
        None => open_logged(
            "memory",
            config.busy_timeout(),
            migrations,
            Connection::open_in_memory,
        ),
    }
}

fn open_logged(
    mode: &'static str,
    busy_timeout: Duration,
    migrations: &[Migration],
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = connect()
        .map_err(Into::into)
        .and_then(|mut conn| bootstrap(&mut conn, busy_timeout, migrations).map(|()| conn));

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
    result
}

fn bootstrap(conn: &mut Connection, busy_timeout: Duration, migrations: &[Migration]) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(busy_timeout)?;
    apply_migrations(conn, migrations)
}
