//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `repokit_core` wiring end to end on an in-memory session.
//! - Keep output deterministic (`key=value` lines) for quick sanity checks.

use log::info;
use repokit_core::db::Migration;
use repokit_core::{
    core_version, init_logging, AuditFields, Entity, EntityDescriptor, KeyType, QueryOptions,
    RepoConfig, Repository, SchemaRegistry, Value,
};
use rusqlite::Row;
use std::error::Error;
use std::process::ExitCode;

const MIGRATIONS: &[Migration] = &[Migration::new(
    1,
    "CREATE TABLE notes (
        id INTEGER PRIMARY KEY,
        body TEXT NOT NULL,
        creation_date TEXT,
        modification_date TEXT,
        deletion_date TEXT,
        is_deleted INTEGER NOT NULL DEFAULT 0
    );",
)];

struct Note {
    id: i64,
    body: String,
    audit: AuditFields,
}

impl Entity for Note {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("notes")
            .key("id", KeyType::Integer)
            .column("body")
            .audited()
    }

    fn to_fields(&self) -> Vec<(&'static str, Value)> {
        vec![("id", self.id.into()), ("body", self.body.clone().into())]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            body: row.get("body")?,
            audit: AuditFields::from_row(row)?,
        })
    }

    fn audit(&self) -> Option<&AuditFields> {
        Some(&self.audit)
    }

    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        Some(&mut self.audit)
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("status=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = RepoConfig::from_env()?;
    if let Some(logging) = config.logging() {
        init_logging(&logging)?;
    }
    let session = RepoConfig {
        database_path: None,
        ..config
    };

    let schema = SchemaRegistry::new().with::<Note>()?;
    let mut repo = Repository::open(&session, schema, MIGRATIONS)?;
    println!("repokit_core version={}", core_version());

    let mut note = Note {
        id: 1,
        body: "first note".to_string(),
        audit: AuditFields::default(),
    };
    repo.add(&mut note)?;
    println!("add id={} created={}", note.id, note.audit.creation_date.is_some());

    let deleted: Note = repo.soft_delete_by_id(note.id)?;
    println!("soft_delete id={} is_deleted={}", deleted.id, deleted.audit.is_deleted);

    let active = repo.count::<Note>(&QueryOptions::new().exclude_deleted())?;
    let stored = repo.count::<Note>(&QueryOptions::new())?;
    println!("count active={active} stored={stored}");

    repo.hard_delete_by_id::<Note>(note.id)?;
    let found = repo.find_by_id::<Note>(note.id, &QueryOptions::new())?;
    println!("hard_delete id={} found={}", note.id, found.is_some());

    repo.commit()?;
    info!("event=smoke module=cli status=ok");
    Ok(())
}
