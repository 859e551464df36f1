//! Blocking repository session.
//!
//! # Responsibility
//! - Expose CRUD, query and soft/hard delete over every registered entity.
//! - Apply the audit convention at each mutation entry point.
//! - Own the unit of work and the change tracker of one SQLite connection.
//!
//! # Invariants
//! - One timestamp per logical operation; batch members share it.
//! - `is_deleted` is never reset to `false` and `deletion_date` is written once.
//! - Pending work is rolled back when the session is dropped uncommitted.
//! - A batch that fails leaves no rows, snapshots or audit stamps behind.

use crate::config::RepoConfig;
use crate::db::{open_configured, Migration};
use crate::model::audit::AuditFields;
use crate::model::clock::{Clock, SystemClock};
use crate::model::entity::Entity;
use crate::model::key::KeyValue;
use crate::query::key::{coerce_identifier, instance_key, key_predicate_from_values, key_repr};
use crate::query::options::QueryOptions;
use crate::query::predicate::Predicate;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::read::{any_entity, count_entities, fetch_entities};
use crate::repo::tracker::{changed_columns, ChangeTracker};
use crate::repo::write::{collect_fields, delete_rows, insert_row, row_exists, update_row, without_key};
use crate::schema::descriptor::EntityDescriptor;
use crate::schema::{SchemaError, SchemaRegistry};
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Only columns that differ from the tracked snapshot.
    Changed,
    All,
}

/// Typed repository over one SQLite connection.
///
/// Writes open a unit of work (`BEGIN IMMEDIATE`) on first use; nothing is
/// durable until `commit`.
///
/// Every entity written or loaded with tracking keeps a snapshot for the
/// life of the session, across commits. Long-lived sessions should call
/// `detach_all` or load with `QueryOptions::untracked` to bound it.
pub struct Repository {
    conn: Connection,
    schema: Arc<SchemaRegistry>,
    clock: Arc<dyn Clock>,
    tracker: ChangeTracker,
}

impl Repository {
    pub fn new(conn: Connection, schema: impl Into<Arc<SchemaRegistry>>) -> Self {
        Self {
            conn,
            schema: schema.into(),
            clock: Arc::new(SystemClock),
            tracker: ChangeTracker::default(),
        }
    }

    /// Replaces the time source used for audit stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Opens the database described by `config` and applies `migrations`.
    pub fn open(
        config: &RepoConfig,
        schema: impl Into<Arc<SchemaRegistry>>,
        migrations: &[Migration],
    ) -> RepoResult<Self> {
        let conn = open_configured(config, migrations)?;
        Ok(Self::new(conn, schema))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Whether a unit of work is open.
    pub fn has_pending_changes(&self) -> bool {
        !self.conn.is_autocommit()
    }

    pub fn tracked_count(&self) -> usize {
        self.tracker.len()
    }

    /// Forgets every snapshot; later updates write all columns.
    pub fn detach_all(&mut self) {
        self.tracker.clear();
    }

    /// Predicate selecting the `E` whose key equals `id`.
    pub fn key_predicate<E: Entity>(&self, id: impl Into<KeyValue>) -> RepoResult<Predicate> {
        let descriptor = self.schema.descriptor::<E>()?;
        crate::query::key::key_predicate(descriptor, &id.into())
    }

    /// Inserts `entity`, stamping `creation_date`.
    pub fn add<E: Entity>(&mut self, entity: &mut E) -> RepoResult<()> {
        self.add_range(std::slice::from_mut(entity))
    }

    /// Inserts every entity with one shared `creation_date`.
    ///
    /// The batch is all or nothing: when one member fails, none of its rows
    /// stay pending and every member keeps its previous audit stamps.
    pub fn add_range<E: Entity>(&mut self, entities: &mut [E]) -> RepoResult<()> {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema.descriptor::<E>()?;
        let now = self.clock.now();
        let previous = audit_states(entities);

        let result = self.batch(entities.len(), |repo| {
            for entity in entities.iter_mut() {
                if descriptor.is_audited() {
                    if let Some(audit) = entity.audit_mut() {
                        audit.stamp_created(now);
                    }
                }
                let row = collect_fields(descriptor, entity)?;
                repo.begin()?;
                insert_row(&repo.conn, descriptor.table(), &row)?;
                if !descriptor.is_keyless() {
                    let key = instance_key(descriptor, entity)?;
                    repo.tracker.track::<E>(key_repr(&key), row);
                }
            }
            Ok(())
        });
        if result.is_err() {
            restore_audit(entities, previous);
        }
        result?;

        debug!(
            "event=repo_write module=repo status=ok op=add table={} rows={}",
            descriptor.table(),
            entities.len()
        );
        Ok(())
    }

    /// Persists changes to `entity`, stamping `modification_date`.
    ///
    /// Tracked entities write only the columns changed since they were loaded
    /// or last written; untracked ones write every column.
    pub fn update<E: Entity>(&mut self, entity: &mut E) -> RepoResult<()> {
        self.update_range(std::slice::from_mut(entity))
    }

    pub fn update_range<E: Entity>(&mut self, entities: &mut [E]) -> RepoResult<()> {
        self.modify_range(entities, WriteMode::Changed, "update")
    }

    /// Overwrites every column of the stored row, stamping `modification_date`.
    pub fn replace<E: Entity>(&mut self, entity: &mut E) -> RepoResult<()> {
        self.replace_range(std::slice::from_mut(entity))
    }

    pub fn replace_range<E: Entity>(&mut self, entities: &mut [E]) -> RepoResult<()> {
        self.modify_range(entities, WriteMode::All, "replace")
    }

    /// Flags `entity` deleted and applies the update effect. The row stays
    /// queryable unless a read excludes deleted rows.
    ///
    /// Soft-deleting an already deleted entity keeps its `deletion_date`.
    pub fn soft_delete<E: Entity>(&mut self, entity: &mut E) -> RepoResult<()> {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema.descriptor::<E>()?;
        require_audited(descriptor)?;
        let now = self.clock.now();

        let audit = entity.audit_mut().ok_or_else(|| SchemaError::NotAudited {
            entity: descriptor.table().to_string(),
        })?;
        let previous = audit.clone();
        audit.mark_deleted(now);
        audit.stamp_modified(now);
        if let Err(err) = self.write_existing(descriptor, entity, WriteMode::Changed) {
            if let Some(audit) = entity.audit_mut() {
                *audit = previous;
            }
            return Err(err);
        }

        debug!(
            "event=repo_write module=repo status=ok op=soft_delete table={}",
            descriptor.table()
        );
        Ok(())
    }

    /// Loads the entity with key `id`, soft-deletes it and returns it.
    pub fn soft_delete_by_id<E: Entity>(&mut self, id: impl Into<KeyValue>) -> RepoResult<E> {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema.descriptor::<E>()?;
        require_audited(descriptor)?;

        let key = coerce_identifier(descriptor, &id.into())?;
        let mut entity = self
            .find_by_key::<E>(descriptor, &key, &QueryOptions::new())?
            .ok_or_else(|| not_found(descriptor, &key))?;
        self.soft_delete(&mut entity)?;
        Ok(entity)
    }

    /// Removes the stored row of `entity`. Audit fields are ignored.
    pub fn hard_delete<E: Entity>(&mut self, entity: &E) -> RepoResult<()> {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema.descriptor::<E>()?;
        let key = instance_key(descriptor, entity)?;
        self.delete_by_key::<E>(descriptor, &key)
    }

    /// Removes the row with key `id` in one statement.
    pub fn hard_delete_by_id<E: Entity>(&mut self, id: impl Into<KeyValue>) -> RepoResult<()> {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema.descriptor::<E>()?;
        let key = coerce_identifier(descriptor, &id.into())?;
        self.delete_by_key::<E>(descriptor, &key)
    }

    pub fn find_by_id<E: Entity>(
        &mut self,
        id: impl Into<KeyValue>,
        options: &QueryOptions,
    ) -> RepoResult<Option<E>> {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema.descriptor::<E>()?;
        let key = coerce_identifier(descriptor, &id.into())?;
        self.find_by_key(descriptor, &key, options)
    }

    /// Like `find_by_id`, but absence is `RepoError::NotFound`.
    pub fn get_by_id<E: Entity>(
        &mut self,
        id: impl Into<KeyValue>,
        options: &QueryOptions,
    ) -> RepoResult<E> {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema.descriptor::<E>()?;
        let key = coerce_identifier(descriptor, &id.into())?;
        self.find_by_key(descriptor, &key, options)?
            .ok_or_else(|| not_found(descriptor, &key))
    }

    pub fn find_by_id_projected<E: Entity, P>(
        &mut self,
        id: impl Into<KeyValue>,
        options: &QueryOptions,
        project: impl FnOnce(E) -> P,
    ) -> RepoResult<Option<P>> {
        Ok(self.find_by_id::<E>(id, options)?.map(project))
    }

    pub fn query<E: Entity>(&mut self, options: &QueryOptions) -> RepoResult<Vec<E>> {
        let schema = Arc::clone(&self.schema);
        let entities = fetch_entities::<E>(&self.conn, &schema, options, None)?;
        let descriptor = schema.descriptor::<E>()?;
        if options.track_changes {
            for entity in &entities {
                self.track_loaded(descriptor, entity)?;
            }
        }

        debug!(
            "event=repo_query module=repo status=ok table={} rows={}",
            descriptor.table(),
            entities.len()
        );
        Ok(entities)
    }

    /// Runs `query` and maps each result through `project`.
    pub fn query_projected<E: Entity, P>(
        &mut self,
        options: &QueryOptions,
        project: impl FnMut(E) -> P,
    ) -> RepoResult<Vec<P>> {
        Ok(self.query::<E>(options)?.into_iter().map(project).collect())
    }

    /// First row in the requested order, if any.
    pub fn find_first<E: Entity>(&mut self, options: &QueryOptions) -> RepoResult<Option<E>> {
        let options = options.clone().limit(1);
        Ok(self.query::<E>(&options)?.into_iter().next())
    }

    /// Whether any row matches. Ordering and paging options are ignored.
    pub fn any<E: Entity>(&self, options: &QueryOptions) -> RepoResult<bool> {
        any_entity::<E>(&self.conn, &self.schema, options)
    }

    /// Number of matching rows. Ordering and paging options are ignored.
    pub fn count<E: Entity>(&self, options: &QueryOptions) -> RepoResult<u64> {
        count_entities::<E>(&self.conn, &self.schema, options)
    }

    /// Makes every write since the last commit durable. No-op without
    /// pending work.
    pub fn commit(&mut self) -> RepoResult<()> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch("COMMIT")?;
        debug!("event=unit_of_work module=repo status=ok action=commit");
        Ok(())
    }

    /// Discards pending writes and every tracked snapshot.
    pub fn rollback(&mut self) -> RepoResult<()> {
        self.tracker.clear();
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK")?;
        debug!("event=unit_of_work module=repo status=ok action=rollback");
        Ok(())
    }

    fn begin(&self) -> RepoResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            debug!("event=unit_of_work module=repo status=ok action=begin");
        }
        Ok(())
    }

    /// Runs a write over `len` members. Batches of more than one run under a
    /// savepoint; on failure their rows and snapshots are discarded.
    fn batch(
        &mut self,
        len: usize,
        op: impl FnOnce(&mut Self) -> RepoResult<()>,
    ) -> RepoResult<()> {
        if len < 2 {
            return op(self);
        }

        let opened = self.conn.is_autocommit();
        self.begin()?;
        self.conn.execute_batch("SAVEPOINT repokit_batch")?;
        let tracked = self.tracker.clone();

        match op(self) {
            Ok(()) => {
                self.conn.execute_batch("RELEASE repokit_batch")?;
                Ok(())
            }
            Err(err) => {
                self.tracker = tracked;
                let undo = if opened {
                    "ROLLBACK"
                } else {
                    "ROLLBACK TO repokit_batch; RELEASE repokit_batch"
                };
                if let Err(undo_err) = self.conn.execute_batch(undo) {
                    error!(
                        "event=unit_of_work module=repo status=error action=batch_rollback error={undo_err}"
                    );
                }
                Err(err)
            }
        }
    }

    fn modify_range<E: Entity>(
        &mut self,
        entities: &mut [E],
        mode: WriteMode,
        op: &'static str,
    ) -> RepoResult<()> {
        let schema = Arc::clone(&self.schema);
        let descriptor = schema.descriptor::<E>()?;
        let now = self.clock.now();
        let previous = audit_states(entities);

        let result = self.batch(entities.len(), |repo| {
            for entity in entities.iter_mut() {
                stamp_modified(descriptor, entity, now);
                repo.write_existing(descriptor, entity, mode)?;
            }
            Ok(())
        });
        if result.is_err() {
            restore_audit(entities, previous);
        }
        result?;

        debug!(
            "event=repo_write module=repo status=ok op={op} table={} rows={}",
            descriptor.table(),
            entities.len()
        );
        Ok(())
    }

    fn write_existing<E: Entity>(
        &mut self,
        descriptor: &EntityDescriptor,
        entity: &E,
        mode: WriteMode,
    ) -> RepoResult<()> {
        let key = instance_key(descriptor, entity)?;
        let predicate = key_predicate_from_values(descriptor, &key)?;
        let repr = key_repr(&key);
        let row = collect_fields(descriptor, entity)?;
        let current = without_key(descriptor, &row);

        let set = match (mode, self.tracker.snapshot::<E>(&repr)) {
            (WriteMode::Changed, Some(snapshot)) => changed_columns(snapshot, &current),
            _ => current,
        };

        if set.is_empty() {
            if !row_exists(&self.conn, descriptor, Some(&predicate))? {
                return Err(not_found(descriptor, &key));
            }
        } else {
            self.begin()?;
            if update_row(&self.conn, descriptor.table(), &set, &predicate)? == 0 {
                return Err(not_found(descriptor, &key));
            }
        }

        self.tracker.track::<E>(repr, row);
        Ok(())
    }

    fn delete_by_key<E: Entity>(
        &mut self,
        descriptor: &EntityDescriptor,
        key: &[Value],
    ) -> RepoResult<()> {
        let predicate = key_predicate_from_values(descriptor, key)?;
        self.begin()?;
        if delete_rows(&self.conn, descriptor.table(), &predicate)? == 0 {
            return Err(not_found(descriptor, key));
        }
        self.tracker.forget::<E>(&key_repr(key));

        debug!(
            "event=repo_write module=repo status=ok op=hard_delete table={}",
            descriptor.table()
        );
        Ok(())
    }

    fn find_by_key<E: Entity>(
        &mut self,
        descriptor: &EntityDescriptor,
        key: &[Value],
        options: &QueryOptions,
    ) -> RepoResult<Option<E>> {
        let predicate = key_predicate_from_values(descriptor, key)?;
        let mut options = options.clone();
        options.limit = Some(1);
        options.offset = 0;

        let found = fetch_entities::<E>(&self.conn, &self.schema, &options, Some(predicate))?
            .into_iter()
            .next();
        if let (Some(entity), true) = (&found, options.track_changes) {
            self.track_loaded(descriptor, entity)?;
        }
        Ok(found)
    }

    fn track_loaded<E: Entity>(
        &mut self,
        descriptor: &EntityDescriptor,
        entity: &E,
    ) -> RepoResult<()> {
        if descriptor.is_keyless() {
            return Ok(());
        }
        let key = instance_key(descriptor, entity)?;
        let row = collect_fields(descriptor, entity)?;
        self.tracker.track::<E>(key_repr(&key), row);
        Ok(())
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        if self.conn.is_autocommit() {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => warn!("event=unit_of_work module=repo status=rolled_back reason=dropped"),
            Err(err) => error!(
                "event=unit_of_work module=repo status=error reason=dropped error={err}"
            ),
        }
    }
}

fn stamp_modified<E: Entity>(descriptor: &EntityDescriptor, entity: &mut E, now: DateTime<Utc>) {
    if !descriptor.is_audited() {
        return;
    }
    if let Some(audit) = entity.audit_mut() {
        audit.stamp_modified(now);
    }
}

fn audit_states<E: Entity>(entities: &[E]) -> Vec<Option<AuditFields>> {
    entities
        .iter()
        .map(|entity| entity.audit().cloned())
        .collect()
}

fn restore_audit<E: Entity>(entities: &mut [E], previous: Vec<Option<AuditFields>>) {
    for (entity, previous) in entities.iter_mut().zip(previous) {
        if let (Some(audit), Some(previous)) = (entity.audit_mut(), previous) {
            *audit = previous;
        }
    }
}

fn require_audited(descriptor: &EntityDescriptor) -> Result<(), SchemaError> {
    if descriptor.is_audited() {
        Ok(())
    } else {
        Err(SchemaError::NotAudited {
            entity: descriptor.table().to_string(),
        })
    }
}

fn not_found(descriptor: &EntityDescriptor, key: &[Value]) -> RepoError {
    RepoError::NotFound {
        entity: descriptor.table().to_string(),
        key: key_repr(key),
    }
}
