//! Filtered reads and eager loading.

use crate::model::entity::Entity;
use crate::query::options::QueryOptions;
use crate::query::predicate::Predicate;
use crate::query::sql::{count_sql, select_sql};
use crate::repo::error::{map_row_error, RepoResult};
use crate::repo::write::row_exists;
use crate::schema::SchemaRegistry;
use rusqlite::{params_from_iter, Connection};

/// Materializes every row of `E` selected by `options` (plus `extra`, AND-ed
/// in), then fills the requested relations.
pub(crate) fn fetch_entities<E: Entity>(
    conn: &Connection,
    schema: &SchemaRegistry,
    options: &QueryOptions,
    extra: Option<Predicate>,
) -> RepoResult<Vec<E>> {
    let descriptor = schema.descriptor::<E>()?;
    let filter = options.resolve_filter(descriptor, extra)?;

    let mut binds = Vec::new();
    let sql = select_sql(
        descriptor,
        filter.as_ref(),
        &options.order_by,
        options.limit,
        options.offset,
        &mut binds,
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(E::from_row(row).map_err(|err| map_row_error(descriptor.table(), err))?);
    }

    if !options.include.is_empty() {
        let loader = RelationLoader::new(conn, schema);
        for entity in &mut entities {
            for relation in &options.include {
                entity.load_relation(relation, &loader)?;
            }
        }
    }
    Ok(entities)
}

pub(crate) fn count_entities<E: Entity>(
    conn: &Connection,
    schema: &SchemaRegistry,
    options: &QueryOptions,
) -> RepoResult<u64> {
    let descriptor = schema.descriptor::<E>()?;
    let filter = options.resolve_filter(descriptor, None)?;

    let mut binds = Vec::new();
    let sql = count_sql(descriptor, filter.as_ref(), &mut binds);
    let count: i64 = conn.query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or_default())
}

pub(crate) fn any_entity<E: Entity>(
    conn: &Connection,
    schema: &SchemaRegistry,
    options: &QueryOptions,
) -> RepoResult<bool> {
    let descriptor = schema.descriptor::<E>()?;
    let filter = options.resolve_filter(descriptor, None)?;
    row_exists(conn, descriptor, filter.as_ref())
}

/// Read access handed to `Entity::load_relation`.
///
/// Runs on the parent's session, so related rows see the same uncommitted
/// writes. Related rows are never tracked.
pub struct RelationLoader<'a> {
    conn: &'a Connection,
    schema: &'a SchemaRegistry,
}

impl<'a> RelationLoader<'a> {
    pub(crate) fn new(conn: &'a Connection, schema: &'a SchemaRegistry) -> Self {
        Self { conn, schema }
    }

    /// Loads every `C` matching `filter`, in key order.
    pub fn load<C: Entity>(&self, filter: Predicate) -> RepoResult<Vec<C>> {
        self.load_with(&QueryOptions::new().untracked().filter(filter))
    }

    /// Full query form, including nested `include`s.
    pub fn load_with<C: Entity>(&self, options: &QueryOptions) -> RepoResult<Vec<C>> {
        fetch_entities(self.conn, self.schema, options, None)
    }
}
