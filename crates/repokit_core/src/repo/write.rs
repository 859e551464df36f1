//! Row writes shared by the repository mutation paths.

use crate::model::entity::Entity;
use crate::query::predicate::Predicate;
use crate::query::sql::{delete_sql, exists_sql, insert_sql, update_sql};
use crate::repo::error::RepoResult;
use crate::repo::tracker::Row;
use crate::schema::descriptor::EntityDescriptor;
use crate::schema::SchemaError;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// Stored column values of `entity` in descriptor order, audit columns last.
///
/// Rejects fields the descriptor does not declare and declared columns the
/// entity does not produce.
pub(crate) fn collect_fields<E: Entity>(
    descriptor: &EntityDescriptor,
    entity: &E,
) -> Result<Row, SchemaError> {
    let declared = descriptor.entity_columns();
    let mut produced = entity.to_fields();

    for (index, (name, _)) in produced.iter().enumerate() {
        if !declared.contains(name) {
            return Err(SchemaError::UnknownField {
                entity: descriptor.table().to_string(),
                field: (*name).to_string(),
            });
        }
        if produced[..index].iter().any(|(earlier, _)| earlier == name) {
            return Err(SchemaError::DuplicateColumn {
                entity: descriptor.table().to_string(),
                column: (*name).to_string(),
            });
        }
    }

    let mut row = Vec::with_capacity(descriptor.all_columns().len());
    for column in declared {
        let position = produced
            .iter()
            .position(|(name, _)| *name == column)
            .ok_or_else(|| SchemaError::MissingField {
                entity: descriptor.table().to_string(),
                field: column.to_string(),
            })?;
        row.push(produced.swap_remove(position));
    }

    if descriptor.is_audited() {
        let audit = entity.audit().ok_or_else(|| SchemaError::NotAudited {
            entity: descriptor.table().to_string(),
        })?;
        row.extend(audit.to_columns());
    }
    Ok(row)
}

/// Drops key columns; keys identify the row and are never `SET`.
pub(crate) fn without_key(descriptor: &EntityDescriptor, row: &Row) -> Row {
    row.iter()
        .filter(|(name, _)| !descriptor.key_fields().iter().any(|key| key.name == *name))
        .cloned()
        .collect()
}

pub(crate) fn insert_row(conn: &Connection, table: &str, row: &Row) -> RepoResult<()> {
    let columns: Vec<&str> = row.iter().map(|(name, _)| *name).collect();
    let values = row.iter().map(|(_, value)| value);
    conn.execute(&insert_sql(table, &columns), params_from_iter(values))?;
    Ok(())
}

/// Returns the number of rows changed.
pub(crate) fn update_row(
    conn: &Connection,
    table: &str,
    set: &Row,
    key: &Predicate,
) -> RepoResult<usize> {
    let columns: Vec<&str> = set.iter().map(|(name, _)| *name).collect();
    let mut binds: Vec<Value> = set.iter().map(|(_, value)| value.clone()).collect();
    let sql = update_sql(table, &columns, key, &mut binds);
    Ok(conn.execute(&sql, params_from_iter(binds))?)
}

/// Returns the number of rows removed.
pub(crate) fn delete_rows(conn: &Connection, table: &str, key: &Predicate) -> RepoResult<usize> {
    let mut binds = Vec::new();
    let sql = delete_sql(table, key, &mut binds);
    Ok(conn.execute(&sql, params_from_iter(binds))?)
}

pub(crate) fn row_exists(
    conn: &Connection,
    descriptor: &EntityDescriptor,
    filter: Option<&Predicate>,
) -> RepoResult<bool> {
    let mut binds = Vec::new();
    let sql = exists_sql(descriptor, filter, &mut binds);
    let exists: i64 = conn.query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
    Ok(exists != 0)
}
