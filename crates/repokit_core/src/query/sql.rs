//! SQLite statement rendering.
//!
//! Identifiers are validated at registration and predicate fields are checked
//! against the descriptor before rendering, so quoting here only guards
//! against keyword clashes. Every value travels as a bound parameter.

use crate::query::options::Direction;
use crate::query::predicate::Predicate;
use crate::schema::descriptor::EntityDescriptor;
use rusqlite::types::Value;

pub(crate) fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

impl Predicate {
    /// Renders a boolean SQL expression with `?` placeholders, appending the
    /// bound values to `binds` in placeholder order.
    pub fn to_sql(&self, binds: &mut Vec<Value>) -> String {
        match self {
            Self::True => "1 = 1".to_string(),
            Self::False => "1 = 0".to_string(),
            Self::And(parts) if parts.is_empty() => "1 = 1".to_string(),
            Self::Or(parts) if parts.is_empty() => "1 = 0".to_string(),
            Self::And(parts) => join(parts, " AND ", binds),
            Self::Or(parts) => join(parts, " OR ", binds),
            Self::Not(inner) => format!("NOT ({})", inner.to_sql(binds)),
            Self::Compare { field, op, value } => {
                binds.push(value.clone());
                format!("{} {} ?", quote(field), op.sql())
            }
            Self::In { values, .. } if values.is_empty() => "1 = 0".to_string(),
            Self::In { field, values } => {
                binds.extend(values.iter().cloned());
                let placeholders = vec!["?"; values.len()].join(", ");
                format!("{} IN ({placeholders})", quote(field))
            }
            Self::IsNull { field } => format!("{} IS NULL", quote(field)),
        }
    }
}

fn join(parts: &[Predicate], separator: &str, binds: &mut Vec<Value>) -> String {
    let rendered: Vec<String> = parts.iter().map(|part| part.to_sql(binds)).collect();
    format!("({})", rendered.join(separator))
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|column| quote(column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(filter: Option<&Predicate>, binds: &mut Vec<Value>) -> String {
    match filter {
        Some(predicate) => format!(" WHERE {}", predicate.to_sql(binds)),
        None => String::new(),
    }
}

/// `SELECT` of every stored column. Without explicit ordering, rows come back
/// in key order so paging is stable.
pub(crate) fn select_sql(
    descriptor: &EntityDescriptor,
    filter: Option<&Predicate>,
    order_by: &[(String, Direction)],
    limit: Option<u32>,
    offset: u32,
    binds: &mut Vec<Value>,
) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}",
        column_list(&descriptor.all_columns()),
        quote(descriptor.table())
    );
    sql.push_str(&where_clause(filter, binds));

    let ordering: Vec<String> = if order_by.is_empty() {
        descriptor
            .key_fields()
            .iter()
            .map(|field| format!("{} ASC", quote(&field.name)))
            .collect()
    } else {
        order_by
            .iter()
            .map(|(field, direction)| format!("{} {}", quote(field), direction.sql()))
            .collect()
    };
    if !ordering.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&ordering.join(", "));
    }

    match limit {
        Some(limit) => {
            sql.push_str(" LIMIT ?");
            binds.push(Value::Integer(i64::from(limit)));
            if offset > 0 {
                sql.push_str(" OFFSET ?");
                binds.push(Value::Integer(i64::from(offset)));
            }
        }
        None if offset > 0 => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            binds.push(Value::Integer(i64::from(offset)));
        }
        None => {}
    }
    sql
}

pub(crate) fn count_sql(
    descriptor: &EntityDescriptor,
    filter: Option<&Predicate>,
    binds: &mut Vec<Value>,
) -> String {
    format!(
        "SELECT COUNT(*) FROM {}{}",
        quote(descriptor.table()),
        where_clause(filter, binds)
    )
}

pub(crate) fn exists_sql(
    descriptor: &EntityDescriptor,
    filter: Option<&Predicate>,
    binds: &mut Vec<Value>,
) -> String {
    format!(
        "SELECT EXISTS(SELECT 1 FROM {}{})",
        quote(descriptor.table()),
        where_clause(filter, binds)
    )
}

pub(crate) fn insert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote(table),
        column_list(columns)
    )
}

/// `UPDATE` setting `columns`; their values must already be in `binds`.
pub(crate) fn update_sql(
    table: &str,
    columns: &[&str],
    key: &Predicate,
    binds: &mut Vec<Value>,
) -> String {
    let assignments = columns
        .iter()
        .map(|column| format!("{} = ?", quote(column)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {assignments} WHERE {}",
        quote(table),
        key.to_sql(binds)
    )
}

pub(crate) fn delete_sql(table: &str, key: &Predicate, binds: &mut Vec<Value>) -> String {
    format!("DELETE FROM {} WHERE {}", quote(table), key.to_sql(binds))
}
