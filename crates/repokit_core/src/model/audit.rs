//! Audit and soft-delete convention record.
//!
//! # Invariants
//! - Timestamps are UTC and persisted as fixed-width RFC 3339 text with
//!   nanosecond precision, so they round-trip exactly and sort as text.
//! - `is_deleted` is persisted as `0`/`1`; any other stored value is rejected.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Row;

pub const CREATION_DATE: &str = "creation_date";
pub const MODIFICATION_DATE: &str = "modification_date";
pub const DELETION_DATE: &str = "deletion_date";
pub const IS_DELETED: &str = "is_deleted";

/// Column names appended to every audited entity, in storage order.
pub const AUDIT_COLUMNS: [&str; 4] = [CREATION_DATE, MODIFICATION_DATE, DELETION_DATE, IS_DELETED];

/// Lifecycle stamps carried by audited entities.
///
/// Callers construct entities with `AuditFields::default()`; the repository
/// fills the stamps. Writing them by hand is possible but bypasses the
/// convention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFields {
    /// `None` until the record is inserted.
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    pub deletion_date: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

impl AuditFields {
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    pub(crate) fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.creation_date = Some(at);
    }

    pub(crate) fn stamp_modified(&mut self, at: DateTime<Utc>) {
        self.modification_date = Some(at);
    }

    /// Flags the record deleted. Returns `false` when it already was, in
    /// which case the original `deletion_date` is kept.
    pub(crate) fn mark_deleted(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_deleted {
            return false;
        }
        self.is_deleted = true;
        self.deletion_date = Some(at);
        true
    }

    /// Storage values in `AUDIT_COLUMNS` order.
    pub fn to_columns(&self) -> [(&'static str, Value); 4] {
        [
            (CREATION_DATE, optional_timestamp(self.creation_date)),
            (MODIFICATION_DATE, optional_timestamp(self.modification_date)),
            (DELETION_DATE, optional_timestamp(self.deletion_date)),
            (IS_DELETED, Value::Integer(i64::from(self.is_deleted))),
        ]
    }

    /// Reads the four audit columns from a result row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let is_deleted = match row.get::<_, i64>(IS_DELETED)? {
            0 => false,
            1 => true,
            other => {
                return Err(conversion_error(
                    row,
                    IS_DELETED,
                    Type::Integer,
                    format!("invalid {IS_DELETED} value `{other}`"),
                ))
            }
        };

        Ok(Self {
            creation_date: read_timestamp(row, CREATION_DATE)?,
            modification_date: read_timestamp(row, MODIFICATION_DATE)?,
            deletion_date: read_timestamp(row, DELETION_DATE)?,
            is_deleted,
        })
    }
}

/// Canonical text form of a stored timestamp.
pub fn timestamp_to_db(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|parsed| parsed.with_timezone(&Utc))
}

fn optional_timestamp(at: Option<DateTime<Utc>>) -> Value {
    at.map_or(Value::Null, |at| Value::Text(timestamp_to_db(at)))
}

fn read_timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let Some(text) = row.get::<_, Option<String>>(column)? else {
        return Ok(None);
    };
    parse_timestamp(&text).map(Some).map_err(|err| {
        conversion_error(
            row,
            column,
            Type::Text,
            format!("invalid timestamp `{text}` in {column}: {err}"),
        )
    })
}

fn conversion_error(row: &Row<'_>, column: &str, ty: Type, message: String) -> rusqlite::Error {
    let index = row.as_ref().column_index(column).unwrap_or_default();
    rusqlite::Error::FromSqlConversionFailure(index, ty, message.into())
}
