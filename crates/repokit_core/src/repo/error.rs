use crate::db::DbError;
use crate::model::key::CoercionError;
use crate::schema::SchemaError;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure of a repository operation.
///
/// Engine errors are carried unmodified in `Db`; nothing is retried.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Coercion(#[from] CoercionError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },
    #[error(transparent)]
    Db(#[from] DbError),
    /// A stored row does not map onto its entity type.
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    /// The session itself is unusable (poisoned lock, lost blocking task).
    #[error("repository session failed: {0}")]
    Session(String),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Row-mapping failures become `InvalidData`; other engine errors pass through.
pub(crate) fn map_row_error(table: &str, err: rusqlite::Error) -> RepoError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(_, _, source) => {
            RepoError::InvalidData(format!("{table}: {source}"))
        }
        rusqlite::Error::InvalidColumnType(index, name, ty) => RepoError::InvalidData(format!(
            "{table}: column {index} `{name}` has unexpected type {ty}"
        )),
        other => other.into(),
    }
}
