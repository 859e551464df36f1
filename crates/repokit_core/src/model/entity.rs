//! Row mapping contract implemented by every persisted type.

use crate::model::audit::AuditFields;
use crate::repo::error::RepoResult;
use crate::repo::read::RelationLoader;
use crate::schema::descriptor::EntityDescriptor;
use crate::schema::SchemaError;
use rusqlite::types::Value;
use rusqlite::Row;

/// A Rust type persisted as one row of one table.
///
/// `to_fields` returns the key and domain columns declared by `descriptor`;
/// audit columns are handled by the repository through `audit`/`audit_mut`
/// and must not be listed.
///
/// ```ignore
/// impl Entity for Order {
///     fn descriptor() -> EntityDescriptor {
///         EntityDescriptor::new("orders")
///             .key("id", KeyType::Integer)
///             .column("customer")
///             .audited()
///     }
///     // ...
/// }
/// ```
pub trait Entity: Sized + 'static {
    fn descriptor() -> EntityDescriptor;

    fn to_fields(&self) -> Vec<(&'static str, Value)>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Audit record, for types whose descriptor is `audited()`.
    fn audit(&self) -> Option<&AuditFields> {
        None
    }

    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        None
    }

    /// Fills the relation `name` requested through `QueryOptions::include`.
    fn load_relation(&mut self, name: &str, _loader: &RelationLoader<'_>) -> RepoResult<()> {
        Err(SchemaError::UnknownRelation {
            entity: std::any::type_name::<Self>().to_string(),
            relation: name.to_string(),
        }
        .into())
    }
}

/// Domain fields plus audit columns, as predicates see an instance.
pub(crate) fn observed_fields<E: Entity>(entity: &E) -> Vec<(&'static str, Value)> {
    let mut fields = entity.to_fields();
    if let Some(audit) = entity.audit() {
        fields.extend(audit.to_columns());
    }
    fields
}
