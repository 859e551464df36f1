//! Primary-key predicates.
//!
//! # Invariants
//! - A key predicate constrains every declared key field, in declaration order.
//! - Identifier components are coerced to the declared key type before they
//!   reach a statement; nothing is compared as raw caller input.

use crate::model::entity::Entity;
use crate::model::key::{coerce_key, CoercionError, KeyField, KeyValue};
use crate::query::predicate::Predicate;
use crate::repo::error::RepoResult;
use crate::schema::descriptor::EntityDescriptor;
use crate::schema::SchemaError;
use rusqlite::types::Value;

/// Builds the predicate selecting the row whose key equals `id`.
///
/// Single-field keys take a scalar identifier. Composite keys take
/// `KeyValue::Composite` with one component per key field; any other shape is
/// a `CoercionError::Arity`. A `Null` component yields `IS NULL` for nullable
/// key fields and a `CoercionError` otherwise.
pub fn key_predicate(descriptor: &EntityDescriptor, id: &KeyValue) -> RepoResult<Predicate> {
    let values = coerce_identifier(descriptor, id)?;
    key_predicate_from_values(descriptor, &values)
}

/// Coerces `id` into one storage value per key field.
pub(crate) fn coerce_identifier(
    descriptor: &EntityDescriptor,
    id: &KeyValue,
) -> RepoResult<Vec<Value>> {
    let fields = require_key(descriptor)?;

    let components: Vec<&KeyValue> = match (fields.len(), id) {
        (1, KeyValue::Composite(parts)) if parts.len() == 1 => vec![&parts[0]],
        (1, KeyValue::Composite(parts)) => {
            return Err(CoercionError::Arity {
                expected: 1,
                actual: parts.len(),
            }
            .into())
        }
        (1, scalar) => vec![scalar],
        (expected, KeyValue::Composite(parts)) if parts.len() == expected => {
            parts.iter().collect()
        }
        (expected, KeyValue::Composite(parts)) => {
            return Err(CoercionError::Arity {
                expected,
                actual: parts.len(),
            }
            .into())
        }
        (expected, _) => return Err(CoercionError::Arity { expected, actual: 1 }.into()),
    };

    let values = fields
        .iter()
        .zip(components)
        .map(|(field, component)| coerce_key(field, component))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values)
}

/// Key values read off an instance, in key declaration order.
pub(crate) fn instance_key<E: Entity>(
    descriptor: &EntityDescriptor,
    entity: &E,
) -> RepoResult<Vec<Value>> {
    let fields = require_key(descriptor)?;
    let mut observed = entity.to_fields();

    let mut values = Vec::with_capacity(fields.len());
    for field in fields {
        let position = observed
            .iter()
            .position(|(name, _)| *name == field.name)
            .ok_or_else(|| SchemaError::MissingField {
                entity: descriptor.table().to_string(),
                field: field.name.clone(),
            })?;
        values.push(observed.swap_remove(position).1);
    }
    Ok(values)
}

/// Equality (or `IS NULL`) on every key field against already-coerced values.
pub(crate) fn key_predicate_from_values(
    descriptor: &EntityDescriptor,
    values: &[Value],
) -> RepoResult<Predicate> {
    let fields = require_key(descriptor)?;
    if fields.len() != values.len() {
        return Err(CoercionError::Arity {
            expected: fields.len(),
            actual: values.len(),
        }
        .into());
    }

    let mut clauses = fields
        .iter()
        .zip(values)
        .map(|(field, value)| match value {
            Value::Null => Predicate::is_null(field.name.clone()),
            value => Predicate::eq(field.name.clone(), value.clone()),
        })
        .collect::<Vec<_>>();

    if clauses.len() == 1 {
        Ok(clauses.remove(0))
    } else {
        Ok(Predicate::And(clauses))
    }
}

/// Human-readable key used in tracker entries and `NotFound` errors.
pub(crate) fn key_repr(values: &[Value]) -> String {
    let parts = values
        .iter()
        .map(|value| match value {
            Value::Null => "null".to_string(),
            Value::Integer(number) => number.to_string(),
            Value::Real(number) => number.to_string(),
            Value::Text(text) => format!("{text:?}"),
            Value::Blob(bytes) => format!("blob({} bytes)", bytes.len()),
        })
        .collect::<Vec<_>>();

    if parts.len() == 1 {
        parts.concat()
    } else {
        format!("({})", parts.join(", "))
    }
}

fn require_key(descriptor: &EntityDescriptor) -> Result<&[KeyField], SchemaError> {
    if descriptor.is_keyless() || descriptor.key_fields().is_empty() {
        return Err(SchemaError::MissingPrimaryKey {
            entity: descriptor.table().to_string(),
        });
    }
    Ok(descriptor.key_fields())
}
