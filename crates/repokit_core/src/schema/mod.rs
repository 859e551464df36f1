//! Explicit entity registration.
//!
//! # Responsibility
//! - Map each entity type to its `EntityDescriptor` in constant time.
//! - Reject malformed layouts (no key, bad identifiers, duplicate columns)
//!   when the type is registered rather than on first use.
//!
//! # Invariants
//! - Every descriptor stored in a registry has passed `validate()`.
//! - A type is registered at most once per registry.

use crate::model::entity::Entity;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use thiserror::Error;

pub mod descriptor;

use descriptor::EntityDescriptor;

/// Entity metadata is missing or malformed. Never retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("entity type `{entity}` is not registered")]
    NotRegistered { entity: String },
    #[error("entity type `{entity}` is already registered")]
    AlreadyRegistered { entity: String },
    #[error("entity `{entity}` has no primary key")]
    MissingPrimaryKey { entity: String },
    #[error("`{0}` is not a valid table, column or relation name")]
    InvalidIdentifier(String),
    #[error("column `{column}` appears more than once in `{entity}`")]
    DuplicateColumn { entity: String, column: String },
    #[error("entity `{entity}` has no field `{field}`")]
    UnknownField { entity: String, field: String },
    #[error("entity `{entity}` does not produce declared field `{field}`")]
    MissingField { entity: String, field: String },
    #[error("entity `{entity}` has no relation `{relation}`")]
    UnknownRelation { entity: String, relation: String },
    #[error("entity `{entity}` does not carry audit fields")]
    NotAudited { entity: String },
    #[error("invalid descriptor for `{entity}`: {message}")]
    InvalidDescriptor { entity: String, message: String },
}

/// Startup-populated map from entity type to descriptor.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: HashMap<TypeId, EntityDescriptor>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores `E::descriptor()`.
    pub fn register<E: Entity>(&mut self) -> Result<&EntityDescriptor, SchemaError> {
        let type_id = TypeId::of::<E>();
        if self.entries.contains_key(&type_id) {
            return Err(SchemaError::AlreadyRegistered {
                entity: type_name::<E>().to_string(),
            });
        }

        let descriptor = E::descriptor();
        descriptor.validate()?;
        Ok(self.entries.entry(type_id).or_insert(descriptor))
    }

    /// Chaining form of `register` for startup code.
    pub fn with<E: Entity>(mut self) -> Result<Self, SchemaError> {
        self.register::<E>()?;
        Ok(self)
    }

    pub fn descriptor<E: Entity>(&self) -> Result<&EntityDescriptor, SchemaError> {
        self.entries
            .get(&TypeId::of::<E>())
            .ok_or_else(|| SchemaError::NotRegistered {
                entity: type_name::<E>().to_string(),
            })
    }

    pub fn is_registered<E: Entity>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<E>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
