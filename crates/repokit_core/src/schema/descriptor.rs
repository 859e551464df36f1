//! Per-entity persistence metadata.

use crate::model::audit::AUDIT_COLUMNS;
use crate::model::key::{KeyField, KeyType};
use crate::query::predicate::Predicate;
use crate::schema::SchemaError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Table, key and column layout of one entity type.
///
/// Built once per type through `Entity::descriptor` and checked by
/// `SchemaRegistry::register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    table: String,
    key_fields: Vec<KeyField>,
    columns: Vec<String>,
    relations: Vec<String>,
    audited: bool,
    keyless: bool,
}

impl EntityDescriptor {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_fields: Vec::new(),
            columns: Vec::new(),
            relations: Vec::new(),
            audited: false,
            keyless: false,
        }
    }

    /// Adds a primary-key column. Call repeatedly for composite keys; the
    /// call order is the component order of composite identifiers.
    pub fn key(mut self, name: impl Into<String>, key_type: KeyType) -> Self {
        self.key_fields.push(KeyField::new(name, key_type));
        self
    }

    pub fn nullable_key(mut self, name: impl Into<String>, key_type: KeyType) -> Self {
        self.key_fields.push(KeyField::nullable(name, key_type));
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    pub fn columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(names.into_iter().map(Into::into));
        self
    }

    /// Appends the audit/soft-delete columns to the table layout.
    pub fn audited(mut self) -> Self {
        self.audited = true;
        self
    }

    /// Declares a query-only type (e.g. a view) without a primary key.
    pub fn keyless(mut self) -> Self {
        self.keyless = true;
        self
    }

    pub fn relation(mut self, name: impl Into<String>) -> Self {
        self.relations.push(name.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key_fields(&self) -> &[KeyField] {
        &self.key_fields
    }

    pub fn columns_without_key(&self) -> &[String] {
        &self.columns
    }

    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    pub fn is_audited(&self) -> bool {
        self.audited
    }

    pub fn is_keyless(&self) -> bool {
        self.keyless
    }

    /// Every stored column: key fields, domain columns, then audit columns.
    pub fn all_columns(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self
            .key_fields
            .iter()
            .map(|field| field.name.as_str())
            .chain(self.columns.iter().map(String::as_str))
            .collect();
        if self.audited {
            all.extend(AUDIT_COLUMNS);
        }
        all
    }

    /// Key and domain columns, the set `Entity::to_fields` must produce.
    pub fn entity_columns(&self) -> Vec<&str> {
        self.key_fields
            .iter()
            .map(|field| field.name.as_str())
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.key_fields.iter().any(|field| field.name == name)
            || self.columns.iter().any(|column| column == name)
            || (self.audited && AUDIT_COLUMNS.contains(&name))
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.iter().any(|relation| relation == name)
    }

    pub(crate) fn check_field(&self, field: &str) -> Result<(), SchemaError> {
        if self.has_column(field) {
            return Ok(());
        }
        Err(SchemaError::UnknownField {
            entity: self.table.clone(),
            field: field.to_string(),
        })
    }

    pub(crate) fn check_predicate(&self, predicate: &Predicate) -> Result<(), SchemaError> {
        predicate
            .fields()
            .into_iter()
            .try_for_each(|field| self.check_field(field))
    }

    pub(crate) fn validate(&self) -> Result<(), SchemaError> {
        check_identifier(&self.table)?;

        if self.keyless && !self.key_fields.is_empty() {
            return Err(SchemaError::InvalidDescriptor {
                entity: self.table.clone(),
                message: "keyless entities cannot declare key fields".to_string(),
            });
        }
        if !self.keyless && self.key_fields.is_empty() {
            return Err(SchemaError::MissingPrimaryKey {
                entity: self.table.clone(),
            });
        }

        let mut seen = HashSet::new();
        for column in self.all_columns() {
            check_identifier(column)?;
            if !seen.insert(column) {
                return Err(SchemaError::DuplicateColumn {
                    entity: self.table.clone(),
                    column: column.to_string(),
                });
            }
        }

        let mut seen_relations = HashSet::new();
        for relation in &self.relations {
            check_identifier(relation)?;
            if !seen_relations.insert(relation.as_str()) {
                return Err(SchemaError::InvalidDescriptor {
                    entity: self.table.clone(),
                    message: format!("relation `{relation}` declared twice"),
                });
            }
        }
        Ok(())
    }
}

fn check_identifier(name: &str) -> Result<(), SchemaError> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}
