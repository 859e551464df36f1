//! Read configuration shared by every query entry point.

use crate::model::audit::IS_DELETED;
use crate::query::predicate::Predicate;
use crate::schema::descriptor::EntityDescriptor;
use crate::schema::SchemaError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Optional behaviours of a read, composed once instead of one method per
/// combination.
///
/// `QueryOptions::default()` tracks changes, applies no filter and returns
/// soft-deleted rows too.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Record loaded rows in the session tracker.
    pub track_changes: bool,
    pub filter: Option<Predicate>,
    pub order_by: Vec<(String, Direction)>,
    pub limit: Option<u32>,
    pub offset: u32,
    /// Relation names passed to `Entity::load_relation` for each result.
    pub include: Vec<String>,
    /// Hide soft-deleted rows (audited entities only).
    pub exclude_deleted: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            track_changes: true,
            filter: None,
            order_by: Vec::new(),
            limit: None,
            offset: 0,
            include: Vec::new(),
            exclude_deleted: false,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn untracked(mut self) -> Self {
        self.track_changes = false;
        self
    }

    /// Adds `predicate`, AND-ed with any filter already set.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.include.push(relation.into());
        self
    }

    pub fn exclude_deleted(mut self) -> Self {
        self.exclude_deleted = true;
        self
    }

    /// Checks every referenced field and relation against `descriptor` and
    /// returns the filter to send to the engine.
    pub(crate) fn resolve_filter(
        &self,
        descriptor: &EntityDescriptor,
        extra: Option<Predicate>,
    ) -> Result<Option<Predicate>, SchemaError> {
        for (field, _) in &self.order_by {
            descriptor.check_field(field)?;
        }
        for relation in &self.include {
            if !descriptor.has_relation(relation) {
                return Err(SchemaError::UnknownRelation {
                    entity: descriptor.table().to_string(),
                    relation: relation.clone(),
                });
            }
        }

        let mut filter = self.filter.clone();
        if self.exclude_deleted {
            if !descriptor.is_audited() {
                return Err(SchemaError::NotAudited {
                    entity: descriptor.table().to_string(),
                });
            }
            filter = Some(and_optional(filter, Predicate::eq(IS_DELETED, 0)));
        }
        if let Some(extra) = extra {
            filter = Some(and_optional(filter, extra));
        }

        if let Some(predicate) = &filter {
            descriptor.check_predicate(predicate)?;
        }
        Ok(filter)
    }
}

fn and_optional(existing: Option<Predicate>, next: Predicate) -> Predicate {
    match existing {
        Some(existing) => existing.and(next),
        None => next,
    }
}
