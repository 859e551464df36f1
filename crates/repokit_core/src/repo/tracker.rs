//! Session change tracking.
//!
//! # Invariants
//! - At most one snapshot per (entity type, key).
//! - A snapshot holds the stored column values as of the last read or write
//!   in this session, in descriptor column order.

use rusqlite::types::Value;
use std::any::TypeId;
use std::collections::HashMap;

pub(crate) type Row = Vec<(&'static str, Value)>;

#[derive(Debug, Default, Clone)]
pub(crate) struct ChangeTracker {
    snapshots: HashMap<(TypeId, String), Row>,
}

impl ChangeTracker {
    pub(crate) fn track<E: 'static>(&mut self, key: String, row: Row) {
        self.snapshots.insert((TypeId::of::<E>(), key), row);
    }

    pub(crate) fn snapshot<E: 'static>(&self, key: &str) -> Option<&Row> {
        self.snapshots.get(&(TypeId::of::<E>(), key.to_string()))
    }

    pub(crate) fn forget<E: 'static>(&mut self, key: &str) {
        self.snapshots.remove(&(TypeId::of::<E>(), key.to_string()));
    }

    pub(crate) fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshots.len()
    }
}

/// Columns of `current` whose value differs from `snapshot`. Columns missing
/// from the snapshot count as changed.
pub(crate) fn changed_columns(snapshot: &Row, current: &Row) -> Row {
    current
        .iter()
        .filter(|(name, value)| {
            snapshot
                .iter()
                .find(|(column, _)| column == name)
                .map_or(true, |(_, before)| before != value)
        })
        .cloned()
        .collect()
}
