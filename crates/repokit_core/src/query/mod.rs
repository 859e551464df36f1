//! Filter construction and statement rendering.
//!
//! # Responsibility
//! - Build key predicates from opaque identifiers (`key`).
//! - Describe filters as data (`predicate`) and read behaviour (`options`).
//! - Render both into parameterized SQLite statements (`sql`).

pub mod key;
pub mod options;
pub mod predicate;
pub(crate) mod sql;
