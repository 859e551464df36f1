//! Entity-side contracts.
//!
//! # Responsibility
//! - Describe how a Rust type maps onto one table row (`Entity`).
//! - Carry the audit/soft-delete convention record (`AuditFields`).
//! - Model opaque identifiers and their coercion to declared key types.
//!
//! # Invariants
//! - `creation_date` is stamped once, on insert.
//! - `deletion_date` and `is_deleted` are stamped once, on soft delete, and
//!   never reset by this crate.

pub mod audit;
pub mod clock;
pub mod entity;
pub mod key;
