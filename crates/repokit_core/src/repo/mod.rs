//! Repository sessions and persistence paths.
//!
//! # Responsibility
//! - Provide one typed CRUD/query surface for every registered entity.
//! - Keep SQL details behind the session boundary.
//!
//! # Invariants
//! - Writes stamp audit fields before SQL mutations.
//! - Read paths reject rows that do not map onto their entity instead of
//!   masking them (`RepoError::InvalidData`).
//! - Identifier-based operations surface absence as `RepoError::NotFound`.

pub mod async_repository;
pub mod error;
pub mod read;
pub mod repository;
pub(crate) mod tracker;
pub(crate) mod write;
