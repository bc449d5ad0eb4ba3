//! Domain model for happy place records.
//!
//! # Responsibility
//! - Define canonical data structures used by store and workflows.
//!
//! # Invariants
//! - Every persisted record is identified by a store-assigned `PlaceId`.
//! - Deletion removes the row; there are no tombstones.

pub mod place;
