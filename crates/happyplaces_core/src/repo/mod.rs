//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for place records.
//! - Isolate SQLite query details from store and workflow orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Place::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod place_repo;
