//! Application-private file storage.
//!
//! # Responsibility
//! - Own copies of user-selected images referenced by place records.
//!
//! # Invariants
//! - Only files under the private root are ever deleted.

pub mod attachments;
