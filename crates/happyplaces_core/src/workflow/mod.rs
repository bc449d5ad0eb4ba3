//! User-facing workflows built on the place store.
//!
//! # Responsibility
//! - Drive the list screen and the create/edit screen without UI code.
//! - Expose immutable state snapshots and one-shot notices to the host.

pub mod edit_session;
pub mod place_list;
pub mod route;
