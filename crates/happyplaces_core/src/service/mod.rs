//! Core services shared by workflows and the FFI layer.
//!
//! # Responsibility
//! - Own the place store connection and its live queries.
//! - Keep UI/FFI layers decoupled from repository details.

pub mod live;
pub mod place_store;
