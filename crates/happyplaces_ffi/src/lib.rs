//! Flutter bridge for the Happy Places core.

pub mod api;
