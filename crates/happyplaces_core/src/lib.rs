//! Core domain logic for Happy Places.
//! This crate is the single source of truth for record and attachment invariants.

pub mod app;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;
pub mod workflow;

pub use app::{AppConfig, AppContext, AppError, AppResult};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::place::{
    today_display_date, Place, PlaceId, PlaceValidationError, UNSAVED_PLACE_ID,
};
pub use repo::place_repo::{PlaceRepository, RepoError, RepoResult, SqlitePlaceRepository};
pub use service::live::Subscription;
pub use service::place_store::PlaceStore;
pub use storage::attachments::{AttachmentError, AttachmentStore};
pub use workflow::edit_session::{
    Draft, EditEvent, EditPhase, EditSession, EditState, ImageSource, SessionNotice,
};
pub use workflow::place_list::{ListIntent, ListSnapshot, PlaceList};
pub use workflow::route::{Navigator, Route, RouteError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
