//! Process-wide application context.
//!
//! # Responsibility
//! - Resolve storage locations from a data directory and the environment.
//! - Open the database and attachment root once and hand them to workflows.
//! - Close the database explicitly on shutdown.
//!
//! # Invariants
//! - Workflows receive the store by injection; nothing looks it up globally.
//! - `close` fails instead of dropping a connection still shared by workflows.

use crate::db::{open_db, DbError};
use crate::model::place::PlaceId;
use crate::repo::place_repo::{RepoError, RepoResult};
use crate::service::place_store::PlaceStore;
use crate::storage::attachments::{AttachmentError, AttachmentStore};
use crate::workflow::edit_session::EditSession;
use crate::workflow::place_list::PlaceList;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DB_FILE_NAME: &str = "happy_places.sqlite3";
pub const ATTACHMENTS_DIR_NAME: &str = "images";
pub const DB_PATH_ENV: &str = "HAPPYPLACES_DB_PATH";
pub const ATTACHMENTS_DIR_ENV: &str = "HAPPYPLACES_ATTACHMENTS_DIR";

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    Io { path: PathBuf, source: std::io::Error },
    Db(DbError),
    Repo(RepoError),
    Attachment(AttachmentError),
    /// Workflows still hold the store.
    StoreInUse,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot prepare `{}`: {source}", path.display())
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Attachment(err) => write!(f, "{err}"),
            Self::StoreInUse => write!(f, "place store is still in use"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Attachment(err) => Some(err),
            Self::StoreInUse => None,
        }
    }
}

impl From<DbError> for AppError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for AppError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AttachmentError> for AppError {
    fn from(value: AttachmentError) -> Self {
        Self::Attachment(value)
    }
}

/// Storage locations for one application instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub attachments_dir: PathBuf,
}

impl AppConfig {
    /// Default layout under `data_dir`.
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            db_path: data_dir.join(DB_FILE_NAME),
            attachments_dir: data_dir.join(ATTACHMENTS_DIR_NAME),
        }
    }

    /// Default layout with `HAPPYPLACES_*` environment overrides applied.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Self {
        Self::for_data_dir(data_dir).with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; blank values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };
        if let Some(path) = read(DB_PATH_ENV) {
            self.db_path = path;
        }
        if let Some(path) = read(ATTACHMENTS_DIR_ENV) {
            self.attachments_dir = path;
        }
        self
    }
}

/// Opened database and attachment root, shared by all workflows.
pub struct AppContext {
    config: AppConfig,
    store: Arc<PlaceStore>,
}

impl AppContext {
    /// Opens storage described by `config`, creating directories as needed.
    pub fn open(config: AppConfig) -> AppResult<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AppError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let attachments = Arc::new(AttachmentStore::open(&config.attachments_dir)?);
        let conn = open_db(&config.db_path)?;
        let store = Arc::new(PlaceStore::new(conn, attachments)?);

        info!(
            "event=app_open module=app status=ok db_path={} attachments_dir={}",
            config.db_path.display(),
            config.attachments_dir.display()
        );
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PlaceStore> {
        &self.store
    }

    pub fn place_list(&self) -> RepoResult<PlaceList> {
        PlaceList::open(&self.store)
    }

    /// Opens an edit session; `None` or `0` starts a new place.
    pub fn edit_session(&self, place_id: Option<PlaceId>) -> RepoResult<EditSession> {
        EditSession::open(Arc::clone(&self.store), place_id)
    }

    /// Closes the database.
    ///
    /// # Errors
    /// - `StoreInUse` while an edit session or other holder keeps the store;
    ///   the context is dropped either way.
    pub fn close(self) -> AppResult<()> {
        let store = Arc::try_unwrap(self.store).map_err(|_| AppError::StoreInUse)?;
        store.close()?;
        info!("event=app_close module=app status=ok");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ATTACHMENTS_DIR_ENV, DB_PATH_ENV};
    use std::path::PathBuf;

    #[test]
    fn for_data_dir_uses_default_layout() {
        let config = AppConfig::for_data_dir("/data/app");
        assert_eq!(
            config.db_path,
            PathBuf::from("/data/app/happy_places.sqlite3")
        );
        assert_eq!(config.attachments_dir, PathBuf::from("/data/app/images"));
    }

    #[test]
    fn overrides_replace_paths_and_ignore_blank_values() {
        let config = AppConfig::for_data_dir("/data/app").with_overrides(|key| match key {
            DB_PATH_ENV => Some(" /tmp/places.db ".to_string()),
            ATTACHMENTS_DIR_ENV => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.db_path, PathBuf::from("/tmp/places.db"));
        assert_eq!(config.attachments_dir, PathBuf::from("/data/app/images"));
    }
}
