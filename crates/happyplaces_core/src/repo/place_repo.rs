//! Place repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over the `happy_places` table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Place::validate()` before SQL mutations.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - `list_places` is always ordered by `id DESC` (newest first).

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::place::{Place, PlaceId, PlaceValidationError, UNSAVED_PLACE_ID};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PLACE_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    date,
    location_name,
    image_uri,
    latitude,
    longitude
FROM happy_places";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for place persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(PlaceValidationError),
    Db(DbError),
    NotFound(PlaceId),
    InvalidData(String),
    SchemaNotReady { expected: u32, actual: u32 },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "place not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted place data: {message}"),
            Self::SchemaNotReady { expected, actual } => write!(
                f,
                "connection schema version {actual} does not match required {expected}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PlaceValidationError> for RepoError {
    fn from(value: PlaceValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for place CRUD operations.
pub trait PlaceRepository {
    /// Inserts a place and returns its id.
    ///
    /// `id == 0` requests a fresh id; an existing id is replaced in place.
    fn insert_place(&self, place: &Place) -> RepoResult<PlaceId>;
    /// Overwrites every field of an existing place.
    fn update_place(&self, place: &Place) -> RepoResult<()>;
    /// Removes a place row by id.
    fn delete_place(&self, id: PlaceId) -> RepoResult<()>;
    fn get_place(&self, id: PlaceId) -> RepoResult<Option<Place>>;
    /// Lists every place, newest first.
    fn list_places(&self) -> RepoResult<Vec<Place>>;
}

/// SQLite-backed place repository.
pub struct SqlitePlaceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePlaceRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `SchemaNotReady` when migrations have not been applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual = current_version(conn)?;
        let expected = latest_version();
        if actual != expected {
            return Err(RepoError::SchemaNotReady { expected, actual });
        }
        Ok(Self { conn })
    }
}

impl PlaceRepository for SqlitePlaceRepository<'_> {
    fn insert_place(&self, place: &Place) -> RepoResult<PlaceId> {
        place.validate()?;

        let id = (place.id != UNSAVED_PLACE_ID).then_some(place.id);
        self.conn.execute(
            "INSERT OR REPLACE INTO happy_places (
                id,
                title,
                description,
                date,
                location_name,
                image_uri,
                latitude,
                longitude
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id,
                place.title.as_str(),
                place.description.as_str(),
                place.date.as_str(),
                place.location_name.as_str(),
                place.image_uri.as_deref(),
                place.latitude,
                place.longitude,
            ],
        )?;

        Ok(id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    fn update_place(&self, place: &Place) -> RepoResult<()> {
        place.validate()?;

        let changed = self.conn.execute(
            "UPDATE happy_places
             SET
                title = ?1,
                description = ?2,
                date = ?3,
                location_name = ?4,
                image_uri = ?5,
                latitude = ?6,
                longitude = ?7
             WHERE id = ?8;",
            params![
                place.title.as_str(),
                place.description.as_str(),
                place.date.as_str(),
                place.location_name.as_str(),
                place.image_uri.as_deref(),
                place.latitude,
                place.longitude,
                place.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(place.id));
        }
        Ok(())
    }

    fn delete_place(&self, id: PlaceId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM happy_places WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn get_place(&self, id: PlaceId) -> RepoResult<Option<Place>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{PLACE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_place_row(row)?));
        }
        Ok(None)
    }

    fn list_places(&self) -> RepoResult<Vec<Place>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{PLACE_SELECT_SQL} ORDER BY id DESC;"))?;
        let mut rows = stmt.query([])?;
        let mut places = Vec::new();
        while let Some(row) = rows.next()? {
            places.push(parse_place_row(row)?);
        }
        Ok(places)
    }
}

fn parse_place_row(row: &Row<'_>) -> RepoResult<Place> {
    let place = Place {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        date: row.get("date")?,
        location_name: row.get("location_name")?,
        image_uri: row.get("image_uri")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
    };
    place.validate().map_err(|err| {
        RepoError::InvalidData(format!("row {} in happy_places: {err}", place.id))
    })?;
    Ok(place)
}
