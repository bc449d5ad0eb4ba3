//! Place domain model.
//!
//! # Responsibility
//! - Define the canonical record persisted in `happy_places`.
//! - Own field validation and normalization rules shared by store and workflows.
//!
//! # Invariants
//! - `id == 0` means "not yet created"; positive ids are store-assigned and
//!   never change afterwards.
//! - `title` is non-empty after trimming for every persisted record.
//! - `latitude`/`longitude` are either both set or both unset.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned identifier of a place record.
///
/// `UNSAVED_PLACE_ID` marks drafts that have not been persisted yet.
pub type PlaceId = i64;

/// Identifier carried by records that the store has not assigned yet.
pub const UNSAVED_PLACE_ID: PlaceId = 0;

/// Display format used for the `date` field (`dd.MM.yyyy`).
pub const DISPLAY_DATE_FORMAT: &str = "%d.%m.%Y";

/// Validation errors for place records.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceValidationError {
    EmptyTitle,
    NegativeId(PlaceId),
    PartialCoordinates,
    CoordinateOutOfRange { latitude: f64, longitude: f64 },
}

impl Display for PlaceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::NegativeId(id) => write!(f, "place id must not be negative, got {id}"),
            Self::PartialCoordinates => {
                write!(f, "latitude and longitude must be set together")
            }
            Self::CoordinateOutOfRange {
                latitude,
                longitude,
            } => write!(
                f,
                "coordinates out of range: latitude {latitude}, longitude {longitude}"
            ),
        }
    }
}

impl Error for PlaceValidationError {}

/// Canonical record for one happy place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PlaceFields")]
pub struct Place {
    /// Store-assigned id, `0` before the first save.
    pub id: PlaceId,
    /// Required display title.
    pub title: String,
    /// Free-form description, empty when not provided.
    pub description: String,
    /// Display-formatted date (`dd.MM.yyyy`).
    pub date: String,
    /// Free-text location label entered by the user.
    pub location_name: String,
    /// Path of the attached image, owned by the attachment store when it
    /// lives under the private root.
    pub image_uri: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Deserialize)]
struct PlaceFields {
    #[serde(default)]
    id: PlaceId,
    title: String,
    #[serde(default)]
    description: String,
    date: String,
    #[serde(default)]
    location_name: String,
    #[serde(default)]
    image_uri: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

impl TryFrom<PlaceFields> for Place {
    type Error = PlaceValidationError;

    fn try_from(value: PlaceFields) -> Result<Self, Self::Error> {
        let place = Place {
            id: value.id,
            title: value.title,
            description: value.description,
            date: value.date,
            location_name: value.location_name,
            image_uri: value.image_uri,
            latitude: value.latitude,
            longitude: value.longitude,
        };
        place.validate()?;
        Ok(place)
    }
}

impl Place {
    /// Creates an unsaved place with the given title and display date.
    ///
    /// Remaining fields start empty; the store assigns `id` on insert.
    pub fn new(title: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: UNSAVED_PLACE_ID,
            title: title.into(),
            description: String::new(),
            date: date.into(),
            location_name: String::new(),
            image_uri: None,
            latitude: None,
            longitude: None,
        }
    }

    /// Returns whether the store has assigned an id to this record.
    pub fn is_persisted(&self) -> bool {
        self.id != UNSAVED_PLACE_ID
    }

    /// Returns a copy with title, description and location name trimmed.
    pub fn normalized(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            location_name: self.location_name.trim().to_string(),
            ..self.clone()
        }
    }

    /// Checks record-level invariants before persistence.
    ///
    /// # Errors
    /// - `EmptyTitle` when the trimmed title is empty.
    /// - `NegativeId` when `id < 0`.
    /// - `PartialCoordinates` when only one coordinate is set.
    /// - `CoordinateOutOfRange` when coordinates are not finite or outside
    ///   WGS84 bounds.
    pub fn validate(&self) -> Result<(), PlaceValidationError> {
        if self.id < 0 {
            return Err(PlaceValidationError::NegativeId(self.id));
        }
        if self.title.trim().is_empty() {
            return Err(PlaceValidationError::EmptyTitle);
        }
        match (self.latitude, self.longitude) {
            (None, None) => Ok(()),
            (Some(latitude), Some(longitude)) => validate_coordinates(latitude, longitude),
            _ => Err(PlaceValidationError::PartialCoordinates),
        }
    }
}

/// Checks that a coordinate pair is finite and inside WGS84 bounds.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), PlaceValidationError> {
    let in_range = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);
    if in_range {
        Ok(())
    } else {
        Err(PlaceValidationError::CoordinateOutOfRange {
            latitude,
            longitude,
        })
    }
}

/// Formats today's local date for the `date` field.
pub fn today_display_date() -> String {
    chrono::Local::now()
        .format(DISPLAY_DATE_FORMAT)
        .to_string()
}
