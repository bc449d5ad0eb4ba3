//! Create-or-update workflow for one place.
//!
//! # Responsibility
//! - Hold the in-memory draft while a place is created or edited.
//! - Coordinate image adoption/release with the draft and the stored record.
//! - Commit the draft to the store only on explicit save.
//!
//! # Invariants
//! - The draft never references a partially written file.
//! - A replaced image is released only after its replacement is fully adopted.
//! - The image of the stored record is released only after a save that stops
//!   referencing it has committed.
//! - Notices are one-shot: `take_notices` drains them.

use crate::model::place::{
    today_display_date, validate_coordinates, Place, PlaceId, UNSAVED_PLACE_ID,
};
use crate::repo::place_repo::RepoResult;
use crate::service::live::{lock, Subscription};
use crate::service::place_store::PlaceStore;
use log::{error, info, warn};
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const MSG_PLACE_NOT_FOUND: &str = "Place not found.";
pub const MSG_TITLE_REQUIRED: &str = "Title must not be empty.";
pub const MSG_IMAGE_FAILED: &str = "Could not process the image.";
pub const MSG_SAVE_FAILED: &str = "Could not save the place.";
pub const MSG_DELETE_FAILED: &str = "Could not delete the place.";
pub const MSG_COORDINATES_INVALID: &str = "Coordinates are out of range.";

/// Lifecycle phase of an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    /// Waiting for the stored record to arrive.
    Loading,
    /// Draft is editable.
    Ready,
    /// A store write is in flight; further saves are ignored.
    Saving,
    /// The last save committed.
    Saved,
}

/// In-memory, not yet persisted representation of a place.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub date: String,
    pub location: String,
    pub image_uri: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Draft {
    /// Empty draft dated `date`.
    pub fn blank(date: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            date: date.into(),
            location: String::new(),
            image_uri: None,
            latitude: None,
            longitude: None,
        }
    }

    fn from_place(place: &Place) -> Self {
        Self {
            title: place.title.clone(),
            description: place.description.clone(),
            date: place.date.clone(),
            location: place.location_name.clone(),
            image_uri: place.image_uri.clone(),
            latitude: place.latitude,
            longitude: place.longitude,
        }
    }

    fn to_place(&self, id: PlaceId) -> Place {
        Place {
            id,
            title: self.title.clone(),
            description: self.description.clone(),
            date: self.date.clone(),
            location_name: self.location.clone(),
            image_uri: self.image_uri.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
        .normalized()
    }
}

/// Snapshot read by the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub struct EditState {
    pub phase: EditPhase,
    pub draft: Draft,
    /// Id of the record being edited; `None` until a new place is first saved.
    pub place_id: Option<PlaceId>,
    /// Last load/save failure, cleared by the next successful save.
    pub error_message: Option<String>,
}

impl EditState {
    pub fn is_new(&self) -> bool {
        self.place_id.is_none()
    }

    /// Whether the host should enable its save action.
    pub fn can_save(&self) -> bool {
        matches!(self.phase, EditPhase::Ready | EditPhase::Saved)
    }
}

/// Content source for a newly selected image.
pub enum ImageSource {
    /// File readable by the process, for example a picker result.
    File(PathBuf),
    /// Any byte stream, for example a content-provider handle.
    Reader(Box<dyn Read + Send>),
}

impl Debug for ImageSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// User intents sent by the edit screen.
#[derive(Debug)]
pub enum EditEvent {
    TitleChanged(String),
    DescriptionChanged(String),
    DateChanged(String),
    LocationChanged(String),
    /// `None` clears both coordinates.
    CoordinatesChanged(Option<(f64, f64)>),
    /// `None` clears the current image.
    ImageSelected(Option<ImageSource>),
    Save,
}

/// One-shot notifications for the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    Message(String),
    SaveSuccess,
    Deleted,
}

type LoadSlot = Arc<Mutex<Option<Option<Place>>>>;

struct PendingLoad {
    slot: LoadSlot,
    _subscription: Subscription,
}

/// Edit session over one draft.
pub struct EditSession {
    store: Arc<PlaceStore>,
    state: EditState,
    notices: VecDeque<SessionNotice>,
    /// Image referenced by the stored record as last loaded or saved.
    persisted_image: Option<String>,
    pending_load: Option<PendingLoad>,
}

impl EditSession {
    /// Opens a session for `place_id`, or for a new place when the id is
    /// `None` or `0`.
    pub fn open(store: Arc<PlaceStore>, place_id: Option<PlaceId>) -> RepoResult<Self> {
        match place_id.filter(|id| *id != UNSAVED_PLACE_ID) {
            Some(id) => Self::open_existing(store, id),
            None => Ok(Self::open_new(store)),
        }
    }

    /// Starts a new place dated today.
    pub fn open_new(store: Arc<PlaceStore>) -> Self {
        Self::with_state(
            store,
            EditState {
                phase: EditPhase::Ready,
                draft: Draft::blank(today_display_date()),
                place_id: None,
                error_message: None,
            },
        )
    }

    /// Loads an existing place through a live query; only the first value
    /// is applied to the draft.
    pub fn open_existing(store: Arc<PlaceStore>, id: PlaceId) -> RepoResult<Self> {
        let slot: LoadSlot = Arc::default();
        let sink = Arc::clone(&slot);
        let subscription = store.subscribe_place(id, move |place| {
            let mut first = lock(&sink);
            if first.is_none() {
                *first = Some(place.cloned());
            }
        })?;

        let mut session = Self::with_state(
            store,
            EditState {
                phase: EditPhase::Loading,
                draft: Draft::blank(String::new()),
                place_id: Some(id),
                error_message: None,
            },
        );
        session.pending_load = Some(PendingLoad {
            slot,
            _subscription: subscription,
        });
        session.poll_load();
        Ok(session)
    }

    fn with_state(store: Arc<PlaceStore>, state: EditState) -> Self {
        Self {
            store,
            state,
            notices: VecDeque::new(),
            persisted_image: None,
            pending_load: None,
        }
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    /// Drains pending one-shot notices in emission order.
    pub fn take_notices(&mut self) -> Vec<SessionNotice> {
        self.notices.drain(..).collect()
    }

    /// Applies the loaded record if it has arrived.
    pub fn poll_load(&mut self) {
        let Some(pending) = self.pending_load.as_ref() else {
            return;
        };
        let Some(loaded) = lock(&pending.slot).take() else {
            return;
        };
        self.pending_load = None;

        match loaded {
            Some(place) => {
                self.persisted_image = place.image_uri.clone();
                self.state = EditState {
                    phase: EditPhase::Ready,
                    draft: Draft::from_place(&place),
                    place_id: Some(place.id),
                    error_message: None,
                };
            }
            None => {
                warn!(
                    "event=edit_load module=workflow status=error error_code=not_found place_id={}",
                    self.state.place_id.unwrap_or(UNSAVED_PLACE_ID)
                );
                self.state = EditState {
                    phase: EditPhase::Ready,
                    error_message: Some(MSG_PLACE_NOT_FOUND.to_string()),
                    ..self.state.clone()
                };
                self.notify(MSG_PLACE_NOT_FOUND);
            }
        }
    }

    /// Handles one user intent.
    pub fn on_event(&mut self, event: EditEvent) {
        self.poll_load();
        match event {
            EditEvent::TitleChanged(title) => self.edit_draft(|draft| Draft { title, ..draft }),
            EditEvent::DescriptionChanged(description) => {
                self.edit_draft(|draft| Draft {
                    description,
                    ..draft
                })
            }
            EditEvent::DateChanged(date) => self.edit_draft(|draft| Draft { date, ..draft }),
            EditEvent::LocationChanged(location) => {
                self.edit_draft(|draft| Draft { location, ..draft })
            }
            EditEvent::CoordinatesChanged(coordinates) => self.change_coordinates(coordinates),
            EditEvent::ImageSelected(Some(source)) => self.replace_image(source),
            EditEvent::ImageSelected(None) => self.clear_image(),
            EditEvent::Save => self.save(),
        }
    }

    /// Ends the session without saving.
    ///
    /// Releases an image adopted during this session unless the stored
    /// record still references it.
    pub fn discard(mut self) {
        self.poll_load();
        if let Some(image) = self.state.draft.image_uri.take() {
            if self.persisted_image.as_deref() != Some(image.as_str()) {
                self.store.attachments().release(&image);
            }
        }
    }

    /// Deletes the stored record, cascading to its image file.
    ///
    /// Returns `false` for drafts that were never saved.
    pub fn delete(&mut self) -> bool {
        self.poll_load();
        let Some(id) = self.state.place_id else {
            return false;
        };
        if !self.state.can_save() {
            return false;
        }

        let place = self.state.draft.to_place(id);
        match self.store.delete(&place) {
            Ok(()) => {
                if let Some(image) = self.state.draft.image_uri.as_deref() {
                    if self.persisted_image.as_deref() != Some(image) {
                        self.store.attachments().release(image);
                    }
                }
                self.persisted_image = None;
                self.state = EditState {
                    phase: EditPhase::Saved,
                    draft: Draft {
                        image_uri: None,
                        ..self.state.draft.clone()
                    },
                    place_id: None,
                    error_message: None,
                };
                self.notices.push_back(SessionNotice::Deleted);
                true
            }
            Err(err) => {
                error!(
                    "event=edit_delete module=workflow status=error place_id={} error={}",
                    id, err
                );
                self.state = EditState {
                    error_message: Some(format!("Delete failed: {err}")),
                    ..self.state.clone()
                };
                self.notify(MSG_DELETE_FAILED);
                false
            }
        }
    }

    fn edit_draft(&mut self, apply: impl FnOnce(Draft) -> Draft) {
        let phase = match self.state.phase {
            EditPhase::Saved => EditPhase::Ready,
            other => other,
        };
        self.state = EditState {
            phase,
            draft: apply(self.state.draft.clone()),
            ..self.state.clone()
        };
    }

    fn change_coordinates(&mut self, coordinates: Option<(f64, f64)>) {
        match coordinates {
            Some((latitude, longitude)) => {
                if validate_coordinates(latitude, longitude).is_err() {
                    self.notify(MSG_COORDINATES_INVALID);
                    return;
                }
                self.edit_draft(|draft| Draft {
                    latitude: Some(latitude),
                    longitude: Some(longitude),
                    ..draft
                });
            }
            None => self.edit_draft(|draft| Draft {
                latitude: None,
                longitude: None,
                ..draft
            }),
        }
    }

    fn replace_image(&mut self, source: ImageSource) {
        let attachments = Arc::clone(self.store.attachments());
        let adopted = match source {
            ImageSource::File(path) => attachments.adopt_file(path),
            ImageSource::Reader(reader) => attachments.adopt(reader),
        };

        match adopted {
            Ok(path) => {
                let previous = self.state.draft.image_uri.clone();
                self.edit_draft(|draft| Draft {
                    image_uri: Some(path.to_string_lossy().into_owned()),
                    ..draft
                });
                self.release_unpersisted(previous);
            }
            Err(err) => {
                error!(
                    "event=edit_image module=workflow status=error error_code=adopt_failed error={}",
                    err
                );
                self.clear_image();
                self.notify(MSG_IMAGE_FAILED);
            }
        }
    }

    fn clear_image(&mut self) {
        let Some(previous) = self.state.draft.image_uri.clone() else {
            return;
        };
        self.edit_draft(|draft| Draft {
            image_uri: None,
            ..draft
        });
        self.release_unpersisted(Some(previous));
    }

    /// Releases an image that only this session references. The stored
    /// record's image is kept until a save drops it.
    fn release_unpersisted(&self, image: Option<String>) {
        if let Some(image) = image {
            if self.persisted_image.as_deref() != Some(image.as_str()) {
                self.store.attachments().release(&image);
            }
        }
    }

    fn save(&mut self) {
        if !self.state.can_save() {
            return;
        }
        if self.state.draft.title.trim().is_empty() {
            self.notify(MSG_TITLE_REQUIRED);
            return;
        }

        self.state = EditState {
            phase: EditPhase::Saving,
            ..self.state.clone()
        };
        let place = self
            .state
            .draft
            .to_place(self.state.place_id.unwrap_or(UNSAVED_PLACE_ID));

        let written = if place.is_persisted() {
            self.store.update(&place).map(|()| place.id)
        } else {
            self.store.insert(&place)
        };

        match written {
            Ok(id) => {
                info!("event=edit_save module=workflow status=ok place_id={id}");
                // The store releases the image the saved row stopped referencing.
                self.persisted_image = place.image_uri.clone();
                self.state = EditState {
                    phase: EditPhase::Saved,
                    draft: Draft::from_place(&place),
                    place_id: Some(id),
                    error_message: None,
                };
                self.notices.push_back(SessionNotice::SaveSuccess);
            }
            Err(err) => {
                error!(
                    "event=edit_save module=workflow status=error place_id={} error={}",
                    place.id, err
                );
                self.state = EditState {
                    phase: EditPhase::Ready,
                    error_message: Some(format!("Save failed: {err}")),
                    ..self.state.clone()
                };
                self.notify(MSG_SAVE_FAILED);
            }
        }
    }

    fn notify(&mut self, message: &str) {
        self.notices
            .push_back(SessionNotice::Message(message.to_string()));
    }
}
