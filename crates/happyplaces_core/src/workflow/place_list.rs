//! List workflow over all places.
//!
//! # Responsibility
//! - Keep the latest "all places" snapshot from the store's live query.
//! - Turn add/select gestures into navigation intents.
//!
//! # Invariants
//! - `revision` increases by one for every delivered snapshot.
//! - Snapshot order is the store's order: `id DESC`.

use crate::model::place::{Place, PlaceId};
use crate::repo::place_repo::RepoResult;
use crate::service::live::{lock, Subscription};
use crate::service::place_store::PlaceStore;
use crate::workflow::route::{Navigator, Route};
use std::sync::{Arc, Mutex};

/// Rendered list content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListSnapshot {
    pub places: Vec<Place>,
    pub revision: u64,
}

/// Gestures the list screen hands to navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListIntent {
    AddPlace,
    OpenPlace(PlaceId),
}

impl ListIntent {
    pub fn route(self) -> Route {
        match self {
            Self::AddPlace => Route::new_place(),
            Self::OpenPlace(id) => Route::edit(id),
        }
    }
}

/// Live list of places.
pub struct PlaceList {
    snapshot: Arc<Mutex<ListSnapshot>>,
    _subscription: Subscription,
}

impl PlaceList {
    /// Subscribes to the store; the snapshot is populated before returning.
    pub fn open(store: &PlaceStore) -> RepoResult<Self> {
        let snapshot: Arc<Mutex<ListSnapshot>> = Arc::default();
        let sink = Arc::clone(&snapshot);
        let subscription = store.subscribe_all(move |places| {
            let mut current = lock(&sink);
            current.places = places.to_vec();
            current.revision += 1;
        })?;
        Ok(Self {
            snapshot,
            _subscription: subscription,
        })
    }

    pub fn snapshot(&self) -> ListSnapshot {
        lock(&self.snapshot).clone()
    }

    pub fn places(&self) -> Vec<Place> {
        lock(&self.snapshot).places.clone()
    }

    pub fn revision(&self) -> u64 {
        lock(&self.snapshot).revision
    }

    /// Whether the empty-state hint should be shown.
    pub fn is_empty(&self) -> bool {
        lock(&self.snapshot).places.is_empty()
    }

    pub fn add_place(&self, navigator: &mut dyn Navigator) {
        navigator.navigate(ListIntent::AddPlace.route());
    }

    pub fn select_place(&self, id: PlaceId, navigator: &mut dyn Navigator) {
        navigator.navigate(ListIntent::OpenPlace(id).route());
    }
}
