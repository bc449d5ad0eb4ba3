//! Shared place store with live queries.
//!
//! # Responsibility
//! - Own the SQLite connection for place records behind one lock.
//! - Apply repository operations and notify live query observers after
//!   every successful write.
//! - Cascade record deletion and image replacement to the owned image file.
//!
//! # Invariants
//! - At most one repository call runs at a time per store.
//! - Observers are notified after the connection lock is released.
//! - Each delivery is read while its subscription is locked, so one observer
//!   never sees an older list after a newer one, and a new subscription
//!   cannot miss a write that commits while it registers.
//! - Observers must not write to the store from inside their callback.

use crate::db::{DbError, DbResult};
use crate::model::place::{Place, PlaceId};
use crate::repo::place_repo::{PlaceRepository, RepoResult, SqlitePlaceRepository};
use crate::service::live::{lock, LiveRegistry, Subscription, Watcher, WatcherSlot};
use crate::storage::attachments::AttachmentStore;
use log::{error, info};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Process-wide store for place records.
pub struct PlaceStore {
    conn: Mutex<Connection>,
    attachments: Arc<AttachmentStore>,
    live: LiveRegistry,
}

impl PlaceStore {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `SchemaNotReady` when the connection was not opened through `db::open_*`.
    pub fn new(conn: Connection, attachments: Arc<AttachmentStore>) -> RepoResult<Self> {
        SqlitePlaceRepository::try_new(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            attachments,
            live: LiveRegistry::default(),
        })
    }

    pub fn attachments(&self) -> &Arc<AttachmentStore> {
        &self.attachments
    }

    /// Inserts or replaces a record and returns its id.
    ///
    /// Replacing a record releases the image the old row owned when the new
    /// record no longer references it.
    pub fn insert(&self, place: &Place) -> RepoResult<PlaceId> {
        let (id, previous) = self.with_repo(|repo| {
            let previous = if place.is_persisted() {
                repo.get_place(place.id)?
            } else {
                None
            };
            let id = repo.insert_place(place)?;
            Ok((id, previous))
        })?;
        info!("event=place_insert module=store status=ok place_id={id}");
        self.release_replaced_image(previous, place);
        self.publish();
        Ok(id)
    }

    /// Overwrites an existing record, releasing an image it stops referencing.
    pub fn update(&self, place: &Place) -> RepoResult<()> {
        let previous = self.with_repo(|repo| {
            let previous = repo.get_place(place.id)?;
            repo.update_place(place)?;
            Ok(previous)
        })?;
        info!(
            "event=place_update module=store status=ok place_id={}",
            place.id
        );
        self.release_replaced_image(previous, place);
        self.publish();
        Ok(())
    }

    /// Deletes a record and releases the image file it owns.
    ///
    /// The image reference is taken from the stored row, not from `place`,
    /// so a stale caller copy cannot leak or release the wrong file.
    pub fn delete(&self, place: &Place) -> RepoResult<()> {
        let stored = self.with_repo(|repo| {
            let stored = repo.get_place(place.id)?;
            repo.delete_place(place.id)?;
            Ok(stored)
        })?;
        info!(
            "event=place_delete module=store status=ok place_id={}",
            place.id
        );

        if let Some(image_uri) = stored.and_then(|row| row.image_uri) {
            self.attachments.release(&image_uri);
        }
        self.publish();
        Ok(())
    }

    pub fn get_by_id(&self, id: PlaceId) -> RepoResult<Option<Place>> {
        self.with_repo(|repo| repo.get_place(id))
    }

    /// Returns every record ordered by id, newest first.
    pub fn get_all(&self) -> RepoResult<Vec<Place>> {
        self.with_repo(|repo| repo.list_places())
    }

    /// Observes the full list; `observer` receives the current list right away.
    ///
    /// # Deadlocks
    /// - `observer` runs while its subscription is locked. Writing to this
    ///   store from inside `observer` blocks forever.
    pub fn subscribe_all(
        &self,
        observer: impl FnMut(&[Place]) + Send + 'static,
    ) -> RepoResult<Subscription> {
        let slot: WatcherSlot = Arc::new(Mutex::new(Watcher::All(Box::new(observer))));
        let mut watcher = lock(&slot);
        let subscription = self.live.register(Arc::clone(&slot));
        let current = self.get_all()?;
        deliver(&mut watcher, Delivery::All(&current));
        Ok(subscription)
    }

    /// Observes one record; `observer` receives the current value right away.
    ///
    /// # Deadlocks
    /// - `observer` runs while its subscription is locked. Writing to this
    ///   store from inside `observer` blocks forever.
    pub fn subscribe_place(
        &self,
        id: PlaceId,
        observer: impl FnMut(Option<&Place>) + Send + 'static,
    ) -> RepoResult<Subscription> {
        let slot: WatcherSlot = Arc::new(Mutex::new(Watcher::ById(id, Box::new(observer))));
        let mut watcher = lock(&slot);
        let subscription = self.live.register(Arc::clone(&slot));
        let current = self.get_by_id(id)?;
        deliver(&mut watcher, Delivery::One(current.as_ref()));
        Ok(subscription)
    }

    /// Returns the number of active live queries.
    pub fn subscriber_count(&self) -> usize {
        self.live.len()
    }

    /// Closes the underlying connection.
    ///
    /// Active subscriptions stop receiving values once the store is gone.
    pub fn close(self) -> DbResult<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.close().map_err(|(_, err)| DbError::Sqlite(err))?;
        info!("event=db_close module=store status=ok");
        Ok(())
    }

    fn with_repo<T>(
        &self,
        f: impl FnOnce(&SqlitePlaceRepository<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let conn = lock(&self.conn);
        let repo = SqlitePlaceRepository::try_new(&conn)?;
        f(&repo)
    }

    fn release_replaced_image(&self, previous: Option<Place>, current: &Place) {
        let replaced = previous
            .and_then(|row| row.image_uri)
            .filter(|old| current.image_uri.as_deref() != Some(old.as_str()));
        if let Some(old) = replaced {
            self.attachments.release(&old);
        }
    }

    fn publish(&self) {
        for slot in self.live.snapshot() {
            let mut watcher = lock(&slot);
            let by_id = match &*watcher {
                Watcher::All(_) => None,
                Watcher::ById(id, _) => Some(*id),
            };

            match by_id {
                None => match self.get_all() {
                    Ok(places) => deliver(&mut watcher, Delivery::All(&places)),
                    Err(err) => error!(
                        "event=live_publish module=store status=error query=all error={}",
                        err
                    ),
                },
                Some(id) => match self.get_by_id(id) {
                    Ok(place) => deliver(&mut watcher, Delivery::One(place.as_ref())),
                    Err(err) => error!(
                        "event=live_publish module=store status=error query=by_id place_id={} error={}",
                        id, err
                    ),
                },
            }
        }
    }
}

enum Delivery<'a> {
    All(&'a [Place]),
    One(Option<&'a Place>),
}

fn deliver(watcher: &mut Watcher, value: Delivery<'_>) {
    match (watcher, value) {
        (Watcher::All(observer), Delivery::All(places)) => observer(places),
        (Watcher::ById(_, observer), Delivery::One(place)) => observer(place),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::PlaceStore;
    use crate::db::open_db_in_memory;
    use crate::model::place::Place;
    use crate::storage::attachments::AttachmentStore;
    use std::sync::{Arc, Mutex};

    fn store_in(dir: &std::path::Path) -> PlaceStore {
        let attachments = Arc::new(AttachmentStore::open(dir.join("images")).unwrap());
        PlaceStore::new(open_db_in_memory().unwrap(), attachments).unwrap()
    }

    #[test]
    fn rejects_unmigrated_connection() {
        let dir = tempfile::tempdir().unwrap();
        let attachments = Arc::new(AttachmentStore::open(dir.path()).unwrap());
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        assert!(PlaceStore::new(conn, attachments).is_err());
    }

    #[test]
    fn subscribe_all_delivers_current_value_then_every_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let seen: Arc<Mutex<Vec<usize>>> = Arc::default();

        let sink = Arc::clone(&seen);
        let subscription = store
            .subscribe_all(move |places| sink.lock().unwrap().push(places.len()))
            .unwrap();

        let id = store.insert(&Place::new("Lake", "02.02.2025")).unwrap();
        store.insert(&Place::new("Forest", "03.02.2025")).unwrap();
        let place = store.get_by_id(id).unwrap().unwrap();
        store.delete(&place).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 1]);

        drop(subscription);
        store.insert(&Place::new("Cave", "04.02.2025")).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 4);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn subscribe_place_reports_absent_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();

        let sink = Arc::clone(&seen);
        let _subscription = store
            .subscribe_place(1, move |place| {
                sink.lock()
                    .unwrap()
                    .push(place.map(|place| place.title.clone()))
            })
            .unwrap();
        store.insert(&Place::new("Dune", "05.02.2025")).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("Dune".to_string())]
        );
    }

    #[test]
    fn concurrent_writers_never_deliver_older_lists() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));
        let early: Arc<Mutex<Vec<usize>>> = Arc::default();
        let sink = Arc::clone(&early);
        let _early = store
            .subscribe_all(move |places| sink.lock().unwrap().push(places.len()))
            .unwrap();

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..10 {
                        store
                            .insert(&Place::new(format!("Spot {writer}-{n}"), "01.01.2025"))
                            .unwrap();
                    }
                })
            })
            .collect();

        let late: Arc<Mutex<Vec<usize>>> = Arc::default();
        let sink = Arc::clone(&late);
        let _late = store
            .subscribe_all(move |places| sink.lock().unwrap().push(places.len()))
            .unwrap();

        for writer in writers {
            writer.join().unwrap();
        }

        for lengths in [early.lock().unwrap().clone(), late.lock().unwrap().clone()] {
            assert!(
                lengths.windows(2).all(|pair| pair[0] <= pair[1]),
                "out of order: {lengths:?}"
            );
            assert_eq!(lengths.last(), Some(&40));
        }
    }

    #[test]
    fn observer_may_read_store_inside_callback() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));
        let reread: Arc<Mutex<Vec<usize>>> = Arc::default();

        let weak = Arc::downgrade(&store);
        let sink = Arc::clone(&reread);
        let _subscription = store
            .subscribe_all(move |_| {
                if let Some(store) = weak.upgrade() {
                    sink.lock().unwrap().push(store.get_all().unwrap().len());
                }
            })
            .unwrap();
        store.insert(&Place::new("Pier", "07.02.2025")).unwrap();

        assert_eq!(*reread.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn delete_releases_owned_image_from_stored_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let image = store.attachments().adopt(&b"jpeg"[..]).unwrap();

        let mut place = Place::new("Harbor", "06.02.2025");
        place.image_uri = Some(image.to_string_lossy().into_owned());
        place.id = store.insert(&place).unwrap();

        let mut stale = place.clone();
        stale.image_uri = None;
        store.delete(&stale).unwrap();

        assert!(!image.exists());
        assert!(store.get_by_id(place.id).unwrap().is_none());
    }
}
