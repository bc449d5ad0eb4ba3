use happyplaces_core::db::open_db_in_memory;
use happyplaces_core::{
    AttachmentStore, EditEvent, EditSession, ListIntent, Navigator, Place, PlaceList, PlaceStore,
    Route,
};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingNavigator {
    routes: Vec<Route>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&mut self, route: Route) {
        self.routes.push(route);
    }
}

fn open_store() -> (TempDir, Arc<PlaceStore>) {
    let dir = tempfile::tempdir().unwrap();
    let attachments = Arc::new(AttachmentStore::open(dir.path().join("images")).unwrap());
    let store = Arc::new(PlaceStore::new(open_db_in_memory().unwrap(), attachments).unwrap());
    (dir, store)
}

fn titles(list: &PlaceList) -> Vec<String> {
    list.places().into_iter().map(|place| place.title).collect()
}

#[test]
fn empty_store_yields_empty_snapshot_immediately() {
    let (_dir, store) = open_store();
    let list = PlaceList::open(&store).unwrap();

    assert!(list.is_empty());
    assert_eq!(list.revision(), 1);
    assert!(list.snapshot().places.is_empty());
}

#[test]
fn snapshot_follows_every_committed_write() {
    let (_dir, store) = open_store();
    let list = PlaceList::open(&store).unwrap();

    let lake = store.insert(&Place::new("Lake", "01.05.2025")).unwrap();
    store.insert(&Place::new("Forest", "02.05.2025")).unwrap();
    assert_eq!(titles(&list), vec!["Forest", "Lake"]);
    assert_eq!(list.revision(), 3);

    let mut renamed = store.get_by_id(lake).unwrap().unwrap();
    renamed.title = "Quiet lake".to_string();
    store.update(&renamed).unwrap();
    assert_eq!(titles(&list), vec!["Forest", "Quiet lake"]);

    store.delete(&renamed).unwrap();
    assert_eq!(titles(&list), vec!["Forest"]);
    assert_eq!(list.revision(), 5);
}

#[test]
fn failed_writes_do_not_publish() {
    let (_dir, store) = open_store();
    let list = PlaceList::open(&store).unwrap();

    assert!(store.insert(&Place::new("", "01.05.2025")).is_err());
    let mut missing = Place::new("Ghost", "01.05.2025");
    missing.id = 77;
    assert!(store.update(&missing).is_err());

    assert_eq!(list.revision(), 1);
}

#[test]
fn list_sees_places_saved_through_edit_sessions() {
    let (_dir, store) = open_store();
    let list = PlaceList::open(&store).unwrap();

    let mut session = EditSession::open_new(Arc::clone(&store));
    session.on_event(EditEvent::TitleChanged("Cafe".to_string()));
    session.on_event(EditEvent::Save);

    let snapshot = list.snapshot();
    assert_eq!(snapshot.places.len(), 1);
    assert_eq!(snapshot.places[0].title, "Cafe");
    assert_eq!(Some(snapshot.places[0].id), session.state().place_id);
}

#[test]
fn dropping_list_ends_its_subscription() {
    let (_dir, store) = open_store();
    let list = PlaceList::open(&store).unwrap();
    assert_eq!(store.subscriber_count(), 1);

    drop(list);
    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn gestures_become_navigation_routes() {
    let (_dir, store) = open_store();
    let id = store.insert(&Place::new("Museum", "01.05.2025")).unwrap();
    let list = PlaceList::open(&store).unwrap();
    let mut navigator = RecordingNavigator::default();

    list.add_place(&mut navigator);
    list.select_place(id, &mut navigator);

    assert_eq!(
        navigator.routes,
        vec![
            Route::EditPlace { place_id: None },
            Route::EditPlace { place_id: Some(id) },
        ]
    );
    assert_eq!(ListIntent::OpenPlace(0).route(), Route::new_place());
}

#[test]
fn routes_render_and_parse_host_strings() {
    assert_eq!(Route::PlaceList.to_string(), "place_list");
    assert_eq!(Route::new_place().to_string(), "add_edit_place?placeId=0");
    assert_eq!(Route::edit(12).to_string(), "add_edit_place?placeId=12");

    assert_eq!("place_list".parse::<Route>().unwrap(), Route::PlaceList);
    assert_eq!(
        "add_edit_place?placeId=0L".parse::<Route>().unwrap(),
        Route::new_place()
    );
    assert_eq!(
        "add_edit_place?placeId=9".parse::<Route>().unwrap(),
        Route::edit(9)
    );
    assert!("add_edit_place?placeId=-3".parse::<Route>().is_err());
    assert!("settings".parse::<Route>().is_err());
}
