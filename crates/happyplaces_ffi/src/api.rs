//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Own the process-wide application context between `app_init` and
//!   `app_shutdown`.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Saves go through an edit session, so image adoption and release follow
//!   the same rules as in-process callers.
//! - Failures are reported in response envelopes, never as panics.

use happyplaces_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AppConfig, AppContext, EditEvent, EditSession, ImageSource, Place, PlaceId, SessionNotice,
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

static APP: Mutex<Option<AppContext>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Opens the database and attachment root under `data_dir`.
///
/// `HAPPYPLACES_DB_PATH` and `HAPPYPLACES_ATTACHMENTS_DIR` override the
/// default layout.
///
/// # FFI contract
/// - Sync call; opens files and runs migrations.
/// - Idempotent for the same resolved configuration.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn app_init(data_dir: String) -> String {
    let data_dir = data_dir.trim();
    if data_dir.is_empty() {
        return "app_init failed: data_dir must not be empty".to_string();
    }

    let config = AppConfig::from_env(PathBuf::from(data_dir));
    let mut slot = app_slot();
    if let Some(current) = slot.as_ref() {
        if current.config() == &config {
            return String::new();
        }
        return format!(
            "app_init failed: already initialized with `{}`",
            current.config().db_path.display()
        );
    }

    match AppContext::open(config) {
        Ok(context) => {
            *slot = Some(context);
            String::new()
        }
        Err(err) => format!("app_init failed: {err}"),
    }
}

/// Closes the database opened by `app_init`.
///
/// # FFI contract
/// - Safe to call when not initialized.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn app_shutdown() -> String {
    let Some(context) = app_slot().take() else {
        return String::new();
    };
    match context.close() {
        Ok(()) => {
            info!("event=ffi_shutdown module=ffi status=ok");
            String::new()
        }
        Err(err) => format!("app_shutdown failed: {err}"),
    }
}

/// Place projection passed to Dart.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Display date, `dd.MM.yyyy`.
    pub date: String,
    pub location_name: String,
    /// Absolute path of the private image copy, if any.
    pub image_uri: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<Place> for PlaceItem {
    fn from(place: Place) -> Self {
        Self {
            id: place.id,
            title: place.title,
            description: place.description,
            date: place.date,
            location_name: place.location_name,
            image_uri: place.image_uri,
            latitude: place.latitude,
            longitude: place.longitude,
        }
    }
}

/// Response envelope for the list screen.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacesResponse {
    pub ok: bool,
    /// Places in newest-first order.
    pub items: Vec<PlaceItem>,
    pub message: String,
}

/// Response envelope for a single place lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceResponse {
    pub ok: bool,
    /// `None` when the id is unknown.
    pub item: Option<PlaceItem>,
    pub message: String,
}

/// Generic action response envelope for save/delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceActionResponse {
    pub ok: bool,
    pub place_id: Option<i64>,
    pub message: String,
}

impl PlaceActionResponse {
    fn success(message: impl Into<String>, place_id: PlaceId) -> Self {
        Self {
            ok: true,
            place_id: Some(place_id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            place_id: None,
            message: message.into(),
        }
    }
}

/// Full edit-screen submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceSaveRequest {
    /// `None` or `0` creates a new place.
    pub place_id: Option<i64>,
    pub title: String,
    pub description: String,
    /// Keeps the stored (or today's) date when `None`.
    pub date: Option<String>,
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Readable path of a newly picked image, copied into private storage.
    pub image_source: Option<String>,
    /// Removes the current image when no new one is given.
    pub clear_image: bool,
}

/// Lists all places, newest first.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn places_list() -> PlacesResponse {
    match with_app(|app| app.store().get_all().map_err(|err| err.to_string())) {
        Ok(places) => {
            let message = if places.is_empty() {
                "No places yet.".to_string()
            } else {
                format!("Found {} place(s).", places.len())
            };
            PlacesResponse {
                ok: true,
                items: places.into_iter().map(PlaceItem::from).collect(),
                message,
            }
        }
        Err(err) => PlacesResponse {
            ok: false,
            items: Vec::new(),
            message: format!("places_list failed: {err}"),
        },
    }
}

/// Loads one place by id.
#[flutter_rust_bridge::frb(sync)]
pub fn place_get(place_id: i64) -> PlaceResponse {
    match with_app(|app| {
        app.store()
            .get_by_id(place_id)
            .map_err(|err| err.to_string())
    }) {
        Ok(Some(place)) => PlaceResponse {
            ok: true,
            item: Some(place.into()),
            message: String::new(),
        },
        Ok(None) => PlaceResponse {
            ok: true,
            item: None,
            message: "Place not found.".to_string(),
        },
        Err(err) => PlaceResponse {
            ok: false,
            item: None,
            message: format!("place_get failed: {err}"),
        },
    }
}

/// Creates or updates a place from a full edit-screen submission.
///
/// # FFI contract
/// - Sync call; may copy an image file into private storage.
/// - Never panics.
/// - On failure nothing is persisted and a newly copied image is released.
#[flutter_rust_bridge::frb(sync)]
pub fn place_save(request: PlaceSaveRequest) -> PlaceActionResponse {
    match with_app(|app| {
        let session = app
            .edit_session(request.place_id)
            .map_err(|err| err.to_string())?;
        run_save(session, request)
    }) {
        Ok(place_id) => PlaceActionResponse::success("Place saved.", place_id),
        Err(err) => PlaceActionResponse::failure(format!("place_save failed: {err}")),
    }
}

/// Deletes a place and its private image.
#[flutter_rust_bridge::frb(sync)]
pub fn place_delete(place_id: i64) -> PlaceActionResponse {
    match with_app(|app| {
        let mut session = app
            .edit_session(Some(place_id))
            .map_err(|err| err.to_string())?;
        if let Some(message) = session.state().error_message.clone() {
            return Err(message);
        }
        if session.delete() {
            Ok(place_id)
        } else {
            Err(first_message(session.take_notices())
                .unwrap_or_else(|| "Place not found.".to_string()))
        }
    }) {
        Ok(place_id) => PlaceActionResponse::success("Place deleted.", place_id),
        Err(err) => PlaceActionResponse::failure(format!("place_delete failed: {err}")),
    }
}

fn run_save(mut session: EditSession, request: PlaceSaveRequest) -> Result<PlaceId, String> {
    if let Some(message) = session.state().error_message.clone() {
        return Err(message);
    }
    let coordinates = match (request.latitude, request.longitude) {
        (Some(latitude), Some(longitude)) => Some((latitude, longitude)),
        (None, None) => None,
        _ => return Err("latitude and longitude must be set together".to_string()),
    };

    session.on_event(EditEvent::TitleChanged(request.title));
    session.on_event(EditEvent::DescriptionChanged(request.description));
    if let Some(date) = request.date {
        session.on_event(EditEvent::DateChanged(date));
    }
    session.on_event(EditEvent::LocationChanged(request.location_name));
    session.on_event(EditEvent::CoordinatesChanged(coordinates));
    match request.image_source {
        Some(path) => session.on_event(EditEvent::ImageSelected(Some(ImageSource::File(
            PathBuf::from(path),
        )))),
        None if request.clear_image => session.on_event(EditEvent::ImageSelected(None)),
        None => {}
    }

    // Coordinate or image problems abort before anything is written.
    if let Some(message) = first_message(session.take_notices()) {
        session.discard();
        return Err(message);
    }

    session.on_event(EditEvent::Save);
    let notices = session.take_notices();
    let saved_id = session.state().place_id;
    match saved_id {
        Some(id) if notices.contains(&SessionNotice::SaveSuccess) => Ok(id),
        _ => {
            let message =
                first_message(notices).unwrap_or_else(|| "Could not save the place.".to_string());
            session.discard();
            Err(message)
        }
    }
}

fn first_message(notices: Vec<SessionNotice>) -> Option<String> {
    notices.into_iter().find_map(|notice| match notice {
        SessionNotice::Message(message) => Some(message),
        _ => None,
    })
}

fn with_app<T>(f: impl FnOnce(&AppContext) -> Result<T, String>) -> Result<T, String> {
    let slot = app_slot();
    match slot.as_ref() {
        Some(app) => f(app),
        None => {
            warn!("event=ffi_call module=ffi status=error error_code=not_initialized");
            Err("app is not initialized; call app_init first".to_string())
        }
    }
}

fn app_slot() -> MutexGuard<'static, Option<AppContext>> {
    APP.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{
        app_init, app_shutdown, core_version, init_logging, ping, place_delete, place_get,
        place_save, places_list, PlaceSaveRequest,
    };
    use std::path::Path;
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use std::time::{SystemTime, UNIX_EPOCH};

    static APP_TESTS: Mutex<()> = Mutex::new(());

    /// Serializes tests over the process-wide slot and shuts down on drop.
    struct InitializedApp {
        _guard: MutexGuard<'static, ()>,
        data_dir: tempfile::TempDir,
    }

    impl InitializedApp {
        fn start() -> Self {
            let guard = APP_TESTS.lock().unwrap_or_else(PoisonError::into_inner);
            app_shutdown();
            let data_dir = tempfile::tempdir().expect("create temp dir");
            let error = app_init(data_dir.path().to_string_lossy().into_owned());
            assert!(error.is_empty(), "{error}");
            Self {
                _guard: guard,
                data_dir,
            }
        }

        fn path(&self) -> &Path {
            self.data_dir.path()
        }
    }

    impl Drop for InitializedApp {
        fn drop(&mut self) {
            app_shutdown();
        }
    }

    fn request(title: &str) -> PlaceSaveRequest {
        PlaceSaveRequest {
            place_id: None,
            title: title.to_string(),
            description: String::new(),
            date: Some("01.01.2025".to_string()),
            location_name: String::new(),
            latitude: None,
            longitude: None,
            image_source: None,
            clear_image: false,
        }
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn calls_before_init_report_not_initialized() {
        let _guard = APP_TESTS.lock().unwrap_or_else(PoisonError::into_inner);
        app_shutdown();

        let response = places_list();
        assert!(!response.ok);
        assert!(response.message.contains("app_init"));
        assert!(!place_save(request("Beach")).ok);
    }

    #[test]
    fn app_init_is_idempotent_and_rejects_other_directories() {
        let app = InitializedApp::start();
        assert!(app_init(app.path().to_string_lossy().into_owned()).is_empty());

        let other = tempfile::tempdir().expect("create temp dir");
        let error = app_init(other.path().to_string_lossy().into_owned());
        assert!(error.contains("already initialized"), "{error}");
        assert!(!app_init("  ".to_string()).is_empty());
    }

    #[test]
    fn save_list_get_and_delete_roundtrip() {
        let _app = InitializedApp::start();

        let saved = place_save(PlaceSaveRequest {
            description: " sunny ".to_string(),
            latitude: Some(54.1),
            longitude: Some(12.1),
            ..request("  Beach ")
        });
        assert!(saved.ok, "{}", saved.message);
        let id = saved.place_id.expect("save should return place_id");

        let listed = places_list();
        assert!(listed.ok);
        assert_eq!(listed.items.len(), 1);
        assert_eq!(listed.items[0].title, "Beach");
        assert_eq!(listed.items[0].description, "sunny");

        let loaded = place_get(id).item.expect("place should exist");
        assert_eq!(loaded.latitude, Some(54.1));

        let edited = place_save(PlaceSaveRequest {
            place_id: Some(id),
            date: None,
            ..request("Mountain")
        });
        assert!(edited.ok, "{}", edited.message);
        assert_eq!(edited.place_id, Some(id));
        let loaded = place_get(id).item.expect("place should exist");
        assert_eq!(loaded.title, "Mountain");
        assert_eq!(loaded.date, "01.01.2025");
        assert_eq!(loaded.latitude, None);

        assert!(place_delete(id).ok);
        assert!(place_get(id).item.is_none());
        assert!(!place_delete(id).ok);
    }

    #[test]
    fn blank_title_and_bad_image_are_rejected_without_writes() {
        let app = InitializedApp::start();

        let blank = place_save(request("   "));
        assert!(!blank.ok);
        assert!(blank.message.contains("Title must not be empty."));

        let missing_image = place_save(PlaceSaveRequest {
            image_source: Some(app.path().join("missing.jpg").to_string_lossy().into_owned()),
            ..request("Lake")
        });
        assert!(!missing_image.ok);
        assert!(places_list().items.is_empty());
    }

    #[test]
    fn half_coordinate_pairs_are_rejected_without_writes() {
        let app = InitializedApp::start();
        let picked = app.path().join("picked.jpg");
        std::fs::write(&picked, b"jpeg").expect("write picked image");

        let only_latitude = place_save(PlaceSaveRequest {
            latitude: Some(54.1),
            image_source: Some(picked.to_string_lossy().into_owned()),
            ..request("Cliff")
        });
        assert!(!only_latitude.ok);
        assert!(
            only_latitude.message.contains("set together"),
            "{}",
            only_latitude.message
        );

        let only_longitude = place_save(PlaceSaveRequest {
            longitude: Some(13.6),
            ..request("Cliff")
        });
        assert!(!only_longitude.ok);
        assert!(places_list().items.is_empty());

        let images = std::fs::read_dir(app.path().join("images"))
            .expect("read attachment root")
            .count();
        assert_eq!(images, 0);
    }

    #[test]
    fn half_pair_on_existing_place_keeps_stored_coordinates() {
        let _app = InitializedApp::start();
        let saved = place_save(PlaceSaveRequest {
            latitude: Some(47.4),
            longitude: Some(10.9),
            ..request("Summit")
        });
        let id = saved.place_id.expect("save should return place_id");

        let rejected = place_save(PlaceSaveRequest {
            place_id: Some(id),
            latitude: Some(48.0),
            ..request("Summit")
        });
        assert!(!rejected.ok);
        let stored = place_get(id).item.expect("place should exist");
        assert_eq!(stored.latitude, Some(47.4));
        assert_eq!(stored.longitude, Some(10.9));
    }

    #[test]
    fn image_is_copied_then_replaced_and_cleared() {
        let app = InitializedApp::start();
        let first = app.path().join("first.jpg");
        let second = app.path().join("second.jpg");
        std::fs::write(&first, b"first").expect("write picked image");
        std::fs::write(&second, b"second").expect("write picked image");

        let saved = place_save(PlaceSaveRequest {
            image_source: Some(first.to_string_lossy().into_owned()),
            ..request("Garden")
        });
        assert!(saved.ok, "{}", saved.message);
        let id = saved.place_id.expect("save should return place_id");
        let first_copy = place_get(id).item.and_then(|item| item.image_uri).expect("image");
        assert_ne!(Path::new(&first_copy), first.as_path());

        let replaced = place_save(PlaceSaveRequest {
            place_id: Some(id),
            image_source: Some(second.to_string_lossy().into_owned()),
            ..request("Garden")
        });
        assert!(replaced.ok, "{}", replaced.message);
        let second_copy = place_get(id).item.and_then(|item| item.image_uri).expect("image");
        assert!(!Path::new(&first_copy).exists());
        assert_eq!(std::fs::read(&second_copy).expect("read copy"), b"second");

        let cleared = place_save(PlaceSaveRequest {
            place_id: Some(id),
            clear_image: true,
            ..request("Garden")
        });
        assert!(cleared.ok, "{}", cleared.message);
        assert_eq!(place_get(id).item.and_then(|item| item.image_uri), None);
        assert!(!Path::new(&second_copy).exists());
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn unknown_place_id_is_not_silently_created() {
        let _app = InitializedApp::start();
        let response = place_save(PlaceSaveRequest {
            place_id: Some(unique_id()),
            ..request("Ghost")
        });
        assert!(!response.ok);
        assert!(response.message.contains("Place not found."));
    }

    fn unique_id() -> i64 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        (nanos % 1_000_000) as i64 + 1
    }
}
