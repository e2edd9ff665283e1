mod clipboard;
mod db;
mod history;
mod models;
mod session;
mod settings;
mod storage;
mod sync;
mod tracker;
mod utils;
mod view;
mod viewport;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

pub use clipboard::ClipboardOffer;
pub use db::Database;
pub use history::{build_snapshot, EndedSession, SessionHistory};
pub use models::{
    normalize_route, sort_newest_first, Coordinate, LastLocation, ManualLocation, MapViewport,
    MemoItem, RawRoutePoint, RoutePoint, SessionSlots, SessionSnapshot,
};
pub use session::{describe_failure, SessionController, SessionPhase};
pub use settings::{SettingsStore, SyncSettings};
pub use storage::{KeyValueStore, MemoryStore, SESSION_SLOTS_KEY, VIEWPORT_KEY};
pub use sync::{AppLifecycle, CenterPolicy, SessionSynchronizer, SyncEvent, SyncSnapshot};
pub use tracker::{
    Clipboard, Geolocator, InMemoryTracker, NoGeolocator, StartedSession, StoppedSession,
    Tracker, TrackerEvent,
};
pub use utils::logging::init_logging;
pub use view::{pins_from_memos, MemoPin, SessionCounts, SessionSummary, SessionView};
pub use viewport::ViewportStore;

/// Everything a host needs after startup: persistence, settings and the
/// session controller wired to the platform collaborators.
pub struct RideMemo {
    pub db: Database,
    pub settings: SettingsStore,
    pub controller: SessionController,
    pub viewports: ViewportStore,
}

impl RideMemo {
    /// Opens (or creates) `ridememo.sqlite3` and `settings.json` under
    /// `data_dir` and builds a controller around them. The controller is not
    /// attached yet; call [`SessionController::attach`] once the UI is up.
    pub fn open(
        data_dir: &Path,
        tracker: Arc<dyn Tracker>,
        geolocator: Arc<dyn Geolocator>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join("ridememo.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;

        let store: Arc<dyn KeyValueStore> = Arc::new(db.clone());
        let controller = SessionController::new(tracker, geolocator, store.clone(), settings.sync());

        log::info!("RideMemo opened at {}", data_dir.display());

        Ok(Self {
            db,
            settings,
            controller,
            viewports: ViewportStore::new(store),
        })
    }

    /// Same as [`open`](Self::open), plus clipboard watching while foregrounded.
    pub fn open_with_clipboard(
        data_dir: &Path,
        tracker: Arc<dyn Tracker>,
        geolocator: Arc<dyn Geolocator>,
        clipboard: Arc<dyn Clipboard>,
        offers: mpsc::Sender<ClipboardOffer>,
    ) -> Result<Self> {
        let mut app = Self::open(data_dir, tracker, geolocator)?;
        app.controller = app.controller.with_clipboard(clipboard, offers);
        Ok(app)
    }
}
