use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    models::{normalize_route, sort_newest_first, Coordinate, ManualLocation, MemoItem, RoutePoint},
    settings::SyncSettings,
    tracker::{Geolocator, Tracker, TrackerEvent},
};

use super::{
    center::CenterPolicy,
    signature::{MemoSignature, RouteSignature},
};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycle {
    Active,
    Inactive,
    Background,
}

/// Inputs the synchronizer reacts to outside of its own poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    NoteSaved { lat: Option<f64>, lng: Option<f64> },
    Lifecycle { from: AppLifecycle, to: AppLifecycle },
}

impl From<TrackerEvent> for SyncEvent {
    fn from(event: TrackerEvent) -> Self {
        match event {
            TrackerEvent::NoteSaved { lat, lng } => SyncEvent::NoteSaved { lat, lng },
        }
    }
}

struct SyncState {
    memos: Arc<Vec<MemoItem>>,
    route: Arc<Vec<RoutePoint>>,
    manual: ManualLocation,
    center: CenterPolicy,
    memo_signature: Option<MemoSignature>,
    route_signature: Option<RouteSignature>,
    auto_centered: bool,
    memo_updates: u64,
    route_updates: u64,
}

/// Point-in-time copy of what the UI renders. Collections are shared, so an
/// unchanged list keeps the same allocation across snapshots.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub memos: Arc<Vec<MemoItem>>,
    pub route: Arc<Vec<RoutePoint>>,
    pub manual: ManualLocation,
    pub center: Option<Coordinate>,
    pub auto_centered: bool,
    /// Number of times the memo list was replaced.
    pub memo_updates: u64,
    /// Number of times the route was replaced or cleared.
    pub route_updates: u64,
}

/// Mirrors the tracker's live memos, route and manual override into local
/// state and owns the map-center policy.
///
/// Steady-state reads never fail outward: memo failures keep the previous
/// list, route failures clear the route, manual-location failures disable
/// the override.
pub struct SessionSynchronizer {
    tracker: Arc<dyn Tracker>,
    geolocator: Arc<dyn Geolocator>,
    settings: SyncSettings,
    state: Mutex<SyncState>,
}

impl SessionSynchronizer {
    pub fn new(
        tracker: Arc<dyn Tracker>,
        geolocator: Arc<dyn Geolocator>,
        settings: SyncSettings,
    ) -> Self {
        let center = CenterPolicy::new(settings.center_threshold_deg);
        Self {
            tracker,
            geolocator,
            settings,
            state: Mutex::new(SyncState {
                memos: Arc::new(Vec::new()),
                route: Arc::new(Vec::new()),
                manual: ManualLocation::disabled(),
                center,
                memo_signature: None,
                route_signature: None,
                auto_centered: false,
                memo_updates: 0,
                route_updates: 0,
            }),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        let state = self.state.lock().await;
        SyncSnapshot {
            memos: Arc::clone(&state.memos),
            route: Arc::clone(&state.route),
            manual: state.manual,
            center: state.center.current(),
            auto_centered: state.auto_centered,
            memo_updates: state.memo_updates,
            route_updates: state.route_updates,
        }
    }

    pub async fn memos(&self) -> Arc<Vec<MemoItem>> {
        Arc::clone(&self.state.lock().await.memos)
    }

    pub async fn route(&self) -> Arc<Vec<RoutePoint>> {
        Arc::clone(&self.state.lock().await.route)
    }

    /// Forgets the change signatures so the next poll always publishes.
    /// The auto-center flag is left alone.
    pub async fn begin_session(&self) {
        let mut state = self.state.lock().await;
        state.memo_signature = None;
        state.route_signature = None;
    }

    /// Returns whether the memo list was replaced.
    pub async fn refresh_memos_silent(&self) -> bool {
        let mut memos = match self.tracker.memos().await {
            Ok(memos) => memos,
            Err(err) => {
                log_debug!("memo refresh failed: {err:#}");
                return false;
            }
        };
        sort_newest_first(&mut memos);
        let signature = MemoSignature::of(&memos);

        let mut state = self.state.lock().await;
        if state.memo_signature == Some(signature) {
            return false;
        }
        state.memo_signature = Some(signature);
        state.memos = Arc::new(memos);
        state.memo_updates += 1;
        true
    }

    /// Returns whether the route was replaced or cleared.
    pub async fn refresh_route_silent(&self) -> bool {
        let route = match self.tracker.route().await {
            Ok(raw) => normalize_route(raw),
            Err(err) => {
                log_debug!("route refresh failed, clearing route: {err:#}");
                let mut state = self.state.lock().await;
                state.route = Arc::new(Vec::new());
                state.route_signature = None;
                state.route_updates += 1;
                return true;
            }
        };
        let signature = RouteSignature::of(&route);

        let mut state = self.state.lock().await;
        if state.route_signature == Some(signature) {
            return false;
        }
        state.route_signature = Some(signature);
        state.route = Arc::new(route);
        state.route_updates += 1;
        true
    }

    pub async fn refresh_manual(&self) {
        match self.tracker.manual_location().await {
            Ok(manual) => {
                let mut state = self.state.lock().await;
                state.manual = manual;
                if let Some(coord) = manual.active_coordinate() {
                    state.center.set_stable(coord, true);
                }
            }
            Err(err) => {
                log_debug!("manual location refresh failed: {err:#}");
                self.state.lock().await.manual = ManualLocation::disabled();
            }
        }
    }

    pub async fn set_center_stable(&self, coord: Coordinate, force: bool) -> bool {
        self.state.lock().await.center.set_stable(coord, force)
    }

    /// Centers the map on the device once per foreground transition.
    ///
    /// Tries a high-accuracy device fix bounded by the geolocation timeout,
    /// then the tracker's last known location. Does nothing while the manual
    /// override is enabled. Returns whether a center was applied.
    pub async fn auto_center_once(&self) -> bool {
        {
            let state = self.state.lock().await;
            if state.auto_centered || state.manual.enabled {
                return false;
            }
        }

        let device_fix = match tokio::time::timeout(
            self.settings.geolocation_timeout(),
            self.geolocator.current_position(true),
        )
        .await
        {
            Ok(Ok(location)) => location.coordinate(),
            Ok(Err(err)) => {
                log_debug!("device fix failed: {err:#}");
                None
            }
            Err(_) => {
                log_debug!(
                    "device fix timed out after {}ms",
                    self.settings.geolocation_timeout_ms
                );
                None
            }
        };

        let coord = match device_fix {
            Some(coord) => Some(coord),
            None => match self.tracker.last_location().await {
                Ok(location) => location.coordinate(),
                Err(err) => {
                    log_debug!("last location unavailable: {err:#}");
                    None
                }
            },
        };

        let Some(coord) = coord else {
            return false;
        };

        let mut state = self.state.lock().await;
        if state.auto_centered || state.manual.enabled {
            return false;
        }
        state.center.set_stable(coord, true);
        state.auto_centered = true;
        true
    }

    /// One poll: follow GPS unless overridden, then memos, then route.
    pub async fn poll_tick(&self) {
        let manual_enabled = self.state.lock().await.manual.enabled;
        if !manual_enabled {
            match self.tracker.last_location().await {
                Ok(location) => {
                    if let Some(coord) = location.coordinate() {
                        self.set_center_stable(coord, false).await;
                    }
                }
                Err(err) => log_debug!("last location poll failed: {err:#}"),
            }
        }
        self.refresh_memos_silent().await;
        self.refresh_route_silent().await;
    }

    /// Applies an event against the state as it is when the event is handled.
    pub async fn handle_event(&self, event: SyncEvent) {
        match event {
            SyncEvent::NoteSaved { lat, lng } => {
                self.refresh_memos_silent().await;
                self.refresh_route_silent().await;
                if let Some(coord) = Coordinate::from_parts(lat, lng) {
                    let mut state = self.state.lock().await;
                    if !state.manual.enabled {
                        state.center.set_stable(coord, false);
                    }
                }
            }
            SyncEvent::Lifecycle { from, to } => {
                if from == AppLifecycle::Background && to == AppLifecycle::Active {
                    self.state.lock().await.auto_centered = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{LastLocation, RawRoutePoint},
        tracker::{StartedSession, StoppedSession},
    };
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::broadcast;

    #[derive(Default)]
    struct Script {
        memos: Option<Vec<MemoItem>>,
        route: Option<Vec<RawRoutePoint>>,
        manual: Option<ManualLocation>,
        last: Option<LastLocation>,
    }

    /// Tracker whose answers are set directly; `None` means the call fails.
    struct ScriptedTracker {
        script: StdMutex<Script>,
        events: broadcast::Sender<TrackerEvent>,
    }

    impl ScriptedTracker {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(Script::default()),
                events: broadcast::channel(4).0,
            })
        }

        fn edit(&self, f: impl FnOnce(&mut Script)) {
            f(&mut self.script.lock().unwrap());
        }
    }

    fn answer<T: Clone>(value: &Option<T>) -> Result<T> {
        value.clone().ok_or_else(|| anyhow!("scripted failure"))
    }

    #[async_trait]
    impl Tracker for ScriptedTracker {
        async fn start_session(&self) -> Result<StartedSession> {
            Err(anyhow!("unused"))
        }
        async fn stop_session(&self) -> Result<StoppedSession> {
            Err(anyhow!("unused"))
        }
        async fn last_location(&self) -> Result<LastLocation> {
            answer(&self.script.lock().unwrap().last)
        }
        async fn route(&self) -> Result<Vec<RawRoutePoint>> {
            answer(&self.script.lock().unwrap().route)
        }
        async fn memos(&self) -> Result<Vec<MemoItem>> {
            answer(&self.script.lock().unwrap().memos)
        }
        async fn manual_location(&self) -> Result<ManualLocation> {
            answer(&self.script.lock().unwrap().manual)
        }
        async fn save_memo(&self, _text: &str) -> Result<MemoItem> {
            Err(anyhow!("unused"))
        }
        async fn can_draw_overlays(&self) -> Result<bool> {
            Ok(true)
        }
        async fn open_overlay_settings(&self) -> Result<()> {
            Ok(())
        }
        fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
            self.events.subscribe()
        }
    }

    enum Fix {
        At(f64, f64),
        Fail,
        Hang,
    }

    struct FixedGeolocator(Fix);

    #[async_trait]
    impl crate::tracker::Geolocator for FixedGeolocator {
        async fn current_position(&self, _high_accuracy: bool) -> Result<LastLocation> {
            match self.0 {
                Fix::At(lat, lng) => Ok(LastLocation {
                    lat: Some(lat),
                    lng: Some(lng),
                    ..LastLocation::default()
                }),
                Fix::Fail => Err(anyhow!("no fix")),
                Fix::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(anyhow!("unreachable"))
                }
            }
        }
    }

    fn sync_with(tracker: Arc<ScriptedTracker>, fix: Fix) -> SessionSynchronizer {
        SessionSynchronizer::new(
            tracker,
            Arc::new(FixedGeolocator(fix)),
            SyncSettings::default(),
        )
    }

    fn memo(session: &str, saved_at: i64) -> MemoItem {
        MemoItem {
            session_id: Some(session.to_string()),
            text: Some(format!("memo {saved_at}")),
            saved_at: Some(saved_at),
            ..MemoItem::default()
        }
    }

    fn raw(lat: f64, lng: f64, t: i64) -> RawRoutePoint {
        RawRoutePoint {
            lat: Some(lat),
            lng: Some(lng),
            t: Some(t),
            acc: None,
        }
    }

    fn last(lat: f64, lng: f64) -> LastLocation {
        LastLocation {
            lat: Some(lat),
            lng: Some(lng),
            ..LastLocation::default()
        }
    }

    #[tokio::test]
    async fn identical_memo_fetch_does_not_replace_state() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| s.memos = Some(vec![memo("x", 10), memo("x", 20)]));
        let sync = sync_with(tracker.clone(), Fix::Fail);

        assert!(sync.refresh_memos_silent().await);
        let first = sync.snapshot().await;
        assert_eq!(first.memos[0].saved_at, Some(20));

        assert!(!sync.refresh_memos_silent().await);
        let second = sync.snapshot().await;
        assert_eq!(second.memo_updates, 1);
        assert!(Arc::ptr_eq(&first.memos, &second.memos));

        tracker.edit(|s| s.memos.as_mut().unwrap().push(memo("x", 30)));
        assert!(sync.refresh_memos_silent().await);
        assert_eq!(sync.snapshot().await.memo_updates, 2);
    }

    #[tokio::test]
    async fn memo_fetch_failure_keeps_previous_list() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| s.memos = Some(vec![memo("x", 10)]));
        let sync = sync_with(tracker.clone(), Fix::Fail);
        sync.refresh_memos_silent().await;

        tracker.edit(|s| s.memos = None);
        assert!(!sync.refresh_memos_silent().await);
        assert_eq!(sync.memos().await.len(), 1);
    }

    #[tokio::test]
    async fn route_fetch_failure_clears_route() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| s.route = Some(vec![raw(1.0, 1.0, 1), raw(1.0, 1.1, 2)]));
        let sync = sync_with(tracker.clone(), Fix::Fail);
        sync.refresh_route_silent().await;
        assert_eq!(sync.route().await.len(), 2);

        tracker.edit(|s| s.route = None);
        sync.refresh_route_silent().await;
        assert!(sync.route().await.is_empty());

        tracker.edit(|s| s.route = Some(vec![raw(1.0, 1.0, 1), raw(1.0, 1.1, 2)]));
        assert!(sync.refresh_route_silent().await);
        assert_eq!(sync.route().await.len(), 2);
    }

    #[tokio::test]
    async fn route_refresh_skips_unchanged_and_drops_invalid_points() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| {
            s.route = Some(vec![
                raw(1.0, 1.0, 1),
                RawRoutePoint::default(),
                raw(1.0, 1.1, 2),
            ])
        });
        let sync = sync_with(tracker, Fix::Fail);
        assert!(sync.refresh_route_silent().await);
        assert!(!sync.refresh_route_silent().await);
        let snapshot = sync.snapshot().await;
        assert_eq!(snapshot.route.len(), 2);
        assert_eq!(snapshot.route_updates, 1);
    }

    #[tokio::test]
    async fn begin_session_forces_republish() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| s.memos = Some(vec![memo("x", 10)]));
        let sync = sync_with(tracker, Fix::Fail);
        sync.refresh_memos_silent().await;
        sync.begin_session().await;
        assert!(sync.refresh_memos_silent().await);
    }

    #[tokio::test]
    async fn manual_override_forces_center_and_failure_disables_it() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| {
            s.manual = Some(ManualLocation {
                enabled: true,
                lat: Some(35.0),
                lng: Some(129.0),
                acc: Some(0.0),
            })
        });
        let sync = sync_with(tracker.clone(), Fix::Fail);
        sync.set_center_stable(Coordinate::new(35.00001, 129.0), true).await;

        sync.refresh_manual().await;
        let snapshot = sync.snapshot().await;
        assert!(snapshot.manual.enabled);
        assert_eq!(snapshot.center, Some(Coordinate::new(35.0, 129.0)));

        tracker.edit(|s| s.manual = None);
        sync.refresh_manual().await;
        assert_eq!(sync.snapshot().await.manual, ManualLocation::disabled());
    }

    #[tokio::test]
    async fn poll_tick_follows_gps_only_without_override() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| {
            s.last = Some(last(37.0, 127.0));
            s.memos = Some(Vec::new());
            s.route = Some(Vec::new());
        });
        let sync = sync_with(tracker.clone(), Fix::Fail);
        sync.poll_tick().await;
        assert_eq!(sync.snapshot().await.center, Some(Coordinate::new(37.0, 127.0)));

        tracker.edit(|s| {
            s.manual = Some(ManualLocation {
                enabled: true,
                lat: Some(10.0),
                lng: Some(10.0),
                acc: None,
            });
            s.last = Some(last(38.0, 128.0));
        });
        sync.refresh_manual().await;
        sync.poll_tick().await;
        assert_eq!(sync.snapshot().await.center, Some(Coordinate::new(10.0, 10.0)));
    }

    #[tokio::test]
    async fn auto_center_prefers_device_fix_and_runs_once() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| s.last = Some(last(1.0, 1.0)));
        let sync = sync_with(tracker, Fix::At(2.0, 2.0));

        assert!(sync.auto_center_once().await);
        assert_eq!(sync.snapshot().await.center, Some(Coordinate::new(2.0, 2.0)));
        assert!(!sync.auto_center_once().await);

        sync.handle_event(SyncEvent::Lifecycle {
            from: AppLifecycle::Inactive,
            to: AppLifecycle::Active,
        })
        .await;
        assert!(!sync.auto_center_once().await);

        sync.handle_event(SyncEvent::Lifecycle {
            from: AppLifecycle::Background,
            to: AppLifecycle::Active,
        })
        .await;
        assert!(sync.auto_center_once().await);
    }

    #[tokio::test]
    async fn auto_center_falls_back_to_last_location() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| s.last = Some(last(1.0, 1.0)));
        let sync = sync_with(tracker.clone(), Fix::Fail);
        assert!(sync.auto_center_once().await);
        assert_eq!(sync.snapshot().await.center, Some(Coordinate::new(1.0, 1.0)));

        let empty = ScriptedTracker::new();
        let sync = sync_with(empty, Fix::Fail);
        assert!(!sync.auto_center_once().await);
        assert!(!sync.snapshot().await.auto_centered);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_center_gives_up_on_slow_device_fix() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| s.last = Some(last(5.0, 6.0)));
        let sync = sync_with(tracker, Fix::Hang);
        assert!(sync.auto_center_once().await);
        assert_eq!(sync.snapshot().await.center, Some(Coordinate::new(5.0, 6.0)));
    }

    #[tokio::test]
    async fn auto_center_is_noop_under_manual_override() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| {
            s.manual = Some(ManualLocation {
                enabled: true,
                lat: Some(3.0),
                lng: Some(3.0),
                acc: None,
            })
        });
        let sync = sync_with(tracker, Fix::At(2.0, 2.0));
        sync.refresh_manual().await;
        assert!(!sync.auto_center_once().await);
        assert_eq!(sync.snapshot().await.center, Some(Coordinate::new(3.0, 3.0)));
    }

    #[tokio::test]
    async fn note_saved_refreshes_and_recenters_softly() {
        let tracker = ScriptedTracker::new();
        tracker.edit(|s| {
            s.memos = Some(vec![memo("x", 1)]);
            s.route = Some(vec![raw(1.0, 1.0, 1)]);
        });
        let sync = sync_with(tracker, Fix::Fail);
        sync.set_center_stable(Coordinate::new(1.0, 1.0), true).await;

        sync.handle_event(TrackerEvent::NoteSaved {
            lat: Some(1.00001),
            lng: Some(1.0),
        }
        .into())
        .await;
        let snapshot = sync.snapshot().await;
        assert_eq!(snapshot.memos.len(), 1);
        assert_eq!(snapshot.route.len(), 1);
        assert_eq!(snapshot.center, Some(Coordinate::new(1.0, 1.0)));

        sync.handle_event(SyncEvent::NoteSaved {
            lat: Some(1.001),
            lng: Some(1.0),
        })
        .await;
        assert_eq!(sync.snapshot().await.center, Some(Coordinate::new(1.001, 1.0)));
    }
}
