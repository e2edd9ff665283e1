use std::{future::Future, sync::Arc};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    clipboard::{clipboard_loop, ClipboardOffer},
    history::{EndedSession, SessionHistory},
    models::{MemoItem, SessionSlots},
    settings::SyncSettings,
    storage::KeyValueStore,
    sync::{poll_loop, AppLifecycle, SessionSynchronizer, SyncEvent},
    tracker::{Clipboard, Geolocator, StartedSession, Tracker},
    utils::logging::debug_mode,
    view::{SessionSummary, SessionView},
};

use super::{
    describe_failure,
    state::{
        ControllerState, SessionPhase, STATUS_IDLE, STATUS_SAVING, STATUS_STARTING,
        STATUS_STOPPING, STATUS_TRACKING,
    },
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

struct LoopHandle {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl LoopHandle {
    fn spawn<F>(make: impl FnOnce(CancellationToken) -> F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(make(cancel_token.clone()));
        Self {
            handle,
            cancel_token,
        }
    }

    async fn stop(self) {
        self.cancel_token.cancel();
        if let Err(err) = self.handle.await {
            log_debug!("background loop ended abnormally: {err}");
        }
    }
}

fn elapsed_minutes(started_at: i64, ended_at: i64) -> f64 {
    ended_at.saturating_sub(started_at).max(0) as f64 / 60_000.0
}

#[derive(Clone)]
struct ClipboardWiring {
    clipboard: Arc<dyn Clipboard>,
    offers: mpsc::Sender<ClipboardOffer>,
}

/// Owns the session lifecycle and the background loops around it.
///
/// User actions (`start_session`, `stop_session`, `save_memo`) run one at a
/// time, report failures as errors and restore the previous status line when
/// they fail. Everything else is best effort.
#[derive(Clone)]
pub struct SessionController {
    tracker: Arc<dyn Tracker>,
    sync: Arc<SessionSynchronizer>,
    history: SessionHistory,
    settings: SyncSettings,
    clipboard: Option<ClipboardWiring>,
    state: Arc<Mutex<ControllerState>>,
    action_lock: Arc<Mutex<()>>,
    lifecycle: Arc<Mutex<AppLifecycle>>,
    poller: Arc<Mutex<Option<LoopHandle>>>,
    clipboard_watch: Arc<Mutex<Option<LoopHandle>>>,
    auto_center: Arc<Mutex<Option<LoopHandle>>>,
    event_pump: Arc<Mutex<Option<LoopHandle>>>,
    verbose: bool,
}

impl SessionController {
    pub fn new(
        tracker: Arc<dyn Tracker>,
        geolocator: Arc<dyn Geolocator>,
        store: Arc<dyn KeyValueStore>,
        settings: SyncSettings,
    ) -> Self {
        let sync = Arc::new(SessionSynchronizer::new(
            tracker.clone(),
            geolocator,
            settings.clone(),
        ));
        Self {
            tracker,
            sync,
            history: SessionHistory::new(store),
            settings,
            clipboard: None,
            state: Arc::new(Mutex::new(ControllerState::default())),
            action_lock: Arc::new(Mutex::new(())),
            lifecycle: Arc::new(Mutex::new(AppLifecycle::Background)),
            poller: Arc::new(Mutex::new(None)),
            clipboard_watch: Arc::new(Mutex::new(None)),
            auto_center: Arc::new(Mutex::new(None)),
            event_pump: Arc::new(Mutex::new(None)),
            verbose: debug_mode(),
        }
    }

    /// Enables clipboard watching while foregrounded; fresh text goes to `offers`.
    pub fn with_clipboard(
        mut self,
        clipboard: Arc<dyn Clipboard>,
        offers: mpsc::Sender<ClipboardOffer>,
    ) -> Self {
        self.clipboard = Some(ClipboardWiring { clipboard, offers });
        self
    }

    pub fn synchronizer(&self) -> &Arc<SessionSynchronizer> {
        &self.sync
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase.clone()
    }

    pub async fn status(&self) -> String {
        self.state.lock().await.status.clone()
    }

    pub async fn view(&self) -> SessionView {
        let (status, phase) = {
            let state = self.state.lock().await;
            (state.status.clone(), state.phase.clone())
        };
        let snapshot = self.sync.snapshot().await;
        SessionView::build(&status, &phase, &snapshot)
    }

    pub async fn history(&self) -> SessionSlots {
        self.history.load().await
    }

    pub async fn clear_history(&self) {
        self.history.clear().await;
    }

    /// Brings the controller up: subscribes to tracker events, reads the
    /// manual override and treats the app as freshly foregrounded.
    pub async fn attach(&self) {
        self.listen_events().await;
        self.sync.refresh_manual().await;
        self.set_lifecycle(AppLifecycle::Active).await;
    }

    /// Tears down every background loop. Calls still in flight are dropped.
    pub async fn shutdown(&self) {
        for slot in [
            &self.poller,
            &self.clipboard_watch,
            &self.auto_center,
            &self.event_pump,
        ] {
            if let Some(handle) = slot.lock().await.take() {
                handle.stop().await;
            }
        }
        log_info!("session controller shut down");
    }

    pub async fn start_session(&self) -> Result<StartedSession> {
        let _action = self.action_lock.lock().await;
        if self.state.lock().await.phase.is_active() {
            bail!("a session is already running");
        }

        let started = self
            .run_action(STATUS_STARTING, async {
                let can_draw = self
                    .tracker
                    .can_draw_overlays()
                    .await
                    .context("failed to check overlay permission")?;
                if !can_draw {
                    if let Err(err) = self.tracker.open_overlay_settings().await {
                        log_debug!("could not open overlay settings: {err:#}");
                    }
                    bail!("overlay permission is required to start tracking");
                }
                self.tracker
                    .start_session()
                    .await
                    .context("failed to start tracking session")
            })
            .await?;

        {
            let mut state = self.state.lock().await;
            state.phase = SessionPhase::Active {
                session_id: started.session_id.clone(),
                started_at: started.start_time,
            };
            state.status = STATUS_TRACKING.to_string();
        }

        self.sync.begin_session().await;
        self.spawn_poller().await;

        log_info!("Session {} started", started.session_id);
        Ok(started)
    }

    pub async fn stop_session(&self) -> Result<SessionSummary> {
        let _action = self.action_lock.lock().await;
        let (session_id, started_at) = match &self.state.lock().await.phase {
            SessionPhase::Active {
                session_id,
                started_at,
            } => (session_id.clone(), *started_at),
            SessionPhase::Idle => bail!("no active session to stop"),
        };

        let stopped = self
            .run_action(STATUS_STOPPING, async {
                self.tracker
                    .stop_session()
                    .await
                    .context("failed to stop tracking session")
            })
            .await?;
        let ended_at = stopped
            .end_time
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        self.cancel_poller().await;
        self.sync.refresh_memos_silent().await;
        let memos = self.sync.memos().await;
        let live_route = self.sync.route().await;

        let snapshot = self
            .history
            .end_session_and_snapshot(
                self.tracker.as_ref(),
                EndedSession {
                    session_id: Some(&session_id),
                    started_at: Some(started_at),
                    ended_at,
                    all_memos: &memos,
                    live_route: &live_route,
                },
            )
            .await;

        {
            let mut state = self.state.lock().await;
            state.phase = SessionPhase::Idle;
            state.status = STATUS_IDLE.to_string();
        }

        let duration_minutes = stopped
            .duration_minutes()
            .or_else(|| Some(elapsed_minutes(started_at, ended_at)));

        log_info!(
            "Session {} stopped with {} memos",
            session_id,
            snapshot.memos.len()
        );

        Ok(SessionSummary {
            session_id: snapshot.session_id,
            started_at: snapshot.started_at,
            ended_at,
            distance_km: stopped.distance_km(),
            duration_minutes,
            memo_count: snapshot.memos.len(),
            route_points: snapshot.route.len(),
        })
    }

    /// Saves `text` (usually clipboard content) as a memo at the current location.
    pub async fn save_memo(&self, text: &str) -> Result<MemoItem> {
        let _action = self.action_lock.lock().await;
        let memo = self
            .run_action(STATUS_SAVING, async {
                if text.trim().is_empty() {
                    bail!("nothing to save");
                }
                self.tracker.save_memo(text).await.context("failed to save memo")
            })
            .await?;

        self.restore_status().await;
        self.sync.refresh_memos_silent().await;
        self.sync.refresh_route_silent().await;
        Ok(memo)
    }

    /// Records a foreground/background transition. Returning to the
    /// foreground re-arms auto-centering and starts the clipboard watcher;
    /// leaving it stops the watcher.
    pub async fn set_lifecycle(&self, next: AppLifecycle) {
        let previous = {
            let mut lifecycle = self.lifecycle.lock().await;
            std::mem::replace(&mut *lifecycle, next)
        };
        self.sync
            .handle_event(SyncEvent::Lifecycle {
                from: previous,
                to: next,
            })
            .await;

        if next == AppLifecycle::Active {
            self.spawn_clipboard_watch().await;
            self.spawn_auto_center().await;
        } else if let Some(handle) = self.clipboard_watch.lock().await.take() {
            handle.stop().await;
        }
    }

    /// Forwards tracker notifications into the synchronizer until shutdown.
    pub async fn listen_events(&self) {
        let mut slot = self.event_pump.lock().await;
        if slot.is_some() {
            return;
        }
        let mut events = self.tracker.subscribe();
        let sync = self.sync.clone();
        *slot = Some(LoopHandle::spawn(move |cancel_token| async move {
            loop {
                tokio::select! {
                    received = events.recv() => match received {
                        Ok(event) => sync.handle_event(event.into()).await,
                        Err(RecvError::Lagged(skipped)) => {
                            log_debug!("missed {skipped} tracker events, refreshing");
                            sync.handle_event(SyncEvent::NoteSaved { lat: None, lng: None }).await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = cancel_token.cancelled() => break,
                }
            }
        }));
    }

    async fn run_action<T, F>(&self, pending_status: &str, action: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let previous_status = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut state.status, pending_status.to_string())
        };

        match action.await {
            Ok(value) => Ok(value),
            Err(err) => {
                log_warn!("{pending_status} failed: {}", describe_failure(&err));
                self.state.lock().await.status = previous_status;
                Err(err)
            }
        }
    }

    async fn restore_status(&self) {
        let mut state = self.state.lock().await;
        state.status = if state.phase.is_active() {
            STATUS_TRACKING
        } else {
            STATUS_IDLE
        }
        .to_string();
    }

    async fn spawn_poller(&self) {
        let mut slot = self.poller.lock().await;
        if let Some(previous) = slot.take() {
            previous.stop().await;
        }
        let sync = self.sync.clone();
        let period = self.settings.poll_interval();
        let verbose = self.verbose;
        *slot = Some(LoopHandle::spawn(move |cancel_token| {
            poll_loop(sync, period, verbose, cancel_token)
        }));
    }

    async fn cancel_poller(&self) {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.stop().await;
        }
    }

    /// A fix that lands after shutdown is dropped with the task.
    async fn spawn_auto_center(&self) {
        let mut slot = self.auto_center.lock().await;
        if let Some(previous) = slot.take() {
            previous.stop().await;
        }
        let sync = self.sync.clone();
        *slot = Some(LoopHandle::spawn(move |cancel_token| async move {
            tokio::select! {
                _ = sync.auto_center_once() => {}
                _ = cancel_token.cancelled() => {
                    log_debug!("auto-center abandoned");
                }
            }
        }));
    }

    async fn spawn_clipboard_watch(&self) {
        let Some(wiring) = self.clipboard.clone() else {
            return;
        };
        let mut slot = self.clipboard_watch.lock().await;
        if slot.is_some() {
            return;
        }
        let period = self.settings.clipboard_interval();
        *slot = Some(LoopHandle::spawn(move |cancel_token| {
            clipboard_loop(wiring.clipboard, period, wiring.offers, cancel_token)
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::{
        models::{Coordinate, LastLocation},
        storage::MemoryStore,
        tracker::{InMemoryTracker, NoGeolocator},
    };

    /// Answers with a fixed position after `delay`.
    struct SlowGeolocator {
        delay: Duration,
        at: Coordinate,
    }

    #[async_trait]
    impl Geolocator for SlowGeolocator {
        async fn current_position(&self, _high_accuracy: bool) -> Result<LastLocation> {
            tokio::time::sleep(self.delay).await;
            Ok(LastLocation {
                lat: Some(self.at.lat),
                lng: Some(self.at.lng),
                acc: Some(5.0),
                t: None,
            })
        }
    }

    fn controller(tracker: Arc<InMemoryTracker>) -> SessionController {
        SessionController::new(
            tracker,
            Arc::new(NoGeolocator),
            Arc::new(MemoryStore::new()),
            SyncSettings::default(),
        )
    }

    #[tokio::test]
    async fn start_then_stop_returns_to_idle() {
        let tracker = Arc::new(InMemoryTracker::new());
        let controller = controller(tracker.clone());

        let started = controller.start_session().await.unwrap();
        assert_eq!(controller.status().await, STATUS_TRACKING);
        assert_eq!(controller.phase().await.session_id(), Some(started.session_id.as_str()));
        assert!(controller.start_session().await.is_err());

        controller.save_memo("parking spot").await.unwrap();
        assert_eq!(controller.status().await, STATUS_TRACKING);

        let summary = controller.stop_session().await.unwrap();
        assert_eq!(summary.session_id, Some(started.session_id.clone()));
        assert_eq!(summary.memo_count, 1);
        assert!(summary.distance_km.is_some());
        assert_eq!(controller.phase().await, SessionPhase::Idle);
        assert_eq!(controller.status().await, STATUS_IDLE);

        let history = controller.history().await;
        assert_eq!(
            history.slot1.unwrap().session_id,
            Some(started.session_id)
        );
        assert!(controller.stop_session().await.is_err());
    }

    #[tokio::test]
    async fn failed_start_restores_status() {
        let tracker = Arc::new(InMemoryTracker::new());
        tracker.set_available(false);
        let controller = controller(tracker);

        let err = controller.start_session().await.unwrap_err();
        assert!(describe_failure(&err).starts_with("failed to check overlay permission"));
        assert_eq!(controller.status().await, STATUS_IDLE);
        assert_eq!(controller.phase().await, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn missing_overlay_permission_opens_settings() {
        let tracker = Arc::new(InMemoryTracker::new());
        tracker.set_overlay_permission(false);
        let controller = controller(tracker.clone());

        let err = controller.start_session().await.unwrap_err();
        assert!(describe_failure(&err).contains("overlay permission"));
        assert_eq!(tracker.overlay_settings_opened(), 1);
        assert!(tracker.active_session_id().is_none());
    }

    #[tokio::test]
    async fn failed_stop_keeps_session_running() {
        let tracker = Arc::new(InMemoryTracker::new());
        let controller = controller(tracker.clone());
        controller.start_session().await.unwrap();

        tracker.set_available(false);
        assert!(controller.stop_session().await.is_err());
        assert_eq!(controller.status().await, STATUS_TRACKING);
        assert!(controller.phase().await.is_active());

        tracker.set_available(true);
        controller.stop_session().await.unwrap();
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn blank_memo_is_rejected_without_changing_status() {
        let controller = controller(Arc::new(InMemoryTracker::new()));
        assert!(controller.save_memo("  ").await.is_err());
        assert_eq!(controller.status().await, STATUS_IDLE);
    }

    #[tokio::test]
    async fn view_reflects_saved_memos() {
        let tracker = Arc::new(InMemoryTracker::new());
        tracker.record_fix(37.0, 127.0, None);
        let controller = controller(tracker.clone());
        controller.start_session().await.unwrap();
        controller.save_memo("viewpoint").await.unwrap();

        let view = controller.view().await;
        assert!(view.tracking);
        assert_eq!(view.counts.memos, 1);
        assert_eq!(view.pins.len(), 1);
        assert_eq!(
            Coordinate::new(view.pins[0].lat, view.pins[0].lng),
            Coordinate::new(37.0, 127.0)
        );
        controller.stop_session().await.unwrap();
    }

    #[tokio::test]
    async fn starting_a_session_keeps_auto_center_done() {
        let tracker = Arc::new(InMemoryTracker::new());
        tracker.record_fix(37.0, 127.0, None);
        let controller = controller(tracker);
        let sync = controller.synchronizer().clone();

        assert!(sync.auto_center_once().await);
        controller.start_session().await.unwrap();
        assert!(!sync.auto_center_once().await);
        assert!(sync.snapshot().await.auto_centered);
        controller.stop_session().await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_holds_only_the_ended_session_route() {
        let tracker = Arc::new(InMemoryTracker::new());
        let controller = controller(tracker.clone());

        controller.start_session().await.unwrap();
        for lat in [37.0, 37.01, 37.02] {
            tracker.record_fix(lat, 127.0, None);
        }
        controller.stop_session().await.unwrap();

        controller.start_session().await.unwrap();
        tracker.record_fix(38.0, 127.0, None);
        controller.synchronizer().refresh_route_silent().await;
        assert_eq!(controller.view().await.counts.route_points, 1);

        let summary = controller.stop_session().await.unwrap();
        assert_eq!(summary.route_points, 1);
        let latest = controller.history().await.slot1.unwrap();
        let lats: Vec<f64> = latest.route.iter().map(|p| p.lat).collect();
        assert_eq!(lats, vec![38.0]);
    }

    #[test]
    fn elapsed_minutes_tolerates_bad_timestamps() {
        assert_eq!(elapsed_minutes(0, 90_000), 1.5);
        assert_eq!(elapsed_minutes(90_000, 0), 0.0);
        assert!(elapsed_minutes(i64::MIN, i64::MAX).is_finite());
        assert_eq!(elapsed_minutes(i64::MAX, i64::MIN), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn device_fix_after_shutdown_is_discarded() {
        let controller = SessionController::new(
            Arc::new(InMemoryTracker::new()),
            Arc::new(SlowGeolocator {
                delay: Duration::from_secs(5),
                at: Coordinate::new(37.5, 127.0),
            }),
            Arc::new(MemoryStore::new()),
            SyncSettings::default(),
        );

        controller.attach().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        controller.shutdown().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let snapshot = controller.synchronizer().snapshot().await;
        assert_eq!(snapshot.center, None);
        assert!(!snapshot.auto_centered);
    }
}
