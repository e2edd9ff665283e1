use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Mutex, MutexGuard,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{StartedSession, StoppedSession, Tracker, TrackerEvent};
use crate::models::{
    Coordinate, LastLocation, ManualLocation, MemoItem, RawRoutePoint, RoutePoint,
};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Default)]
struct TrackerInner {
    active: Option<(String, i64)>,
    route_log: Vec<RawRoutePoint>,
    memos: Vec<MemoItem>,
    last: Option<LastLocation>,
    manual: ManualLocation,
}

/// Software tracker that keeps everything in process memory.
///
/// Fixes are pushed in with [`record_fix`](Self::record_fix). The route log
/// holds the current session only: it is cleared when a session starts and
/// kept after a stop so the ended session can still be snapshotted.
pub struct InMemoryTracker {
    inner: Mutex<TrackerInner>,
    events: broadcast::Sender<TrackerEvent>,
    available: AtomicBool,
    overlay_granted: AtomicBool,
    overlay_settings_opened: AtomicU32,
}

impl Default for InMemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTracker {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            inner: Mutex::new(TrackerInner::default()),
            events,
            available: AtomicBool::new(true),
            overlay_granted: AtomicBool::new(true),
            overlay_settings_opened: AtomicU32::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            bail!("tracking service is not running");
        }
        Ok(())
    }

    /// Simulates the native service going away; every request fails until restored.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_overlay_permission(&self, granted: bool) {
        self.overlay_granted.store(granted, Ordering::SeqCst);
    }

    pub fn overlay_settings_opened(&self) -> u32 {
        self.overlay_settings_opened.load(Ordering::SeqCst)
    }

    pub fn set_manual_location(&self, location: Option<Coordinate>) {
        let mut inner = self.lock();
        inner.manual = match location {
            Some(coord) => ManualLocation {
                enabled: true,
                lat: Some(coord.lat),
                lng: Some(coord.lng),
                acc: Some(0.0),
            },
            None => ManualLocation::disabled(),
        };
    }

    pub fn record_fix(&self, lat: f64, lng: f64, acc: Option<f64>) {
        self.record_fix_at(lat, lng, acc, Utc::now().timestamp_millis());
    }

    /// Records a fix with an explicit timestamp. Fixes only enter the route
    /// log while a session is active.
    pub fn record_fix_at(&self, lat: f64, lng: f64, acc: Option<f64>, t: i64) {
        let mut inner = self.lock();
        inner.last = Some(LastLocation {
            lat: Some(lat),
            lng: Some(lng),
            acc,
            t: Some(t),
        });
        if inner.active.is_some() {
            inner.route_log.push(RawRoutePoint {
                lat: Some(lat),
                lng: Some(lng),
                t: Some(t),
                acc,
            });
        }
    }

    /// Imports a memo created elsewhere and announces it like a native save.
    pub fn record_memo(&self, memo: MemoItem) {
        let event = TrackerEvent::NoteSaved {
            lat: memo.lat,
            lng: memo.lng,
        };
        self.lock().memos.push(memo);
        let _ = self.events.send(event);
    }

    pub fn active_session_id(&self) -> Option<String> {
        self.lock().active.as_ref().map(|(id, _)| id.clone())
    }
}

/// Great-circle length of the path in metres.
fn path_length_m(points: &[RoutePoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_m(&pair[0], &pair[1]))
        .sum()
}

fn haversine_m(a: &RoutePoint, b: &RoutePoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[async_trait]
impl Tracker for InMemoryTracker {
    async fn start_session(&self) -> Result<StartedSession> {
        self.ensure_available()?;
        let mut inner = self.lock();
        if let Some((id, _)) = &inner.active {
            bail!("session {id} is already running");
        }
        let session_id = Uuid::new_v4().to_string();
        let start_time = Utc::now().timestamp_millis();
        inner.route_log.clear();
        inner.active = Some((session_id.clone(), start_time));
        Ok(StartedSession {
            session_id,
            start_time,
        })
    }

    async fn stop_session(&self) -> Result<StoppedSession> {
        self.ensure_available()?;
        let mut inner = self.lock();
        let Some((session_id, start_time)) = inner.active.take() else {
            bail!("no session is running");
        };
        let end_time = Utc::now().timestamp_millis().max(start_time);

        let session_points: Vec<RoutePoint> = inner
            .route_log
            .iter()
            .filter_map(|raw| RoutePoint::try_from(*raw).ok())
            .filter(|point| point.within(start_time, end_time))
            .collect();

        Ok(StoppedSession {
            session_id: Some(session_id),
            end_time: Some(end_time),
            total_meters: Some(path_length_m(&session_points)),
            duration_ms: Some((end_time - start_time) as f64),
            ..StoppedSession::default()
        })
    }

    async fn last_location(&self) -> Result<LastLocation> {
        self.ensure_available()?;
        match self.lock().last {
            Some(last) => Ok(last),
            None => bail!("no location fix yet"),
        }
    }

    async fn route(&self) -> Result<Vec<RawRoutePoint>> {
        self.ensure_available()?;
        Ok(self.lock().route_log.clone())
    }

    async fn memos(&self) -> Result<Vec<MemoItem>> {
        self.ensure_available()?;
        Ok(self.lock().memos.clone())
    }

    async fn manual_location(&self) -> Result<ManualLocation> {
        self.ensure_available()?;
        Ok(self.lock().manual)
    }

    async fn save_memo(&self, text: &str) -> Result<MemoItem> {
        self.ensure_available()?;
        let text = text.trim();
        if text.is_empty() {
            bail!("memo text is empty");
        }

        let memo = {
            let mut inner = self.lock();
            let location = inner
                .manual
                .active_coordinate()
                .map(|coord| LastLocation {
                    lat: Some(coord.lat),
                    lng: Some(coord.lng),
                    acc: inner.manual.acc,
                    t: None,
                })
                .or(inner.last)
                .unwrap_or_default();
            let memo = MemoItem {
                session_id: inner.active.as_ref().map(|(id, _)| id.clone()),
                text: Some(text.to_string()),
                saved_at: Some(Utc::now().timestamp_millis()),
                lat: location.lat,
                lng: location.lng,
                acc: location.acc,
                loc_t: location.t,
            };
            inner.memos.push(memo.clone());
            memo
        };

        let _ = self.events.send(TrackerEvent::NoteSaved {
            lat: memo.lat,
            lng: memo.lng,
        });
        Ok(memo)
    }

    async fn can_draw_overlays(&self) -> Result<bool> {
        self.ensure_available()?;
        Ok(self.overlay_granted.load(Ordering::SeqCst))
    }

    async fn open_overlay_settings(&self) -> Result<()> {
        self.ensure_available()?;
        self.overlay_settings_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }
}
