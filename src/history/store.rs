use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    models::{MemoItem, RoutePoint, SessionSlots, SessionSnapshot},
    storage::{KeyValueStore, SESSION_SLOTS_KEY},
    tracker::Tracker,
};

use super::snapshot::build_snapshot;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Everything known about a session at the moment it stopped.
pub struct EndedSession<'a> {
    pub session_id: Option<&'a str>,
    pub started_at: Option<i64>,
    pub ended_at: i64,
    pub all_memos: &'a [MemoItem],
    pub live_route: &'a [RoutePoint],
}

/// The three most recent session snapshots, stored as one serialized record.
///
/// Reads fall back to empty slots and writes are best effort; neither ever
/// reports an error to the caller. Only one session can end at a time, so
/// the read-modify-write is not guarded.
#[derive(Clone)]
pub struct SessionHistory {
    store: Arc<dyn KeyValueStore>,
}

impl SessionHistory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> SessionSlots {
        match self.try_load().await {
            Ok(slots) => slots,
            Err(err) => {
                log_debug!("session history unreadable, starting empty: {err:#}");
                SessionSlots::default()
            }
        }
    }

    async fn try_load(&self) -> Result<SessionSlots> {
        let Some(raw) = self.store.get(SESSION_SLOTS_KEY).await? else {
            return Ok(SessionSlots::default());
        };
        serde_json::from_str(&raw).context("failed to parse session history")
    }

    /// Snapshots the ended session, pushes it into `slot1` and persists.
    /// Returns the snapshot whether or not the write succeeded.
    pub async fn end_session_and_snapshot(
        &self,
        tracker: &dyn Tracker,
        ended: EndedSession<'_>,
    ) -> SessionSnapshot {
        let route_log = match tracker.route().await {
            Ok(route) => route,
            Err(err) => {
                log_debug!("route log unavailable for snapshot: {err:#}");
                Vec::new()
            }
        };

        let snapshot = build_snapshot(
            ended.session_id,
            ended.started_at,
            ended.ended_at,
            ended.all_memos,
            route_log,
            ended.live_route,
        );

        let slots = self.load().await.rotate(snapshot.clone());
        match self.save(&slots).await {
            Ok(()) => log_info!(
                "Stored session {} with {} memos and {} route points",
                snapshot.session_id.as_deref().unwrap_or("<anonymous>"),
                snapshot.memos.len(),
                snapshot.route.len()
            ),
            Err(err) => log_debug!("session history write failed: {err:#}"),
        }

        snapshot
    }

    async fn save(&self, slots: &SessionSlots) -> Result<()> {
        let serialized = serde_json::to_string(slots)?;
        self.store.set(SESSION_SLOTS_KEY, &serialized).await
    }

    /// Drops every stored snapshot. Best effort, like all history writes.
    pub async fn clear(&self) {
        if let Err(err) = self.store.remove(SESSION_SLOTS_KEY).await {
            log_debug!("session history clear failed: {err:#}");
        }
    }
}
