//! Read-only shapes handed to the presentation layer.

use serde::Serialize;

use crate::{
    models::{Coordinate, MemoItem, RoutePoint},
    session::SessionPhase,
    sync::SyncSnapshot,
};

/// A memo that can be drawn on the map.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoPin {
    pub lat: f64,
    pub lng: f64,
    pub text: String,
    pub saved_at: Option<i64>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounts {
    pub memos: usize,
    pub pinned: usize,
    pub route_points: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub status: String,
    pub tracking: bool,
    pub session_id: Option<String>,
    pub center: Option<Coordinate>,
    pub manual_override: bool,
    pub pins: Vec<MemoPin>,
    pub route: Vec<RoutePoint>,
    pub counts: SessionCounts,
}

/// Result of a stop, shown once the session is closed.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Option<String>,
    pub started_at: Option<i64>,
    pub ended_at: i64,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub memo_count: usize,
    pub route_points: usize,
}

/// Memos with usable coordinates, in the order given (newest first upstream).
pub fn pins_from_memos(memos: &[MemoItem]) -> Vec<MemoPin> {
    memos
        .iter()
        .filter_map(|memo| {
            let coord = memo.coordinate()?;
            Some(MemoPin {
                lat: coord.lat,
                lng: coord.lng,
                text: memo.text.clone().unwrap_or_default(),
                saved_at: memo.saved_at,
                session_id: memo.session_id.clone(),
            })
        })
        .collect()
}

impl SessionView {
    pub fn build(status: &str, phase: &SessionPhase, sync: &SyncSnapshot) -> Self {
        let pins = pins_from_memos(&sync.memos);
        let counts = SessionCounts {
            memos: sync.memos.len(),
            pinned: pins.len(),
            route_points: sync.route.len(),
        };
        Self {
            status: status.to_string(),
            tracking: phase.is_active(),
            session_id: phase.session_id().map(str::to_string),
            center: sync.center,
            manual_override: sync.manual.enabled,
            pins,
            route: sync.route.to_vec(),
            counts,
        }
    }
}
