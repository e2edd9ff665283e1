//! Contracts for the platform services the session logic talks to.
//!
//! The native location service, the device geolocation API and the system
//! clipboard are all reached through the traits below. Each capability is one
//! method; implementations report failures as errors and the caller decides
//! whether a failure is surfaced or swallowed.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{LastLocation, ManualLocation, MemoItem, RawRoutePoint};

pub use memory::InMemoryTracker;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: String,
    pub start_time: i64,
}

/// Reply to a stop request. Distance and duration arrive under whichever
/// unit the service build reports; use the accessors to read them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoppedSession {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub total_km: Option<f64>,
    #[serde(default)]
    pub total_meters: Option<f64>,
    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub total_minutes: Option<f64>,
    #[serde(default)]
    pub total_seconds: Option<f64>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl StoppedSession {
    pub fn distance_km(&self) -> Option<f64> {
        finite(self.total_km)
            .or_else(|| finite(self.total_meters).map(|m| m / 1000.0))
            .or_else(|| finite(self.distance_meters).map(|m| m / 1000.0))
    }

    pub fn duration_minutes(&self) -> Option<f64> {
        finite(self.total_minutes)
            .or_else(|| finite(self.total_seconds).map(|s| s / 60.0))
            .or_else(|| finite(self.duration_ms).map(|ms| ms / 60_000.0))
    }
}

/// Notifications pushed by the tracker outside of any request.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A memo was saved on the service side (for example from an overlay button).
    NoteSaved { lat: Option<f64>, lng: Option<f64> },
}

#[async_trait]
pub trait Tracker: Send + Sync {
    async fn start_session(&self) -> Result<StartedSession>;
    async fn stop_session(&self) -> Result<StoppedSession>;
    async fn last_location(&self) -> Result<LastLocation>;
    /// Full persisted route log, possibly spanning several sessions.
    async fn route(&self) -> Result<Vec<RawRoutePoint>>;
    async fn memos(&self) -> Result<Vec<MemoItem>>;
    async fn manual_location(&self) -> Result<ManualLocation>;
    /// Captures `text` as a memo at the service's current location.
    async fn save_memo(&self, text: &str) -> Result<MemoItem>;
    async fn can_draw_overlays(&self) -> Result<bool>;
    async fn open_overlay_settings(&self) -> Result<()>;
    fn subscribe(&self) -> broadcast::Receiver<TrackerEvent>;
}

/// One-shot device position lookup, independent of the tracking service.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self, high_accuracy: bool) -> Result<LastLocation>;
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn read_text(&self) -> Result<Option<String>>;
}

/// Geolocator for hosts without a device location API; always fails.
pub struct NoGeolocator;

#[async_trait]
impl Geolocator for NoGeolocator {
    async fn current_position(&self, _high_accuracy: bool) -> Result<LastLocation> {
        anyhow::bail!("device geolocation unavailable")
    }
}
