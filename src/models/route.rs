use serde::{Deserialize, Serialize};

/// Route sample as delivered by the tracker; coordinates may be missing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawRoutePoint {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub t: Option<i64>,
    #[serde(default)]
    pub acc: Option<f64>,
}

/// One GPS sample of a session's path. Insertion order is chronological.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc: Option<f64>,
}

impl RoutePoint {
    pub fn new(lat: f64, lng: f64, t: Option<i64>) -> Self {
        Self {
            lat,
            lng,
            t,
            acc: None,
        }
    }

    /// Inclusive check against a `[start, end]` window; untimed points never match.
    pub fn within(&self, start_ms: i64, end_ms: i64) -> bool {
        matches!(self.t, Some(t) if t >= start_ms && t <= end_ms)
    }
}

impl TryFrom<RawRoutePoint> for RoutePoint {
    type Error = ();

    fn try_from(raw: RawRoutePoint) -> Result<Self, Self::Error> {
        match (raw.lat, raw.lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Ok(Self {
                lat,
                lng,
                t: raw.t,
                acc: raw.acc,
            }),
            _ => Err(()),
        }
    }
}

impl From<RoutePoint> for RawRoutePoint {
    fn from(point: RoutePoint) -> Self {
        Self {
            lat: Some(point.lat),
            lng: Some(point.lng),
            t: point.t,
            acc: point.acc,
        }
    }
}

/// Drops samples without numeric coordinates. Order and duplicates are kept.
pub fn normalize_route(raw: Vec<RawRoutePoint>) -> Vec<RoutePoint> {
    raw.into_iter()
        .filter_map(|point| RoutePoint::try_from(point).ok())
        .collect()
}
