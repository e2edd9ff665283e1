use serde::{Deserialize, Serialize};

/// A plain map position in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Builds a coordinate only when both axes are real numbers.
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                Some(Self { lat, lng })
            }
            _ => None,
        }
    }
}

/// Last fix reported by the tracker, or a one-shot device fix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LastLocation {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub acc: Option<f64>,
    #[serde(default)]
    pub t: Option<i64>,
}

impl LastLocation {
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.lat, self.lng)
    }
}

/// User-pinned location that overrides GPS-driven centering while enabled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManualLocation {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub acc: Option<f64>,
}

impl ManualLocation {
    /// State assumed whenever the override cannot be read.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            lat: Some(0.0),
            lng: Some(0.0),
            acc: Some(0.0),
        }
    }

    /// The override position, present only when enabled with numeric coordinates.
    pub fn active_coordinate(&self) -> Option<Coordinate> {
        if !self.enabled {
            return None;
        }
        Coordinate::from_parts(self.lat, self.lng)
    }
}

impl Default for ManualLocation {
    fn default() -> Self {
        Self::disabled()
    }
}
