use serde::{Deserialize, Serialize};

/// Last map zoom level and visible span, restored on the next launch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MapViewport {
    #[serde(default)]
    pub zoom: Option<f64>,
    #[serde(default)]
    pub lat_delta: Option<f64>,
    #[serde(default)]
    pub lng_delta: Option<f64>,
}

impl MapViewport {
    /// A viewport is worth restoring only if some field holds a positive number.
    pub fn is_usable(&self) -> bool {
        [self.zoom, self.lat_delta, self.lng_delta]
            .into_iter()
            .flatten()
            .any(|value| value.is_finite() && value > 0.0)
    }
}
