use std::sync::Arc;

use crate::{
    models::MapViewport,
    storage::{KeyValueStore, VIEWPORT_KEY},
};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Remembers the map zoom and span between launches. Best effort both ways.
#[derive(Clone)]
pub struct ViewportStore {
    store: Arc<dyn KeyValueStore>,
}

impl ViewportStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Option<MapViewport> {
        let raw = match self.store.get(VIEWPORT_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                log_debug!("viewport read failed: {err:#}");
                return None;
            }
        };
        serde_json::from_str::<MapViewport>(&raw)
            .ok()
            .filter(MapViewport::is_usable)
    }

    pub async fn save(&self, viewport: &MapViewport) {
        let serialized = match serde_json::to_string(viewport) {
            Ok(serialized) => serialized,
            Err(err) => {
                log_debug!("viewport serialization failed: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set(VIEWPORT_KEY, &serialized).await {
            log_debug!("viewport write failed: {err:#}");
        }
    }
}
