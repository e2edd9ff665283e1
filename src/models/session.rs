//! Session history records.
//!
//! A `SessionSnapshot` is written once, when a session stops, and never
//! changes afterwards. `SessionSlots` keeps the three most recent ones,
//! newest in `slot1`.

use serde::{Deserialize, Serialize};

use super::{memo::MemoItem, route::RoutePoint};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub started_at: Option<i64>,
    pub ended_at: i64,
    #[serde(default)]
    pub memos: Vec<MemoItem>,
    #[serde(default)]
    pub route: Vec<RoutePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionSlots {
    #[serde(default)]
    pub slot1: Option<SessionSnapshot>,
    #[serde(default)]
    pub slot2: Option<SessionSnapshot>,
    #[serde(default)]
    pub slot3: Option<SessionSnapshot>,
}

impl SessionSlots {
    pub const CAPACITY: usize = 3;

    /// Shifts every snapshot one slot older and places `latest` in `slot1`.
    /// Whatever occupied `slot3` is discarded.
    pub fn rotate(self, latest: SessionSnapshot) -> Self {
        Self {
            slot1: Some(latest),
            slot2: self.slot1,
            slot3: self.slot2,
        }
    }

    /// Occupied slots, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &SessionSnapshot> {
        [&self.slot1, &self.slot2, &self.slot3]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
