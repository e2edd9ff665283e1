use serde::{Deserialize, Serialize};

use super::location::Coordinate;

/// A text note captured during a ride, tagged with where and when it was saved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemoItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc_t: Option<i64>,
}

impl MemoItem {
    /// Save time used for ordering; a missing timestamp sorts as the epoch.
    pub fn saved_at_or_zero(&self) -> i64 {
        self.saved_at.unwrap_or(0)
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.lat, self.lng)
    }

    pub fn belongs_to(&self, session_id: &str) -> bool {
        self.session_id.as_deref() == Some(session_id)
    }
}

/// Newest first. The sort is stable so equal timestamps keep tracker order.
pub fn sort_newest_first(memos: &mut [MemoItem]) {
    memos.sort_by(|a, b| b.saved_at_or_zero().cmp(&a.saved_at_or_zero()));
}
