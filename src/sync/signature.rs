//! Cheap fingerprints used to skip republishing unchanged collections.

use crate::models::{MemoItem, RoutePoint};

/// Count plus newest and oldest save time of a newest-first memo list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoSignature {
    count: usize,
    newest: i64,
    oldest: i64,
}

impl MemoSignature {
    /// `memos` must already be sorted newest first.
    pub fn of(memos: &[MemoItem]) -> Self {
        Self {
            count: memos.len(),
            newest: memos.first().map(MemoItem::saved_at_or_zero).unwrap_or(0),
            oldest: memos.last().map(MemoItem::saved_at_or_zero).unwrap_or(0),
        }
    }
}

/// Count plus a fingerprint of the last point: lat/lng at 6 decimals and `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSignature {
    count: usize,
    last: Option<(i64, i64, Option<i64>)>,
}

fn micro_degrees(value: f64) -> i64 {
    (value * 1e6).round() as i64
}

impl RouteSignature {
    pub fn of(route: &[RoutePoint]) -> Self {
        Self {
            count: route.len(),
            last: route
                .last()
                .map(|p| (micro_degrees(p.lat), micro_degrees(p.lng), p.t)),
        }
    }
}
