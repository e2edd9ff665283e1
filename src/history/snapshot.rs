use crate::models::{normalize_route, MemoItem, RawRoutePoint, RoutePoint, SessionSnapshot};

/// Fewest points a route needs before it is worth keeping.
const MIN_ROUTE_POINTS: usize = 2;

/// Assembles the history record for a session that just ended.
///
/// Memos are kept only if they carry the ended session's id; an anonymous
/// session keeps none. The route comes from the persisted log, narrowed to
/// `[started_at, ended_at]` when that still leaves at least two points. If the
/// result is shorter than two points, the live route cached during the session
/// is used instead, provided it has at least two points.
pub fn build_snapshot(
    session_id: Option<&str>,
    started_at: Option<i64>,
    ended_at: i64,
    all_memos: &[MemoItem],
    route_log: Vec<RawRoutePoint>,
    live_route: &[RoutePoint],
) -> SessionSnapshot {
    let memos = match session_id {
        Some(id) => all_memos
            .iter()
            .filter(|memo| memo.belongs_to(id))
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    let mut route = normalize_route(route_log);
    if let Some(start) = started_at {
        let windowed: Vec<RoutePoint> = route
            .iter()
            .copied()
            .filter(|point| point.within(start, ended_at))
            .collect();
        if windowed.len() >= MIN_ROUTE_POINTS {
            route = windowed;
        }
    }
    // TODO: confirm with product whether a short persisted log should really
    // defer to the live cache; it can hide untimed points in the native log.
    if route.len() < MIN_ROUTE_POINTS && live_route.len() >= MIN_ROUTE_POINTS {
        route = live_route.to_vec();
    }

    SessionSnapshot {
        session_id: session_id.map(str::to_string),
        started_at,
        ended_at,
        memos,
        route,
    }
}
