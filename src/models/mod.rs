pub mod location;
pub mod memo;
pub mod route;
pub mod session;
pub mod viewport;

pub use location::{Coordinate, LastLocation, ManualLocation};
pub use memo::{sort_newest_first, MemoItem};
pub use route::{normalize_route, RawRoutePoint, RoutePoint};
pub use session::{SessionSlots, SessionSnapshot};
pub use viewport::MapViewport;
