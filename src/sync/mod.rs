pub mod center;
pub mod poller;
pub mod signature;
pub mod synchronizer;

pub use center::CenterPolicy;
pub use poller::poll_loop;
pub use synchronizer::{AppLifecycle, SessionSynchronizer, SyncEvent, SyncSnapshot};
