pub mod snapshot;
pub mod store;

pub use snapshot::build_snapshot;
pub use store::{EndedSession, SessionHistory};
