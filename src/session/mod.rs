pub mod controller;
pub mod state;

pub use controller::SessionController;
pub use state::SessionPhase;

/// Message shown to the user when an action they started fails.
pub fn describe_failure(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
