use serde::Serialize;

pub const STATUS_IDLE: &str = "Ready";
pub const STATUS_STARTING: &str = "Starting session";
pub const STATUS_TRACKING: &str = "Tracking";
pub const STATUS_STOPPING: &str = "Stopping session";
pub const STATUS_SAVING: &str = "Saving memo";

/// Session lifecycle. There is deliberately no paused state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase", tag = "phase")]
pub enum SessionPhase {
    #[default]
    Idle,
    #[serde(rename_all = "camelCase")]
    Active { session_id: String, started_at: i64 },
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::Active { .. })
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionPhase::Active { session_id, .. } => Some(session_id),
            SessionPhase::Idle => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ControllerState {
    pub(crate) phase: SessionPhase,
    pub(crate) status: String,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            status: STATUS_IDLE.to_string(),
        }
    }
}
