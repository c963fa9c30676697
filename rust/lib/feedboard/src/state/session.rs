//! Session state, stored at `session/state`.

use feedboard_flux::State;
use serde::Serialize;

use crate::model::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Initial identity fetch in flight.
    Loading,
    Authenticated,
    /// Identity fetch failed; render the empty view.
    Anonymous,
    LoggedOut,
}

/// Who the session user is, as far as the dashboard knows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub phase: SessionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    pub loading: bool,
}

impl State for SessionState {
    const PATH: &'static str = "session/state";
}

impl SessionState {
    pub fn loading() -> Self {
        Self {
            phase: SessionPhase::Loading,
            identity: None,
            loading: true,
        }
    }
}
