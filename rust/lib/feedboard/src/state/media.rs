//! Profile image editor state, stored at `media/draft`.

use feedboard_flux::State;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaPhase {
    Idle,
    Selected,
    Uploading,
    Committed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDraftState {
    pub phase: MediaPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_data_url: Option<String>,
    /// Bumped whenever the file picker must be reset, so picking the
    /// same file again registers as a new selection.
    pub picker_generation: u64,
}

impl State for MediaDraftState {
    const PATH: &'static str = "media/draft";
}

impl MediaDraftState {
    pub fn idle(picker_generation: u64) -> Self {
        Self {
            phase: MediaPhase::Idle,
            file_name: None,
            preview_data_url: None,
            picker_generation,
        }
    }

    pub fn has_draft(&self) -> bool {
        self.preview_data_url.is_some()
    }
}
