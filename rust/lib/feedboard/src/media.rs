//! Profile picture editor, owner of `media/draft`.
//!
//! ```text
//! Idle ──select──▶ Selected ──commit──▶ Uploading ──▶ Committed
//!   ▲                │  ▲                   │
//!   └──── cancel ────┘  └──── commit ─── Failed
//! ```
//!
//! Non-image selections are ignored without an error. A failed upload keeps
//! the draft so `commit` can be retried without selecting again.

use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use feedboard_flux::StateStore;
use tracing::{debug, info, warn};

use crate::error::{Severity, log_failure};
use crate::lock;
use crate::model::MediaFile;
use crate::remote::SocialService;
use crate::session::SessionStore;
use crate::state::{Alert, MediaDraftState, MediaPhase};

pub const MSG_NO_DRAFT: &str = "Please select an image first";
pub const MSG_UPLOAD_OK: &str = "Profile picture updated successfully!";
pub const MSG_UPLOAD_FAILED: &str = "Error updating profile picture. Please try again.";

/// What a call to [`ProfileMediaPipeline::commit`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Uploaded; carries the new image URL.
    Committed(String),
    /// Upload failed; the draft is kept for a retry.
    Failed,
    /// Nothing selected; a validation alert was raised.
    NoDraft,
    /// An upload is already running.
    Busy,
    /// The session ended while uploading; the result was dropped.
    Discarded,
}

struct Draft {
    file: MediaFile,
    preview_data_url: String,
}

struct MediaInner {
    phase: MediaPhase,
    draft: Option<Draft>,
    /// Bumped per selection and on cancel; a preview finishing under an
    /// older value has been superseded.
    selection: u64,
    picker_generation: u64,
    /// Bumped per published snapshot.
    version: u64,
}

pub struct ProfileMediaPipeline {
    service: Arc<dyn SocialService>,
    store: Arc<StateStore>,
    session: Arc<SessionStore>,
    inner: Mutex<MediaInner>,
}

/// Encode a file as a `data:` URL for previewing.
pub fn preview_data_url(file: &MediaFile) -> String {
    format!("data:{};base64,{}", file.content_type, STANDARD.encode(&file.bytes))
}

impl ProfileMediaPipeline {
    pub fn new(
        service: Arc<dyn SocialService>,
        store: Arc<StateStore>,
        session: Arc<SessionStore>,
    ) -> Self {
        store.set(MediaDraftState::idle(0));
        Self {
            service,
            store,
            session,
            inner: Mutex::new(MediaInner {
                phase: MediaPhase::Idle,
                draft: None,
                selection: 0,
                picker_generation: 0,
                version: 0,
            }),
        }
    }

    pub fn phase(&self) -> MediaPhase {
        lock(&self.inner).phase
    }

    pub fn state(&self) -> MediaDraftState {
        Self::snapshot(&lock(&self.inner))
    }

    /// Select a file. Returns whether it became the current draft.
    ///
    /// Non-image files are ignored. The preview is encoded on the blocking
    /// pool; if another selection or a cancel happens meanwhile, this one
    /// is dropped.
    pub async fn select(&self, file: MediaFile) -> bool {
        if !file.is_image() {
            debug!(name = %file.name, content_type = %file.content_type, "ignoring non-image selection");
            return false;
        }
        let selection = {
            let mut inner = lock(&self.inner);
            if inner.phase == MediaPhase::Uploading {
                debug!("ignoring selection during upload");
                return false;
            }
            inner.selection += 1;
            inner.selection
        };

        let encoded = tokio::task::spawn_blocking(move || {
            let preview = preview_data_url(&file);
            (file, preview)
        })
        .await;
        let (file, preview_data_url) = match encoded {
            Ok(pair) => pair,
            Err(e) => {
                warn!("preview encoding failed: {}", e);
                return false;
            }
        };

        let update = {
            let mut inner = lock(&self.inner);
            if inner.selection != selection || inner.phase == MediaPhase::Uploading {
                debug!(selection, "selection superseded before preview finished");
                return false;
            }
            inner.draft = Some(Draft { file, preview_data_url });
            inner.phase = MediaPhase::Selected;
            Self::stage(&mut inner)
        };
        self.publish(update);
        true
    }

    /// Upload the draft and, on success, make it the profile picture.
    pub async fn commit(&self) -> CommitOutcome {
        let staged = {
            let mut inner = lock(&self.inner);
            if inner.phase == MediaPhase::Uploading {
                return CommitOutcome::Busy;
            }
            let file = inner.draft.as_ref().map(|d| d.file.clone());
            file.map(|file| {
                inner.phase = MediaPhase::Uploading;
                (file, Self::stage(&mut inner))
            })
        };
        let Some((file, update)) = staged else {
            self.store.set(Alert::error(MSG_NO_DRAFT));
            return CommitOutcome::NoDraft;
        };
        self.publish(update);

        let epoch = self.session.epoch();
        info!(name = %file.name, bytes = file.bytes.len(), "uploading profile picture");
        let result = self.service.upload_profile_image(&file).await;

        if !self.session.is_current(epoch) {
            debug!("discarding upload result from an ended session");
            return CommitOutcome::Discarded;
        }

        match result {
            Ok(uploaded) => {
                self.session.set_profile_img(uploaded.image_url.clone());
                let update = {
                    let mut inner = lock(&self.inner);
                    inner.draft = None;
                    inner.phase = MediaPhase::Committed;
                    inner.picker_generation += 1;
                    Self::stage(&mut inner)
                };
                self.publish(update);
                self.store.set(Alert::info(MSG_UPLOAD_OK));
                CommitOutcome::Committed(uploaded.image_url)
            }
            Err(e) => {
                log_failure("upload profile picture", &e, Severity::UserVisible);
                let update = {
                    let mut inner = lock(&self.inner);
                    inner.phase = MediaPhase::Failed;
                    Self::stage(&mut inner)
                };
                self.publish(update);
                self.store.set(Alert::error(MSG_UPLOAD_FAILED));
                CommitOutcome::Failed
            }
        }
    }

    /// Drop the draft and reset the file picker. Only valid from
    /// `Selected` or `Failed`; returns whether anything happened.
    pub fn cancel(&self) -> bool {
        let update = {
            let mut inner = lock(&self.inner);
            if !matches!(inner.phase, MediaPhase::Selected | MediaPhase::Failed) {
                return false;
            }
            Self::clear(&mut inner);
            Self::stage(&mut inner)
        };
        self.publish(update);
        true
    }

    /// Return to `Idle` unconditionally at session teardown.
    pub fn reset(&self) {
        let update = {
            let mut inner = lock(&self.inner);
            Self::clear(&mut inner);
            Self::stage(&mut inner)
        };
        self.publish(update);
    }

    fn clear(inner: &mut MediaInner) {
        inner.draft = None;
        inner.phase = MediaPhase::Idle;
        inner.selection += 1;
        inner.picker_generation += 1;
    }

    fn snapshot(inner: &MediaInner) -> MediaDraftState {
        MediaDraftState {
            phase: inner.phase,
            file_name: inner.draft.as_ref().map(|d| d.file.name.clone()),
            preview_data_url: inner.draft.as_ref().map(|d| d.preview_data_url.clone()),
            picker_generation: inner.picker_generation,
        }
    }

    // Subscribers may call back into the dashboard, so the store is only
    // written after the lock is released.
    fn stage(inner: &mut MediaInner) -> (MediaDraftState, u64) {
        inner.version += 1;
        (Self::snapshot(inner), inner.version)
    }

    fn publish(&self, (state, version): (MediaDraftState, u64)) {
        self.store.set_versioned(state, version);
    }
}
