//! Session identity, owner of `session/state`.
//!
//! The identity snapshot is loaded once, then mutated only by follow
//! changes and profile picture commits. Logging out bumps the session
//! epoch; responses that were requested under an older epoch are dropped
//! by every component instead of being applied to the next session.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use feedboard_flux::StateStore;
use tracing::{debug, info};

use crate::error::{Severity, log_failure};
use crate::lock;
use crate::model::Identity;
use crate::remote::SocialService;
use crate::state::{SessionPhase, SessionState};

pub struct SessionStore {
    service: Arc<dyn SocialService>,
    store: Arc<StateStore>,
    inner: Mutex<SessionInner>,
    epoch: AtomicU64,
}

struct SessionInner {
    phase: SessionPhase,
    identity: Option<Identity>,
    /// Bumped per published snapshot.
    version: u64,
}

impl SessionStore {
    /// Create an unloaded session and publish the loading view.
    pub fn new(service: Arc<dyn SocialService>, store: Arc<StateStore>) -> Self {
        let session = Self {
            service,
            store,
            inner: Mutex::new(SessionInner {
                phase: SessionPhase::Loading,
                identity: None,
                version: 0,
            }),
            epoch: AtomicU64::new(0),
        };
        session.store.set(SessionState::loading());
        session
    }

    /// Current session epoch. Changes only when a session ends.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// True if nothing ended the session since `epoch` was read.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    /// Fetch the identity and publish it.
    ///
    /// Any failure leaves the session anonymous with `loading = false`;
    /// the caller gets `None` and renders the empty view.
    pub async fn load(&self) -> Option<Identity> {
        let epoch = self.epoch();
        let update = {
            let mut inner = lock(&self.inner);
            inner.phase = SessionPhase::Loading;
            Self::stage(&mut inner)
        };
        self.publish(update);

        let result = self.service.current_identity().await;

        let (identity, update) = {
            let mut inner = lock(&self.inner);
            if !self.is_current(epoch) {
                debug!("discarding identity that arrived after logout");
                return None;
            }
            match result {
                Ok(identity) => {
                    info!(user = %identity.username, "session identity loaded");
                    inner.phase = SessionPhase::Authenticated;
                    inner.identity = Some(identity);
                }
                Err(e) if e.is_auth() => {
                    info!("no active session: {}", e);
                    inner.phase = SessionPhase::Anonymous;
                    inner.identity = None;
                }
                Err(e) => {
                    log_failure("load identity", &e, Severity::SilentDegradation);
                    inner.phase = SessionPhase::Anonymous;
                    inner.identity = None;
                }
            }
            (inner.identity.clone(), Self::stage(&mut inner))
        };
        self.publish(update);
        identity
    }

    pub fn identity(&self) -> Option<Identity> {
        lock(&self.inner).identity.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        lock(&self.inner).phase
    }

    /// Ids the session user follows, or `None` without an identity.
    pub fn following(&self) -> Option<BTreeSet<String>> {
        lock(&self.inner).identity.as_ref().map(|i| i.following.clone())
    }

    pub fn follows(&self, user_id: &str) -> bool {
        lock(&self.inner)
            .identity
            .as_ref()
            .is_some_and(|i| i.follows(user_id))
    }

    /// Add `user_id` to the following set. Returns false if there is no
    /// identity or the id was already present.
    pub fn add_following(&self, user_id: &str) -> bool {
        self.mutate(|identity| identity.following.insert(user_id.to_string()))
    }

    /// Remove `user_id` from the following set. Returns false if there is
    /// no identity or the id was absent.
    pub fn remove_following(&self, user_id: &str) -> bool {
        self.mutate(|identity| identity.following.remove(user_id))
    }

    /// Replace the profile picture after a confirmed upload.
    pub fn set_profile_img(&self, url: String) -> bool {
        self.mutate(|identity| {
            identity.profile_img = Some(url);
            true
        })
    }

    /// End the session locally: clear identity, bump the epoch and publish
    /// the logged-out view. Never fails.
    pub fn end_session(&self) {
        let update = {
            let mut inner = lock(&self.inner);
            self.epoch.fetch_add(1, Ordering::SeqCst);
            inner.phase = SessionPhase::LoggedOut;
            inner.identity = None;
            Self::stage(&mut inner)
        };
        self.publish(update);
        info!("session ended");
    }

    /// Ask the service to terminate the session. Failures are logged only.
    pub async fn terminate_remote(&self) {
        if let Err(e) = self.service.logout().await {
            log_failure("logout", &e, Severity::Transient);
        }
    }

    /// End the session locally, then remotely on a best-effort basis.
    pub async fn logout(&self) {
        self.end_session();
        self.terminate_remote().await;
    }

    fn mutate(&self, f: impl FnOnce(&mut Identity) -> bool) -> bool {
        let update = {
            let mut inner = lock(&self.inner);
            let changed = match inner.identity.as_mut() {
                Some(identity) => f(identity),
                None => false,
            };
            if !changed {
                return false;
            }
            Self::stage(&mut inner)
        };
        self.publish(update);
        true
    }

    /// Snapshot the state under the lock. Publishing happens after the
    /// lock is released, since subscribers may call back into the session.
    fn stage(inner: &mut SessionInner) -> (SessionState, u64) {
        inner.version += 1;
        let state = SessionState {
            phase: inner.phase,
            identity: inner.identity.clone(),
            loading: inner.phase == SessionPhase::Loading,
        };
        (state, inner.version)
    }

    fn publish(&self, (state, version): (SessionState, u64)) {
        self.store.set_versioned(state, version);
    }
}
