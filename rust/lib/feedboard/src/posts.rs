//! Authored post counter, owner of `posts/count`.
//!
//! Seeded once from the service, then adjusted by local create/delete
//! events only. It is never reconciled with the server afterwards, so it
//! can drift if posts change through another client.

use std::sync::{Arc, Mutex};

use feedboard_flux::StateStore;
use tracing::debug;

use crate::error::{Severity, log_failure};
use crate::lock;
use crate::remote::SocialService;
use crate::session::SessionStore;
use crate::state::PostCount;

pub struct PostCountTracker {
    service: Arc<dyn SocialService>,
    store: Arc<StateStore>,
    session: Arc<SessionStore>,
    inner: Mutex<PostInner>,
}

#[derive(Default)]
struct PostInner {
    count: u64,
    initialized: bool,
    version: u64,
}

impl PostCountTracker {
    pub fn new(
        service: Arc<dyn SocialService>,
        store: Arc<StateStore>,
        session: Arc<SessionStore>,
    ) -> Self {
        store.set(PostCount::default());
        Self {
            service,
            store,
            session,
            inner: Mutex::new(PostInner::default()),
        }
    }

    pub fn count(&self) -> u64 {
        lock(&self.inner).count
    }

    /// Set the absolute baseline. Only the first call per session counts;
    /// returns whether this call set it.
    pub fn initialize(&self, count: u64) -> bool {
        let update = {
            let mut inner = lock(&self.inner);
            if inner.initialized {
                debug!(count, "post baseline already set");
                return false;
            }
            inner.initialized = true;
            inner.count = count;
            Self::stage(&mut inner)
        };
        self.publish(update);
        true
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.inner).initialized
    }

    /// Seed the baseline from the user's post list. Falls back to zero if
    /// the fetch fails.
    pub async fn load_baseline(&self, username: &str) {
        let epoch = self.session.epoch();
        let count = match self.service.user_posts(username).await {
            Ok(posts) => posts.len() as u64,
            Err(e) => {
                log_failure("fetch post count", &e, Severity::SilentDegradation);
                0
            }
        };
        if !self.session.is_current(epoch) {
            debug!("discarding post count from an ended session");
            return;
        }
        self.initialize(count);
    }

    pub fn on_post_created(&self) {
        self.update(|inner| inner.count += 1);
    }

    /// Decrement, flooring at zero.
    pub fn on_post_deleted(&self) {
        self.update(|inner| inner.count = inner.count.saturating_sub(1));
    }

    /// Forget the baseline at session teardown.
    pub fn reset(&self) {
        self.update(|inner| {
            inner.count = 0;
            inner.initialized = false;
        });
    }

    fn update(&self, f: impl FnOnce(&mut PostInner)) {
        let update = {
            let mut inner = lock(&self.inner);
            f(&mut inner);
            Self::stage(&mut inner)
        };
        self.publish(update);
    }

    fn stage(inner: &mut PostInner) -> (PostCount, u64) {
        inner.version += 1;
        (PostCount { count: inner.count }, inner.version)
    }

    fn publish(&self, (count, version): (PostCount, u64)) {
        self.store.set_versioned(count, version);
    }
}
