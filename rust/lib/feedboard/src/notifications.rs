//! Unread notification badge, owner of `notifications/unread`.

use std::sync::{Arc, Mutex};

use feedboard_flux::StateStore;
use tracing::debug;

use crate::error::{Severity, log_failure};
use crate::lock;
use crate::remote::SocialService;
use crate::session::SessionStore;
use crate::state::NotificationBadge;

pub struct NotificationCounter {
    service: Arc<dyn SocialService>,
    store: Arc<StateStore>,
    session: Arc<SessionStore>,
    inner: Mutex<BadgeInner>,
}

#[derive(Default)]
struct BadgeInner {
    unread: u64,
    version: u64,
}

impl NotificationCounter {
    pub fn new(
        service: Arc<dyn SocialService>,
        store: Arc<StateStore>,
        session: Arc<SessionStore>,
    ) -> Self {
        store.set(NotificationBadge::default());
        Self {
            service,
            store,
            session,
            inner: Mutex::new(BadgeInner::default()),
        }
    }

    pub fn unread(&self) -> u64 {
        lock(&self.inner).unread
    }

    /// Fetch the unread count once.
    ///
    /// A failed fetch keeps the previous count: a network blip must not
    /// reset a visible badge to zero.
    pub async fn refresh(&self) {
        let epoch = self.session.epoch();
        match self.service.unread_notification_count().await {
            Ok(count) => {
                let version = {
                    let mut inner = lock(&self.inner);
                    if !self.session.is_current(epoch) {
                        debug!("discarding unread count from an ended session");
                        return;
                    }
                    inner.unread = count;
                    inner.version += 1;
                    inner.version
                };
                self.store.set_versioned(NotificationBadge { unread: count }, version);
            }
            Err(e) => log_failure("refresh unread notifications", &e, Severity::Transient),
        }
    }

    /// Zero the badge at session teardown.
    pub fn reset(&self) {
        let version = {
            let mut inner = lock(&self.inner);
            inner.unread = 0;
            inner.version += 1;
            inner.version
        };
        self.store.set_versioned(NotificationBadge::default(), version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::remote::fake::{FakeSocialService, identity};

    fn counter(fake: FakeSocialService) -> (Arc<StateStore>, Arc<SessionStore>, NotificationCounter) {
        let fake = Arc::new(fake);
        let store = Arc::new(StateStore::new());
        let session = Arc::new(SessionStore::new(fake.clone(), store.clone()));
        let counter = NotificationCounter::new(fake, store.clone(), session.clone());
        (store, session, counter)
    }

    fn badge(store: &StateStore) -> u64 {
        store.get::<NotificationBadge>().unwrap().unread
    }

    #[tokio::test]
    async fn starts_at_zero() {
        let (store, _, counter) = counter(FakeSocialService::default());
        assert_eq!(counter.unread(), 0);
        assert_eq!(badge(&store), 0);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_count() {
        let fake = FakeSocialService::with_user(identity("u0", "ada", &[]), &[]);
        fake.push_unread(Ok(5));
        fake.push_unread(Err(()));
        let (store, _, counter) = counter(fake);

        counter.refresh().await;
        assert_eq!(badge(&store), 5);

        counter.refresh().await;
        assert_eq!(counter.unread(), 5);
        assert_eq!(badge(&store), 5);
    }

    #[tokio::test]
    async fn later_refresh_overwrites() {
        let fake = FakeSocialService::default();
        fake.push_unread(Ok(5));
        fake.push_unread(Ok(2));
        let (store, _, counter) = counter(fake);

        counter.refresh().await;
        counter.refresh().await;
        assert_eq!(badge(&store), 2);
    }

    #[tokio::test]
    async fn count_arriving_after_logout_is_discarded() {
        let fake = FakeSocialService::with_user(identity("u0", "ada", &[]), &[]);
        fake.push_unread(Ok(8));
        let gate = fake.unread_gates.add();
        let fake = Arc::new(fake);
        let store = Arc::new(StateStore::new());
        let session = Arc::new(SessionStore::new(fake.clone(), store.clone()));
        let counter = Arc::new(NotificationCounter::new(fake.clone(), store.clone(), session.clone()));

        let pending = tokio::spawn({
            let counter = counter.clone();
            async move { counter.refresh().await }
        });
        FakeSocialService::wait_for(&fake.calls.unread, 1).await;

        session.end_session();
        counter.reset();
        gate.send(()).unwrap();
        pending.await.unwrap();

        assert_eq!(counter.unread(), 0);
        assert_eq!(badge(&store), 0);
    }

    #[tokio::test]
    async fn reset_zeroes_badge() {
        let fake = FakeSocialService::default();
        fake.push_unread(Ok(9));
        let (store, session, counter) = counter(fake);

        counter.refresh().await;
        session.end_session();
        counter.reset();
        assert_eq!(badge(&store), 0);
    }
}
