//! Followed-user summaries, owner of `graph/following`.
//!
//! The list is derived from the user directory filtered by the identity's
//! following set. Any membership change re-derives the whole list, except
//! that following an already-cached id fetches nothing and unfollowing
//! removes one entry in place.
//!
//! Directory fetches are not deduplicated, so responses can resolve out of
//! order. Each response is filtered against the following set as it is
//! *when the response lands*, and a response older than the last applied
//! one is dropped. The cached ids are therefore always a subset of the
//! current following set.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use feedboard_flux::StateStore;
use tracing::debug;

use crate::error::{Severity, log_failure};
use crate::lock;
use crate::model::FollowedUserSummary;
use crate::remote::SocialService;
use crate::session::SessionStore;
use crate::state::FollowingList;

pub struct SocialGraphCache {
    service: Arc<dyn SocialService>,
    store: Arc<StateStore>,
    session: Arc<SessionStore>,
    inner: Mutex<GraphInner>,
}

#[derive(Default)]
struct GraphInner {
    items: Vec<FollowedUserSummary>,
    /// Ticket of the most recently issued directory fetch.
    issued: u64,
    /// Ticket of the most recently applied directory response.
    applied: u64,
    /// Bumped per published snapshot.
    version: u64,
}

impl SocialGraphCache {
    pub fn new(
        service: Arc<dyn SocialService>,
        store: Arc<StateStore>,
        session: Arc<SessionStore>,
    ) -> Self {
        store.set(FollowingList::default());
        Self {
            service,
            store,
            session,
            inner: Mutex::new(GraphInner::default()),
        }
    }

    pub fn summaries(&self) -> Vec<FollowedUserSummary> {
        lock(&self.inner).items.clone()
    }

    pub fn is_cached(&self, user_id: &str) -> bool {
        lock(&self.inner).items.iter().any(|u| u.id == user_id)
    }

    /// Re-derive the list for `following`.
    ///
    /// An empty set clears the cache without fetching. Otherwise the full
    /// directory is fetched; on failure the cache is left as it was.
    pub async fn sync_to_following(&self, following: &BTreeSet<String>) {
        if following.is_empty() {
            self.clear();
            return;
        }

        let epoch = self.session.epoch();
        let ticket = {
            let mut inner = lock(&self.inner);
            inner.issued += 1;
            inner.issued
        };
        debug!(ticket, "fetching user directory");

        match self.service.list_all_users().await {
            Ok(users) => self.apply(ticket, epoch, users),
            Err(e) => log_failure("fetch user directory", &e, Severity::Transient),
        }
    }

    /// React to a newly followed id. Fetches only if it isn't cached yet.
    pub async fn on_followed(&self, user_id: &str) {
        if self.is_cached(user_id) {
            debug!(user_id, "followed user already cached");
            return;
        }
        let Some(following) = self.session.following() else {
            return;
        };
        self.sync_to_following(&following).await;
    }

    /// React to an unfollow by dropping the entry in place.
    pub fn on_unfollowed(&self, user_id: &str) {
        let update = {
            let mut inner = lock(&self.inner);
            let before = inner.items.len();
            inner.items.retain(|u| u.id != user_id);
            if inner.items.len() == before {
                return;
            }
            Self::stage(&mut inner)
        };
        self.publish(update);
    }

    /// Empty the cache and invalidate in-flight fetches.
    pub fn clear(&self) {
        let update = {
            let mut inner = lock(&self.inner);
            inner.applied = inner.issued;
            inner.items.clear();
            Self::stage(&mut inner)
        };
        self.publish(update);
    }

    // Lock order: graph, then session. The session never calls out while
    // holding its own lock.
    fn apply(&self, ticket: u64, epoch: u64, users: Vec<FollowedUserSummary>) {
        let update = {
            let mut inner = lock(&self.inner);
            if !self.session.is_current(epoch) {
                debug!(ticket, "discarding directory from an ended session");
                return;
            }
            if ticket <= inner.applied {
                debug!(ticket, applied = inner.applied, "discarding stale directory");
                return;
            }
            // Membership as of now, not as of when the fetch was issued.
            let Some(following) = self.session.following() else {
                debug!(ticket, "discarding directory without an identity");
                return;
            };

            let mut seen = HashSet::new();
            inner.items = users
                .into_iter()
                .filter(|u| following.contains(&u.id) && seen.insert(u.id.clone()))
                .collect();
            inner.applied = ticket;
            debug!(ticket, count = inner.items.len(), "following list updated");
            Self::stage(&mut inner)
        };
        self.publish(update);
    }

    fn stage(inner: &mut GraphInner) -> (FollowingList, u64) {
        inner.version += 1;
        let list = FollowingList {
            items: inner.items.clone(),
        };
        (list, inner.version)
    }

    fn publish(&self, (list, version): (FollowingList, u64)) {
        self.store.set_versioned(list, version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::remote::fake::{FakeSocialService, identity, summary};

    struct Harness {
        fake: Arc<FakeSocialService>,
        store: Arc<StateStore>,
        session: Arc<SessionStore>,
        graph: Arc<SocialGraphCache>,
    }

    async fn harness(following: &[&str], directory: &[&str]) -> Harness {
        let fake = Arc::new(FakeSocialService::with_user(
            identity("u0", "ada", following),
            directory,
        ));
        let store = Arc::new(StateStore::new());
        let session = Arc::new(SessionStore::new(fake.clone(), store.clone()));
        session.load().await;
        let graph = Arc::new(SocialGraphCache::new(fake.clone(), store.clone(), session.clone()));
        Harness { fake, store, session, graph }
    }

    fn ids(store: &StateStore) -> Vec<String> {
        store
            .get::<FollowingList>()
            .unwrap()
            .items
            .iter()
            .map(|u| u.id.clone())
            .collect()
    }

    fn directory_calls(h: &Harness) -> usize {
        h.fake.calls.directory.load(Ordering::SeqCst)
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    // ========================================================================
    // sync_to_following
    // ========================================================================

    #[tokio::test]
    async fn empty_following_clears_without_fetch() {
        let h = harness(&[], &["u1", "u2"]).await;
        h.graph.sync_to_following(&BTreeSet::new()).await;
        assert!(ids(&h.store).is_empty());
        assert_eq!(directory_calls(&h), 0);
    }

    #[tokio::test]
    async fn sync_filters_directory_by_following() {
        let h = harness(&["u1", "u3"], &["u1", "u2", "u3", "u4"]).await;
        h.graph.sync_to_following(&set(&["u1", "u3"])).await;
        assert_eq!(ids(&h.store), vec!["u1", "u3"]);
        assert_eq!(directory_calls(&h), 1);
    }

    #[tokio::test]
    async fn followed_ids_missing_from_directory_are_absent() {
        let h = harness(&["u1", "ghost"], &["u1"]).await;
        h.graph.sync_to_following(&set(&["u1", "ghost"])).await;
        assert_eq!(ids(&h.store), vec!["u1"]);
    }

    #[tokio::test]
    async fn duplicate_directory_entries_collapse() {
        let h = harness(&["u1"], &["u1"]).await;
        h.fake.directory.lock().unwrap().push(summary("u1"));
        h.graph.sync_to_following(&set(&["u1"])).await;
        assert_eq!(ids(&h.store), vec!["u1"]);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_cache() {
        let h = harness(&["u1"], &["u1"]).await;
        h.graph.sync_to_following(&set(&["u1"])).await;

        h.fake.fail_directory.store(true, Ordering::SeqCst);
        h.session.add_following("u2");
        h.graph.on_followed("u2").await;

        assert_eq!(ids(&h.store), vec!["u1"]);
        assert_eq!(directory_calls(&h), 2);
    }

    // ========================================================================
    // on_followed / on_unfollowed
    // ========================================================================

    #[tokio::test]
    async fn on_followed_skips_fetch_when_cached() {
        let h = harness(&["u1", "u2"], &["u1", "u2"]).await;
        h.graph.sync_to_following(&set(&["u1", "u2"])).await;
        assert_eq!(directory_calls(&h), 1);

        h.graph.on_followed("u2").await;
        assert_eq!(directory_calls(&h), 1);
    }

    #[tokio::test]
    async fn on_followed_fetches_when_missing() {
        let h = harness(&["u1"], &["u1", "u2"]).await;
        h.graph.sync_to_following(&set(&["u1"])).await;

        h.session.add_following("u2");
        h.graph.on_followed("u2").await;

        assert_eq!(directory_calls(&h), 2);
        assert_eq!(ids(&h.store), vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn on_unfollowed_removes_without_fetch() {
        let h = harness(&["u1", "u2"], &["u1", "u2"]).await;
        h.graph.sync_to_following(&set(&["u1", "u2"])).await;

        h.session.remove_following("u1");
        h.graph.on_unfollowed("u1");

        assert_eq!(ids(&h.store), vec!["u2"]);
        assert_eq!(directory_calls(&h), 1);
    }

    // ========================================================================
    // Out-of-order responses
    // ========================================================================

    #[tokio::test]
    async fn response_is_refiltered_against_current_following() {
        let h = harness(&["u1", "u2"], &["u1", "u2"]).await;
        let gate = h.fake.directory_gates.add();

        let sync = tokio::spawn({
            let graph = h.graph.clone();
            async move { graph.sync_to_following(&set(&["u1", "u2"])).await }
        });
        FakeSocialService::wait_for(&h.fake.calls.directory, 1).await;

        // u1 is unfollowed while the fetch is in flight.
        h.session.remove_following("u1");
        h.graph.on_unfollowed("u1");
        gate.send(()).unwrap();
        sync.await.unwrap();

        assert_eq!(ids(&h.store), vec!["u2"]);
    }

    #[tokio::test]
    async fn older_response_does_not_overwrite_newer() {
        let h = harness(&[], &["u1", "u2"]).await;
        let first = h.fake.directory_gates.add();
        let second = h.fake.directory_gates.add();

        h.session.add_following("u1");
        let a = tokio::spawn({
            let graph = h.graph.clone();
            async move { graph.on_followed("u1").await }
        });
        FakeSocialService::wait_for(&h.fake.calls.directory, 1).await;

        h.session.add_following("u2");
        let b = tokio::spawn({
            let graph = h.graph.clone();
            async move { graph.on_followed("u2").await }
        });
        FakeSocialService::wait_for(&h.fake.calls.directory, 2).await;

        // Newer response lands first, then the older one.
        second.send(()).unwrap();
        b.await.unwrap();
        assert_eq!(ids(&h.store), vec!["u1", "u2"]);

        h.session.remove_following("u2");
        h.graph.on_unfollowed("u2");
        first.send(()).unwrap();
        a.await.unwrap();

        assert_eq!(ids(&h.store), vec!["u1"]);
    }

    #[tokio::test]
    async fn stale_response_cannot_resurrect_unfollowed_user() {
        let h = harness(&[], &["u1"]).await;
        let gate = h.fake.directory_gates.add();

        h.session.add_following("u1");
        let pending = tokio::spawn({
            let graph = h.graph.clone();
            async move { graph.on_followed("u1").await }
        });
        FakeSocialService::wait_for(&h.fake.calls.directory, 1).await;

        h.session.remove_following("u1");
        h.graph.on_unfollowed("u1");
        gate.send(()).unwrap();
        pending.await.unwrap();

        assert!(ids(&h.store).is_empty());
    }

    #[tokio::test]
    async fn response_after_session_end_is_dropped() {
        let h = harness(&["u1"], &["u1"]).await;
        let gate = h.fake.directory_gates.add();

        let pending = tokio::spawn({
            let graph = h.graph.clone();
            async move { graph.sync_to_following(&set(&["u1"])).await }
        });
        FakeSocialService::wait_for(&h.fake.calls.directory, 1).await;

        h.session.end_session();
        h.graph.clear();
        gate.send(()).unwrap();
        pending.await.unwrap();

        assert!(ids(&h.store).is_empty());
        assert!(h.graph.summaries().is_empty());
    }

    #[tokio::test]
    async fn empty_sync_invalidates_in_flight_fetch() {
        let h = harness(&["u1"], &["u1"]).await;
        let gate = h.fake.directory_gates.add();

        let pending = tokio::spawn({
            let graph = h.graph.clone();
            async move { graph.sync_to_following(&set(&["u1"])).await }
        });
        FakeSocialService::wait_for(&h.fake.calls.directory, 1).await;

        h.graph.sync_to_following(&BTreeSet::new()).await;
        gate.send(()).unwrap();
        pending.await.unwrap();

        assert!(ids(&h.store).is_empty());
    }

    #[tokio::test]
    async fn cache_is_always_subset_of_following() {
        let h = harness(&[], &["u1", "u2", "u3", "u4"]).await;
        let script: &[(&str, bool)] = &[
            ("u1", true),
            ("u2", true),
            ("u1", false),
            ("u3", true),
            ("u2", false),
            ("u4", true),
            ("u3", false),
        ];
        for &(id, follow) in script {
            if follow {
                h.session.add_following(id);
                h.graph.on_followed(id).await;
            } else {
                h.session.remove_following(id);
                h.graph.on_unfollowed(id);
            }
            let following = h.session.following().unwrap();
            for cached in ids(&h.store) {
                assert!(following.contains(&cached), "{} cached but not followed", cached);
            }
        }
        assert_eq!(ids(&h.store), vec!["u4"]);
    }
}
