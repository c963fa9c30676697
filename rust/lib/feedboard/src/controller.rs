//! Dashboard controller.
//!
//! Composes the session, notification, graph, post and media components
//! over one [`StateStore`]. It is the only place that reacts to user
//! actions, and the only place that touches more than one component.

use std::sync::Arc;
use std::time::Duration;

use feedboard_flux::StateStore;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::{DashboardConfig, FollowFailurePolicy};
use crate::error::{Result, Severity, log_failure};
use crate::graph::SocialGraphCache;
use crate::media::{CommitOutcome, ProfileMediaPipeline};
use crate::model::{FollowedUserSummary, Identity, MediaFile};
use crate::notifications::NotificationCounter;
use crate::posts::PostCountTracker;
use crate::remote::SocialService;
use crate::session::SessionStore;
use crate::state::{ActiveTab, Alert, AppRoute, MediaDraftState, SessionPhase, Tab};

pub const ROUTE_DASHBOARD: &str = "/dashboard";
pub const ROUTE_LOGIN: &str = "/login";

pub const MSG_FOLLOW_FAILED: &str = "Failed to update follow status. Please try again.";
pub const MSG_SELF_FOLLOW: &str = "You cannot follow yourself";

/// Result of a follow or unfollow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The service accepted the change.
    Confirmed,
    /// The service rejected it; an alert was raised.
    Failed,
    /// Nothing to do: no identity, the change was already in effect, or it
    /// was refused locally.
    Skipped,
}

/// Read-only snapshot of everything the dashboard renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub identity: Option<Identity>,
    pub loading: bool,
    pub phase: SessionPhase,
    pub notification_unread_count: u64,
    pub following_summaries: Vec<FollowedUserSummary>,
    pub post_count: u64,
    pub media_draft_state: MediaDraftState,
    pub active_tab: Tab,
    pub avatar_url: String,
}

pub struct Dashboard {
    config: DashboardConfig,
    store: Arc<StateStore>,
    service: Arc<dyn SocialService>,
    session: Arc<SessionStore>,
    notifications: NotificationCounter,
    graph: SocialGraphCache,
    posts: PostCountTracker,
    media: ProfileMediaPipeline,
}

impl Dashboard {
    /// Build the dashboard and publish its initial (loading) state.
    pub fn new(service: Arc<dyn SocialService>, config: DashboardConfig) -> Self {
        let store = Arc::new(StateStore::new());
        let session = Arc::new(SessionStore::new(service.clone(), store.clone()));
        let notifications = NotificationCounter::new(service.clone(), store.clone(), session.clone());
        let graph = SocialGraphCache::new(service.clone(), store.clone(), session.clone());
        let posts = PostCountTracker::new(service.clone(), store.clone(), session.clone());
        let media = ProfileMediaPipeline::new(service.clone(), store.clone(), session.clone());

        store.set(ActiveTab::default());
        store.set(AppRoute(ROUTE_DASHBOARD.to_string()));

        Self {
            config,
            store,
            service,
            session,
            notifications,
            graph,
            posts,
            media,
        }
    }

    /// The store the presentation layer reads and subscribes to.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Run the startup sequence.
    ///
    /// Identity and the unread count are fetched concurrently. Once the
    /// identity is known, the following list and the post baseline are
    /// fetched concurrently. Returns the loaded identity, if any.
    pub async fn start(&self) -> Option<Identity> {
        info!("starting dashboard");
        let (identity, ()) = tokio::join!(self.session.load(), self.notifications.refresh());
        let Some(identity) = identity else {
            info!("no session identity, showing empty dashboard");
            return None;
        };

        tokio::join!(
            self.graph.sync_to_following(&identity.following),
            self.posts.load_baseline(&identity.username),
        );
        Some(identity)
    }

    // ========================================================================
    // Follow graph
    // ========================================================================

    /// Follow `user_id` optimistically, then confirm with the service.
    pub async fn follow(&self, user_id: &str) -> MutationOutcome {
        let Some(me) = self.session.identity() else {
            debug!(user_id, "follow without identity");
            return MutationOutcome::Skipped;
        };
        if me.id == user_id {
            self.store.set(Alert::error(MSG_SELF_FOLLOW));
            return MutationOutcome::Skipped;
        }
        // The remote endpoint toggles, so a repeat must not reach it.
        if !self.session.add_following(user_id) {
            debug!(user_id, "already following");
            return MutationOutcome::Skipped;
        }

        let epoch = self.session.epoch();
        let ((), result) = tokio::join!(
            self.graph.on_followed(user_id),
            self.service.follow_user(user_id),
        );
        match result {
            Ok(()) => {
                info!(user_id, "followed");
                MutationOutcome::Confirmed
            }
            Err(e) => {
                log_failure("follow", &e, Severity::UserVisible);
                if self.session.is_current(epoch) {
                    if self.config.follow_failure_policy == FollowFailurePolicy::Rollback {
                        self.session.remove_following(user_id);
                        self.graph.on_unfollowed(user_id);
                    }
                    self.store.set(Alert::error(MSG_FOLLOW_FAILED));
                }
                MutationOutcome::Failed
            }
        }
    }

    /// Unfollow `user_id` optimistically, then confirm with the service.
    pub async fn unfollow(&self, user_id: &str) -> MutationOutcome {
        if !self.session.remove_following(user_id) {
            debug!(user_id, "not following");
            return MutationOutcome::Skipped;
        }
        self.graph.on_unfollowed(user_id);

        let epoch = self.session.epoch();
        match self.service.unfollow_user(user_id).await {
            Ok(()) => {
                info!(user_id, "unfollowed");
                MutationOutcome::Confirmed
            }
            Err(e) => {
                log_failure("unfollow", &e, Severity::UserVisible);
                if self.session.is_current(epoch) {
                    if self.config.follow_failure_policy == FollowFailurePolicy::Rollback {
                        self.session.add_following(user_id);
                        self.graph.on_followed(user_id).await;
                    }
                    self.store.set(Alert::error(MSG_FOLLOW_FAILED));
                }
                MutationOutcome::Failed
            }
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Switch tabs. Never fetches anything.
    pub fn set_active_tab(&self, tab: Tab) {
        debug!(tab = %tab, "active tab");
        self.store.set(ActiveTab(tab));
    }

    /// Switch tabs by name, e.g. `"profile"`.
    pub fn select_tab(&self, name: &str) -> Result<Tab> {
        let tab = name.parse::<Tab>()?;
        self.set_active_tab(tab);
        Ok(tab)
    }

    pub fn active_tab(&self) -> Tab {
        self.store.get::<ActiveTab>().map(|t| t.0).unwrap_or_default()
    }

    /// Fetch the unread count once more.
    pub async fn refresh_notifications(&self) {
        self.notifications.refresh().await;
    }

    /// Refresh the unread badge every `period` until the current session
    /// ends or the handle is aborted. The first refresh happens one period
    /// from now.
    pub fn spawn_notification_poller(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let dashboard = Arc::clone(self);
        let epoch = self.session.epoch();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !dashboard.session.is_current(epoch) {
                    debug!("session ended, stopping notification poller");
                    break;
                }
                dashboard.notifications.refresh().await;
            }
        })
    }

    // ========================================================================
    // Posts
    // ========================================================================

    pub fn on_post_created(&self) {
        self.posts.on_post_created();
    }

    pub fn on_post_deleted(&self) {
        self.posts.on_post_deleted();
    }

    // ========================================================================
    // Profile picture
    // ========================================================================

    pub async fn select_media(&self, file: MediaFile) -> bool {
        self.media.select(file).await
    }

    pub async fn commit_media(&self) -> CommitOutcome {
        self.media.commit().await
    }

    pub fn cancel_media(&self) -> bool {
        self.media.cancel()
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Log out. The local teardown always happens; the remote call is
    /// best-effort.
    pub async fn logout(&self) {
        self.session.end_session();
        self.notifications.reset();
        self.graph.clear();
        self.posts.reset();
        self.media.reset();
        self.store.set(ActiveTab::default());
        self.store.set(AppRoute(ROUTE_LOGIN.to_string()));
        self.session.terminate_remote().await;
    }

    /// Snapshot the view model.
    pub fn view(&self) -> DashboardView {
        let identity = self.session.identity();
        let phase = self.session.phase();
        let avatar_url = match &identity {
            Some(identity) => identity.avatar_or(&self.config.placeholder_avatar).to_string(),
            None => self.config.placeholder_avatar.clone(),
        };
        DashboardView {
            identity,
            loading: phase == SessionPhase::Loading,
            phase,
            notification_unread_count: self.notifications.unread(),
            following_summaries: self.graph.summaries(),
            post_count: self.posts.count(),
            media_draft_state: self.media.state(),
            active_tab: self.active_tab(),
            avatar_url,
        }
    }
}
