//! Feedboard: session and social-graph state for a social feed dashboard.
//!
//! The [`Dashboard`] owns everything the UI shows about the signed-in
//! user: identity, unread notifications, the "following" list, the post
//! counter and the profile picture editor. It keeps that view consistent
//! with a remote [`SocialService`] whose responses arrive asynchronously,
//! out of order, and sometimes not at all.
//!
//! The presentation layer never mutates state. It reads and subscribes to
//! the [`StateStore`](feedboard_flux::StateStore) returned by
//! [`Dashboard::store`], and calls the dashboard's methods in response to
//! user actions.
//!
//! ```ignore
//! let service = Arc::new(HttpSocialService::new(&config)?);
//! let dashboard = Dashboard::new(service, config);
//! dashboard.store().subscribe("#", |path, _| println!("{path} changed"));
//! dashboard.start().await;
//! dashboard.follow("u42").await;
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod media;
pub mod model;
pub mod notifications;
pub mod posts;
pub mod remote;
pub mod session;
pub mod state;

pub use config::{DashboardConfig, FollowFailurePolicy};
pub use controller::{Dashboard, DashboardView, MutationOutcome};
pub use error::{DashboardError, RemoteError, Result, Severity};
pub use media::CommitOutcome;
pub use model::{FollowedUserSummary, Identity, MediaFile, Post, UploadedImage};
pub use remote::{HttpSocialService, SocialService};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a component's state. A panicked writer leaves plain data behind,
/// so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
