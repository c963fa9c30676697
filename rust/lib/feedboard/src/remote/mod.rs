//! The social service the dashboard talks to.
//!
//! [`SocialService`] is the request/response contract; [`HttpSocialService`]
//! speaks it over the service's JSON API.

mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpSocialService;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::model::{FollowedUserSummary, Identity, MediaFile, Post, UploadedImage};

/// Authority for identity, follow graph, notifications and post counts.
#[async_trait]
pub trait SocialService: Send + Sync + 'static {
    /// Fetch the identity bound to the current session.
    async fn current_identity(&self) -> Result<Identity, RemoteError>;

    async fn unread_notification_count(&self) -> Result<u64, RemoteError>;

    /// Terminate the remote session. Best-effort.
    async fn logout(&self) -> Result<(), RemoteError>;

    async fn follow_user(&self, user_id: &str) -> Result<(), RemoteError>;

    async fn unfollow_user(&self, user_id: &str) -> Result<(), RemoteError>;

    /// The full directory of known users.
    async fn list_all_users(&self) -> Result<Vec<FollowedUserSummary>, RemoteError>;

    async fn user_posts(&self, username: &str) -> Result<Vec<Post>, RemoteError>;

    /// Upload a new profile picture as a multipart body.
    async fn upload_profile_image(&self, file: &MediaFile) -> Result<UploadedImage, RemoteError>;
}
