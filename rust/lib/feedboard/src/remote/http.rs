//! JSON-over-HTTP implementation of [`SocialService`].
//!
//! Every endpoint lives under `{server}{api_prefix}`. Session cookies are
//! kept in the client's cookie store; an optional bearer token is attached
//! to every request on top of them.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::SocialService;
use crate::config::DashboardConfig;
use crate::error::RemoteError;
use crate::model::{FollowedUserSummary, Identity, MediaFile, Post, UploadedImage};

/// Multipart field name the upload endpoint expects.
const PROFILE_PICTURE_FIELD: &str = "profilePicture";

pub struct HttpSocialService {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

// ── Response envelopes ──────────────────────────────────────────────

#[derive(Deserialize)]
struct MeResponse {
    #[serde(default)]
    success: bool,
    user: Option<Identity>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnreadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    unread_count: u64,
    message: Option<String>,
}

#[derive(Deserialize)]
struct AckResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
}

#[derive(Deserialize)]
struct UsersResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    users: Vec<FollowedUserSummary>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct PostsResponse {
    #[serde(default)]
    posts: Vec<Post>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    profile_picture: Option<String>,
    message: Option<String>,
}

fn rejected(what: &str, message: Option<String>) -> RemoteError {
    RemoteError::Rejected(message.unwrap_or_else(|| format!("{} was not successful", what)))
}

// ── Client ──────────────────────────────────────────────────────────

impl HttpSocialService {
    pub fn new(config: &DashboardConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// `path` followed by `segment` as one percent-encoded path segment.
    fn url_with(&self, path: &str, segment: &str) -> Result<reqwest::Url, RemoteError> {
        let mut url = reqwest::Url::parse(&self.url(path))
            .map_err(|e| RemoteError::Network(format!("invalid url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Network(format!("cannot append to {}", self.api_base)))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode its JSON body, mapping HTTP errors.
    async fn send<R: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<R, RemoteError> {
        let resp = self.authed(builder).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            if code == 401 {
                return Err(RemoteError::Auth(body));
            }
            return Err(RemoteError::Server { status: code, message: body });
        }
        let bytes = resp.bytes().await?;
        decode(&bytes)
    }

    /// Follow and unfollow share one toggle endpoint.
    async fn toggle_follow(&self, user_id: &str) -> Result<(), RemoteError> {
        let url = self.url_with("user/follow", user_id)?;
        debug!(%url, "toggling follow");
        let resp: AckResponse = self.send(self.http.post(url).json(&serde_json::json!({}))).await?;
        if !resp.success {
            return Err(rejected("follow update", resp.message));
        }
        Ok(())
    }
}

fn decode<R: DeserializeOwned>(bytes: &[u8]) -> Result<R, RemoteError> {
    serde_json::from_slice(bytes).map_err(|e| RemoteError::Decode(format!("response body: {}", e)))
}

#[async_trait]
impl SocialService for HttpSocialService {
    async fn current_identity(&self) -> Result<Identity, RemoteError> {
        let resp: MeResponse = self.send(self.http.get(self.url("auth/me"))).await?;
        match (resp.success, resp.user) {
            (true, Some(user)) => Ok(user),
            (_, _) => Err(RemoteError::Auth(
                resp.message.unwrap_or_else(|| "no active session".into()),
            )),
        }
    }

    async fn unread_notification_count(&self) -> Result<u64, RemoteError> {
        let resp: UnreadResponse = self.send(self.http.get(self.url("notifications/unread"))).await?;
        if !resp.success {
            return Err(rejected("unread count", resp.message));
        }
        Ok(resp.unread_count)
    }

    async fn logout(&self) -> Result<(), RemoteError> {
        let sent = self
            .send::<serde_json::Value>(self.http.post(self.url("auth/logout")).json(&serde_json::json!({})))
            .await;
        match sent {
            // A 2xx without a JSON body still ended the session.
            Ok(_) | Err(RemoteError::Decode(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn follow_user(&self, user_id: &str) -> Result<(), RemoteError> {
        self.toggle_follow(user_id).await
    }

    async fn unfollow_user(&self, user_id: &str) -> Result<(), RemoteError> {
        self.toggle_follow(user_id).await
    }

    async fn list_all_users(&self) -> Result<Vec<FollowedUserSummary>, RemoteError> {
        let resp: UsersResponse = self.send(self.http.get(self.url("user/users"))).await?;
        if !resp.success {
            return Err(rejected("user directory", resp.message));
        }
        Ok(resp.users)
    }

    async fn user_posts(&self, username: &str) -> Result<Vec<Post>, RemoteError> {
        let url = self.url_with("user", username)?;
        let resp: PostsResponse = self.send(self.http.get(url)).await?;
        Ok(resp.posts)
    }

    async fn upload_profile_image(&self, file: &MediaFile) -> Result<UploadedImage, RemoteError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;
        let form = Form::new().part(PROFILE_PICTURE_FIELD, part);

        let resp: UploadResponse = self
            .send(self.http.put(self.url("user/profile-picture")).multipart(form))
            .await?;
        match (resp.success, resp.profile_picture) {
            (true, Some(image_url)) => Ok(UploadedImage { image_url }),
            (_, _) => Err(rejected("profile picture upload", resp.message)),
        }
    }
}
