//! Wire-level domain types shared with the social service.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The session user's profile snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_img: Option<String>,
    /// Ids this user follows. Membership only; order is irrelevant.
    #[serde(default)]
    pub following: BTreeSet<String>,
    #[serde(default)]
    pub followers: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn follows(&self, user_id: &str) -> bool {
        self.following.contains(user_id)
    }

    /// Profile image URL, or `placeholder` when none is set.
    pub fn avatar_or<'a>(&'a self, placeholder: &'a str) -> &'a str {
        match self.profile_img.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => placeholder,
        }
    }
}

/// Public projection of another user, as listed by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowedUserSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_img: Option<String>,
}

/// An authored post. Only the count is consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// A file chosen for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    /// Declared media type, e.g. `image/png`.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

impl std::fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Result of a profile picture upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub image_url: String,
}
