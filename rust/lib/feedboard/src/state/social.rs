//! Counters and the following list.

use feedboard_flux::State;
use serde::Serialize;

use crate::model::FollowedUserSummary;

/// Unread notifications badge, stored at `notifications/unread`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBadge {
    pub unread: u64,
}

impl State for NotificationBadge {
    const PATH: &'static str = "notifications/unread";
}

/// Summaries of followed users, stored at `graph/following`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowingList {
    pub items: Vec<FollowedUserSummary>,
}

impl State for FollowingList {
    const PATH: &'static str = "graph/following";
}

/// The session user's authored posts, stored at `posts/count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PostCount {
    pub count: u64,
}

impl State for PostCount {
    const PATH: &'static str = "posts/count";
}
