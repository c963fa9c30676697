//! Dashboard configuration.
//!
//! Read from a TOML file, e.g. `feedboard.toml`:
//!
//! ```toml
//! server = "http://localhost:5000"
//! notification_poll_secs = 60
//! follow_failure_policy = "rollback"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};

/// What to do with an optimistic follow/unfollow when the service rejects it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowFailurePolicy {
    /// Leave the optimistic local state as-is.
    #[default]
    Keep,
    /// Revert the local mutation and re-sync the following list.
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Service base URL (e.g. "http://localhost:5000").
    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Bearer token. Session cookies are kept regardless.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Refresh the unread badge on this interval when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_poll_secs: Option<u64>,

    #[serde(default)]
    pub follow_failure_policy: FollowFailurePolicy,

    #[serde(default = "default_placeholder_avatar")]
    pub placeholder_avatar: String,
}

fn default_server() -> String {
    "http://localhost:5000".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_placeholder_avatar() -> String {
    "https://via.placeholder.com/140".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            api_prefix: default_api_prefix(),
            token: None,
            timeout_secs: default_timeout_secs(),
            notification_poll_secs: None,
            follow_failure_policy: FollowFailurePolicy::default(),
            placeholder_avatar: default_placeholder_avatar(),
        }
    }
}

impl DashboardConfig {
    /// Load config from disk, or defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| DashboardError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: DashboardConfig =
            toml::from_str(content).map_err(|e| DashboardError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.server.starts_with("http://") || self.server.starts_with("https://")) {
            return Err(DashboardError::Config(format!(
                "server must be an http(s) URL, got \"{}\"",
                self.server
            )));
        }
        if self.timeout_secs == 0 {
            return Err(DashboardError::Config("timeout_secs must be positive".into()));
        }
        if self.notification_poll_secs == Some(0) {
            return Err(DashboardError::Config(
                "notification_poll_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// `{server}{api_prefix}` without a trailing slash.
    pub fn api_base(&self) -> String {
        format!(
            "{}/{}",
            self.server.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn notification_poll_interval(&self) -> Option<Duration> {
        self.notification_poll_secs.map(Duration::from_secs)
    }
}
