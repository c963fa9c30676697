//! App-level state: active tab, route and alerts.

use std::fmt;
use std::str::FromStr;

use feedboard_flux::State;
use serde::Serialize;

use crate::error::DashboardError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Tab {
    #[default]
    Home,
    Explore,
    Notifications,
    Profile,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Home, Tab::Explore, Tab::Notifications, Tab::Profile];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Home => "home",
            Tab::Explore => "explore",
            Tab::Notifications => "notifications",
            Tab::Profile => "profile",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DashboardError::InvalidTab(s.to_string()))
    }
}

/// Selected tab, stored at `app/tab`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActiveTab(pub Tab);

impl State for ActiveTab {
    const PATH: &'static str = "app/tab";
}

/// Navigation route, stored at `app/route`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppRoute(pub String);

impl State for AppRoute {
    const PATH: &'static str = "app/route";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertLevel {
    Info,
    Error,
}

/// Blocking message for the user, stored at `app/alert`.
///
/// Each new alert replaces the previous one; subscribers see every set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl State for Alert {
    const PATH: &'static str = "app/alert";
}

impl Alert {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: AlertLevel::Info, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: AlertLevel::Error, message: message.into() }
    }
}
