//! `feedboard`: headless driver for the social feed dashboard.
//!
//! Usage:
//!   feedboard [-c feedboard.toml] [show]
//!   feedboard follow <user-id>
//!   feedboard unfollow <user-id>
//!   feedboard upload <image-path>
//!   feedboard logout
//!   feedboard watch
//!
//! Every command runs the dashboard startup sequence first, then prints the
//! resulting view model as JSON.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use feedboard::state::NotificationBadge;
use feedboard::{CommitOutcome, Dashboard, DashboardConfig, HttpSocialService, MediaFile};
use feedboard_flux::State;
use tracing::info;

const DEFAULT_WATCH_PERIOD: Duration = Duration::from_secs(60);

/// Social feed dashboard client.
#[derive(Parser, Debug)]
#[command(name = "feedboard", about = "Social feed dashboard client")]
struct Cli {
    /// Path to config file.
    #[arg(short = 'c', long = "config", default_value = "feedboard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the dashboard view.
    Show,

    /// Follow a user by id.
    Follow { id: String },

    /// Unfollow a user by id.
    Unfollow { id: String },

    /// Replace the profile picture.
    Upload { path: PathBuf },

    /// End the session.
    Logout,

    /// Poll the unread notification count and print every change.
    Watch {
        /// Poll interval in seconds (overrides `notification_poll_secs`).
        #[arg(long)]
        every: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    info!("Loading configuration from {}", cli.config.display());
    let config = DashboardConfig::load(&cli.config)?;
    let service = Arc::new(HttpSocialService::new(&config)?);
    let dashboard = Arc::new(Dashboard::new(service, config));

    dashboard.start().await;

    match cli.command.unwrap_or(Commands::Show) {
        Commands::Show => {}
        Commands::Follow { id } => {
            let outcome = dashboard.follow(&id).await;
            info!(?outcome, "follow {}", id);
        }
        Commands::Unfollow { id } => {
            let outcome = dashboard.unfollow(&id).await;
            info!(?outcome, "unfollow {}", id);
        }
        Commands::Upload { path } => {
            let file = read_media(&path)?;
            if !dashboard.select_media(file).await {
                anyhow::bail!("{} is not an image", path.display());
            }
            if let CommitOutcome::Committed(url) = dashboard.commit_media().await {
                info!("profile picture now {}", url);
            }
        }
        Commands::Logout => dashboard.logout().await,
        Commands::Watch { every } => {
            let period = every
                .map(Duration::from_secs)
                .or_else(|| dashboard.config().notification_poll_interval())
                .unwrap_or(DEFAULT_WATCH_PERIOD);
            return watch(dashboard, period).await;
        }
    }

    print_view(&dashboard)
}

fn print_view(dashboard: &Dashboard) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&dashboard.view())?);
    Ok(())
}

/// Print the badge on every change until Ctrl-C.
async fn watch(dashboard: Arc<Dashboard>, period: Duration) -> anyhow::Result<()> {
    print_view(&dashboard)?;
    let last = LastSeen::new(dashboard.view().notification_unread_count);
    dashboard.store().subscribe(NotificationBadge::PATH, move |_, value| {
        if let Some(badge) = value.downcast_ref::<NotificationBadge>() {
            if last.update(badge.unread) {
                println!("unread: {}", badge.unread);
            }
        }
    });

    info!("polling notifications every {:?}", period);
    let poller = dashboard.spawn_notification_poller(period);
    tokio::signal::ctrl_c().await?;
    poller.abort();
    Ok(())
}

/// Last printed badge value. Every refresh republishes the badge, changed
/// or not.
struct LastSeen(Mutex<u64>);

impl LastSeen {
    fn new(initial: u64) -> Self {
        Self(Mutex::new(initial))
    }

    /// Record `value`; returns whether it differs from the previous one.
    fn update(&self, value: u64) -> bool {
        let mut last = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if *last == value {
            return false;
        }
        *last = value;
        true
    }
}

fn read_media(path: &Path) -> anyhow::Result<MediaFile> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(MediaFile::new(name, content_type_for(path), bytes))
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
