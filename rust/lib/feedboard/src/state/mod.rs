//! View-model state published to the presentation layer.
//!
//! Each file defines the state stored at one well-known path. The
//! presentation layer subscribes to these paths and renders them; only
//! the owning component ever writes its path.

pub mod app;
pub mod media;
pub mod session;
pub mod social;

pub use app::{ActiveTab, Alert, AlertLevel, AppRoute, Tab};
pub use media::{MediaDraftState, MediaPhase};
pub use session::{SessionPhase, SessionState};
pub use social::{FollowingList, NotificationBadge, PostCount};
