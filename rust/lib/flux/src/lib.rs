//! Flux: the dashboard's observable state store.
//!
//! The controller owns all session state; the presentation layer only
//! renders it. State lives in a flat path namespace with `/` as separator,
//! one typed value per path:
//!
//! - `session/state`: identity snapshot and loading flag
//! - `notifications/unread`: unread badge
//! - `graph/following`: followed-user summaries
//!
//! # Primitives
//!
//! - `set(value)`: store a [`State`] at its well-known path and notify
//! - `set_versioned(value, version)`: same, unless a newer version is stored
//! - `get::<T>()`: read the current value (Arc, no data copy)
//! - `subscribe(pattern, handler)`: observe changes, MQTT-style wildcards
//!
//! # Patterns
//!
//! - Exact: `session/state`
//! - Single-level: `graph/+` matches `graph/following`
//! - Multi-level: `media/#` matches everything under `media/`
//! - All: `#`
//!
//! # Example
//!
//! ```ignore
//! use feedboard_flux::{State, StateStore};
//!
//! #[derive(Clone)]
//! struct Badge(u64);
//!
//! impl State for Badge {
//!     const PATH: &'static str = "notifications/unread";
//! }
//!
//! let store = StateStore::new();
//! store.subscribe("notifications/#", |path, _| println!("{path} changed"));
//! store.set(Badge(5));
//! assert_eq!(store.get::<Badge>().map(|b| b.0), Some(5));
//! ```

pub mod pattern;
pub mod store;
pub mod value;

pub use store::{ChangeHandler, StateStore};
pub use value::{State, StateValue, SubscriptionId};
