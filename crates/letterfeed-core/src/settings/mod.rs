//! Application settings.
//!
//! The stored record lives in a single `SQLite` row. Environment variables
//! prefixed `LETTERFEED_` override individual fields; overridden fields are
//! reported as locked and are never written by an update.
//!
//! # Example
//!
//! ```ignore
//! use letterfeed_core::settings::{SettingsOverrides, SettingsProvider, SettingsRepository};
//!
//! let repo = SettingsRepository::new("letterfeed.db", SettingsOverrides::from_env()?).await?;
//! let settings = repo.resolve(true).await?;
//! if settings.is_configured() {
//!     // connect with settings.imap_server ...
//! }
//! ```

mod layered;
mod model;
mod repository;

pub use layered::merge;
pub use model::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_SEARCH_FOLDER, ENV_PREFIX, ResolvedSettings, Settings,
    SettingsField, SettingsOverrides,
};
pub use repository::{SettingsProvider, SettingsRepository};
