//! # letterfeed-core
//!
//! Core of the `LetterFeed` newsletter service.
//!
//! This crate provides:
//! - Settings storage with environment overrides
//! - Newsletters, sender addresses and entries (`SQLite`)
//! - The mail session contract and its IMAP implementation
//! - The ingestion pipeline that turns unseen mail into entries
//!
//! # Example
//!
//! ```ignore
//! use letterfeed_core::{ImapConnector, Ingestor, NewsletterRepository};
//! use letterfeed_core::settings::{SettingsOverrides, SettingsRepository};
//!
//! let settings = SettingsRepository::new("letterfeed.db", SettingsOverrides::from_env()?).await?;
//! let store = NewsletterRepository::new("letterfeed.db").await?;
//! let ingestor = Ingestor::new(settings, store, ImapConnector::default());
//! let report = ingestor.run().await?;
//! println!("{} new entries", report.created());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod database;
mod error;
pub mod ingest;
pub mod newsletter;
pub mod service;
pub mod settings;

pub use database::database_url;
pub use error::{Error, Result};
pub use ingest::{FolderOutcome, FolderReport, Ingestor, RunReport, ScanStats};
pub use newsletter::{
    Entry, NewEntry, Newsletter, NewsletterData, NewsletterId, NewsletterRepository,
    NewsletterStore, Sender,
};
pub use service::{ImapConnector, MailConnector, MailServiceError, MailSession};
pub use settings::{ResolvedSettings, Settings, SettingsOverrides, SettingsRepository};
