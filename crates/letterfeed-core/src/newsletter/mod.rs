//! Newsletters, their sender addresses and the entries ingested for them.
//!
//! A sender address belongs to at most one newsletter and is the key used
//! to classify incoming mail. Entries are keyed by the `Message-ID` of the
//! mail they were created from, so ingesting the same message twice never
//! produces a second entry.

mod model;
mod repository;
mod slug;

pub use model::{
    Entry, NewEntry, Newsletter, NewsletterData, NewsletterId, NewsletterSummary, Sender,
};
pub use repository::{NewsletterRepository, NewsletterStore};
pub use slug::sanitize_slug;
