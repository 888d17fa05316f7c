//! Newsletter data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a newsletter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewsletterId(pub i64);

impl NewsletterId {
    /// Creates a new newsletter ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NewsletterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A subscription grouping one or more sender addresses into one feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Newsletter {
    /// Unique identifier.
    pub id: NewsletterId,
    /// Display name.
    pub name: String,
    /// Optional URL-safe handle, unique across newsletters.
    pub slug: Option<String>,
    /// Folder to scan instead of the global default.
    pub search_folder: Option<String>,
    /// Folder to move processed mail to instead of the global default.
    pub move_to_folder: Option<String>,
    /// Run main-content extraction on incoming bodies.
    pub extract_content: bool,
    /// Whether the feed is published.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Sender addresses classified into this newsletter.
    pub senders: Vec<Sender>,
}

impl Newsletter {
    /// Folder this newsletter's mail is scanned in.
    #[must_use]
    pub fn effective_search_folder<'a>(&'a self, default: &'a str) -> &'a str {
        self.search_folder
            .as_deref()
            .filter(|folder| !folder.is_empty())
            .unwrap_or(default)
    }

    /// Folder processed mail is moved to, if any.
    #[must_use]
    pub fn effective_move_folder<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        self.move_to_folder
            .as_deref()
            .filter(|folder| !folder.is_empty())
            .or_else(|| default.filter(|folder| !folder.is_empty()))
    }

    /// Sender addresses as strings.
    pub fn sender_emails(&self) -> impl Iterator<Item = &str> {
        self.senders.iter().map(|sender| sender.email.as_str())
    }
}

/// An address bound to exactly one newsletter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Unique identifier.
    pub id: i64,
    /// Email address, matched exactly.
    pub email: String,
    /// Owning newsletter.
    pub newsletter_id: NewsletterId,
}

/// Fields used to create or replace a newsletter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsletterData {
    /// Display name.
    pub name: String,
    /// Sender addresses.
    pub sender_emails: Vec<String>,
    /// Requested slug, sanitized before storing.
    pub slug: Option<String>,
    /// Folder override for scanning.
    pub search_folder: Option<String>,
    /// Folder override for moving processed mail.
    pub move_to_folder: Option<String>,
    /// Run main-content extraction.
    pub extract_content: bool,
}

impl NewsletterData {
    /// Creates data for a newsletter with the given name and senders.
    #[must_use]
    pub fn new(name: impl Into<String>, sender_emails: Vec<String>) -> Self {
        Self {
            name: name.into(),
            sender_emails,
            ..Self::default()
        }
    }

    /// Sets the slug.
    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Sets the folder to scan.
    #[must_use]
    pub fn with_search_folder(mut self, folder: impl Into<String>) -> Self {
        self.search_folder = Some(folder.into());
        self
    }

    /// Sets the folder to move processed mail to.
    #[must_use]
    pub fn with_move_folder(mut self, folder: impl Into<String>) -> Self {
        self.move_to_folder = Some(folder.into());
        self
    }

    /// Enables or disables content extraction.
    #[must_use]
    pub const fn with_extraction(mut self, enabled: bool) -> Self {
        self.extract_content = enabled;
        self
    }
}

/// A newsletter together with its entry count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsletterSummary {
    /// The newsletter, with senders.
    pub newsletter: Newsletter,
    /// Number of stored entries.
    pub entries_count: u64,
}

/// One persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique identifier.
    pub id: i64,
    /// Owning newsletter.
    pub newsletter_id: NewsletterId,
    /// Decoded subject.
    pub subject: String,
    /// HTML or plain-text body.
    pub body: String,
    /// `Message-ID` header, globally unique.
    pub message_id: String,
    /// When the message was sent, or when it was stored.
    pub received_at: DateTime<Utc>,
}

/// Fields used to create an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    /// Decoded subject.
    pub subject: String,
    /// Body to store.
    pub body: String,
    /// `Message-ID` header.
    pub message_id: String,
    /// Parsed `Date` header. Defaults to now.
    pub received_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn newsletter(search: Option<&str>, target: Option<&str>) -> Newsletter {
        Newsletter {
            id: NewsletterId::new(1),
            name: "Weekly".to_string(),
            slug: None,
            search_folder: search.map(ToString::to_string),
            move_to_folder: target.map(ToString::to_string),
            extract_content: false,
            is_active: true,
            created_at: Utc::now(),
            senders: Vec::new(),
        }
    }

    #[test]
    fn test_effective_search_folder() {
        assert_eq!(newsletter(None, None).effective_search_folder("INBOX"), "INBOX");
        assert_eq!(
            newsletter(Some("News"), None).effective_search_folder("INBOX"),
            "News"
        );
        assert_eq!(newsletter(Some(""), None).effective_search_folder("INBOX"), "INBOX");
    }

    #[test]
    fn test_effective_move_folder() {
        assert_eq!(newsletter(None, None).effective_move_folder(None), None);
        assert_eq!(
            newsletter(None, None).effective_move_folder(Some("Archive")),
            Some("Archive")
        );
        assert_eq!(
            newsletter(None, Some("Read")).effective_move_folder(Some("Archive")),
            Some("Read")
        );
        assert_eq!(newsletter(None, None).effective_move_folder(Some("")), None);
    }

    #[test]
    fn test_newsletter_data_builder() {
        let data = NewsletterData::new("Weekly", vec!["a@ex.com".to_string()])
            .with_slug("weekly")
            .with_search_folder("News")
            .with_move_folder("Read")
            .with_extraction(true);
        assert_eq!(data.slug.as_deref(), Some("weekly"));
        assert_eq!(data.search_folder.as_deref(), Some("News"));
        assert_eq!(data.move_to_folder.as_deref(), Some("Read"));
        assert!(data.extract_content);
    }
}
