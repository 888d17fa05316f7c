//! Mail session contract used by the ingestion pipeline.

use async_trait::async_trait;

use super::MailServiceError;
use crate::settings::ResolvedSettings;

/// System flag set on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message is marked for removal by the next expunge.
    Deleted,
}

impl Flag {
    /// IMAP flag name.
    #[must_use]
    pub const fn as_imap(&self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
            Self::Deleted => "\\Deleted",
        }
    }
}

/// Counters reported when a mailbox is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Sequence number of the first unseen message, if reported.
    pub first_unseen: Option<u32>,
}

/// An authenticated session against one mail account.
///
/// Message identifiers are UIDs of the selected mailbox.
#[async_trait]
pub trait MailSession: Send {
    /// Selects the mailbox subsequent operations apply to.
    async fn select(&mut self, folder: &str) -> Result<MailboxStatus, MailServiceError>;

    /// Lists unseen messages in the selected mailbox, in ascending order.
    async fn search_unseen(&mut self) -> Result<Vec<u32>, MailServiceError>;

    /// Fetches the full raw message without setting `\Seen`.
    ///
    /// Returns `None` if the message no longer exists.
    async fn fetch_peek(&mut self, uid: u32) -> Result<Option<Vec<u8>>, MailServiceError>;

    /// Adds a flag to a message.
    async fn store(&mut self, uid: u32, flag: Flag) -> Result<(), MailServiceError>;

    /// Copies a message to another mailbox.
    async fn copy(&mut self, uid: u32, folder: &str) -> Result<(), MailServiceError>;

    /// Permanently removes messages flagged `\Deleted`.
    async fn expunge(&mut self) -> Result<(), MailServiceError>;

    /// Ends the session.
    async fn logout(&mut self) -> Result<(), MailServiceError>;
}

/// Opens authenticated mail sessions.
#[async_trait]
pub trait MailConnector: Send + Sync {
    /// Session type produced by this connector.
    type Session: MailSession;

    /// Connects and logs in with the given settings.
    async fn open(&self, settings: &ResolvedSettings) -> Result<Self::Session, MailServiceError>;
}
