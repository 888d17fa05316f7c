//! Mail services.
//!
//! [`MailConnector`] and [`MailSession`] describe the mail operations the
//! ingestion pipeline needs. [`ImapConnector`] implements them over IMAP
//! with implicit TLS.

pub mod imap;
mod session;

pub use imap::{ImapConnector, ImapSession};
pub use session::{Flag, MailConnector, MailSession, MailboxStatus};

/// Errors that can occur during mail operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailServiceError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Mailbox could not be selected.
    #[error("Cannot select mailbox {folder}: {reason}")]
    Selection {
        /// Requested mailbox.
        folder: String,
        /// Server or transport error.
        reason: String,
    },

    /// Operation failed.
    #[error("Operation failed: {0}")]
    Operation(String),

    /// Operation did not complete in time.
    #[error("Timed out: {0}")]
    Timeout(String),
}
