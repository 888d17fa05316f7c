//! Command-line interface.

use std::time::Duration;

use clap::{Parser, Subcommand};
use letterfeed_core::ImapConnector;

#[derive(Parser, Debug)]
#[command(name = "letterfeed", author, version, about, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// `SQLite` database file (or `sqlite:` URL) holding settings, newsletters and entries
    #[arg(long, global = true, env = "LETTERFEED_DATABASE_URL")]
    #[arg(value_name = "PATH", default_value = "letterfeed.db")]
    pub database: String,

    /// IMAP port (implicit TLS)
    #[arg(long, global = true, env = "LETTERFEED_IMAP_PORT")]
    #[arg(value_name = "PORT", default_value_t = ImapConnector::DEFAULT_PORT)]
    pub imap_port: u16,

    /// Limit in seconds for a single IMAP operation
    #[arg(long, global = true, env = "LETTERFEED_IMAP_TIMEOUT_SECS")]
    #[arg(value_name = "SECS", default_value_t = ImapConnector::DEFAULT_TIMEOUT.as_secs())]
    pub imap_timeout_secs: u64,
}

impl Cli {
    /// Connector configured from the transport flags.
    pub const fn connector(&self) -> ImapConnector {
        ImapConnector::new(self.imap_port, Duration::from_secs(self.imap_timeout_secs))
    }
}

#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Command {
    /// Poll the mailbox forever at the configured interval
    #[default]
    Run,
    /// Run a single ingestion pass and exit
    Once,
    /// Check that the IMAP server accepts the configured credentials
    Check,
    /// List the folders of the configured mailbox
    Folders,
}
