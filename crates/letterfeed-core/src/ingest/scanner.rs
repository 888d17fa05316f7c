//! Processes the unseen mail of one selected folder.

use tracing::{debug, error, info, warn};

use super::classify::{Classification, SenderMap, classify};
use super::decoder::{DecodeError, DecodedMessage, decode_message};
use super::extract::extract_content;
use crate::newsletter::{NewEntry, Newsletter, NewsletterId, NewsletterStore};
use crate::service::{Flag, MailServiceError, MailSession};
use crate::settings::ResolvedSettings;

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// An entry was stored.
    Created {
        /// Newsletter the entry belongs to.
        newsletter_id: NewsletterId,
        /// The newsletter was auto-provisioned for this message.
        provisioned: bool,
    },
    /// An entry with the same `Message-ID` already exists.
    Duplicate,
    /// The sender matches no newsletter.
    Unmatched,
    /// The sender belongs to a newsletter scanned in another folder.
    OtherFolder,
    /// The message cannot be ingested.
    Skipped(DecodeError),
    /// The message vanished between search and fetch.
    Vanished,
    /// The server failed to return the message.
    FetchFailed,
    /// The store rejected the entry. The message is left untouched.
    PersistFailed,
}

/// Per-folder message counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanStats {
    /// Unseen messages found by the search.
    pub found: usize,
    /// Entries stored.
    pub created: usize,
    /// Messages already stored.
    pub duplicates: usize,
    /// Messages from senders without a newsletter in this folder.
    pub unmatched: usize,
    /// Messages skipped as undecodable or vanished.
    pub skipped: usize,
    /// Messages that failed to fetch or store.
    pub failed: usize,
    /// Newsletters created for new senders.
    pub provisioned: usize,
    /// Whether the folder was expunged.
    pub expunged: bool,
}

impl ScanStats {
    fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Created { provisioned, .. } => {
                self.created += 1;
                if *provisioned {
                    self.provisioned += 1;
                }
            }
            MessageOutcome::Duplicate => self.duplicates += 1,
            MessageOutcome::Unmatched | MessageOutcome::OtherFolder => self.unmatched += 1,
            MessageOutcome::Skipped(_) | MessageOutcome::Vanished => self.skipped += 1,
            MessageOutcome::FetchFailed | MessageOutcome::PersistFailed => self.failed += 1,
        }
    }
}

/// Scans one folder group over an open session.
///
/// The session must already have the folder selected. Messages are
/// processed one at a time in UID order.
pub struct FolderScanner<'a, S: MailSession + ?Sized, N: NewsletterStore + ?Sized> {
    session: &'a mut S,
    store: &'a N,
    settings: &'a ResolvedSettings,
    folder: &'a str,
    senders: SenderMap,
    newsletters: Vec<Newsletter>,
    stats: ScanStats,
}

impl<'a, S: MailSession + ?Sized, N: NewsletterStore + ?Sized> FolderScanner<'a, S, N> {
    /// Creates a scanner for the newsletters watching `folder`.
    pub fn new(
        session: &'a mut S,
        store: &'a N,
        settings: &'a ResolvedSettings,
        folder: &'a str,
        newsletters: Vec<Newsletter>,
    ) -> Self {
        Self {
            session,
            store,
            settings,
            folder,
            senders: SenderMap::from_newsletters(&newsletters),
            newsletters,
            stats: ScanStats::default(),
        }
    }

    /// Marks senders owned by newsletters of other folders, so their mail
    /// here is left alone instead of provisioning a second newsletter.
    #[must_use]
    pub fn with_foreign_senders<I, T>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.senders.exclude(addresses);
        self
    }

    /// Counters collected so far.
    #[must_use]
    pub const fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Consumes the scanner, returning its counters.
    #[must_use]
    pub fn into_stats(self) -> ScanStats {
        self.stats
    }

    /// Processes every unseen message, then expunges if mail was moved.
    ///
    /// # Errors
    ///
    /// Returns an error if the unseen search or the final expunge fails.
    /// Per-message failures are logged and counted instead.
    pub async fn scan(&mut self) -> Result<(), MailServiceError> {
        let uids = self.session.search_unseen().await?;
        self.stats.found = uids.len();
        if uids.is_empty() {
            debug!(folder = self.folder, "No unseen messages");
            return Ok(());
        }
        info!(folder = self.folder, count = uids.len(), "Processing unseen messages");

        for uid in uids {
            let outcome = self.process(uid).await;
            self.stats.record(&outcome);
        }

        if self.moves_mail() {
            self.session.expunge().await?;
            self.stats.expunged = true;
        }
        Ok(())
    }

    /// Runs one message through decode, dedup, classify and store.
    pub async fn process(&mut self, uid: u32) -> MessageOutcome {
        let raw = match self.session.fetch_peek(uid).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(folder = self.folder, uid, "Message vanished before fetch");
                return MessageOutcome::Vanished;
            }
            Err(e) => {
                warn!(folder = self.folder, uid, error = %e, "Failed to fetch message");
                return MessageOutcome::FetchFailed;
            }
        };

        let message = match decode_message(&raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(folder = self.folder, uid, error = %e, "Skipping message");
                return MessageOutcome::Skipped(e);
            }
        };

        match self.store.find_entry_by_message_id(&message.message_id).await {
            Ok(Some(_)) => {
                debug!(message_id = %message.message_id, "Entry already exists");
                return MessageOutcome::Duplicate;
            }
            Ok(None) => {}
            Err(e) => {
                error!(message_id = %message.message_id, error = %e, "Failed to look up entry");
                return MessageOutcome::PersistFailed;
            }
        }

        let classification = match classify(
            self.store,
            &mut self.senders,
            &message,
            self.settings.auto_add_new_senders,
        )
        .await
        {
            Ok(classification) => classification,
            Err(e) => {
                error!(sender = %message.sender, error = %e, "Failed to create newsletter");
                return MessageOutcome::PersistFailed;
            }
        };

        let (newsletter, provisioned) = match classification {
            Classification::Known(newsletter) => (newsletter, false),
            Classification::Provisioned(newsletter) => {
                self.newsletters.push(newsletter.clone());
                (newsletter, true)
            }
            Classification::OtherFolder => {
                debug!(
                    folder = self.folder,
                    sender = %message.sender,
                    "Sender belongs to a newsletter of another folder"
                );
                return MessageOutcome::OtherFolder;
            }
            Classification::Unmatched => {
                debug!(sender = %message.sender, "No newsletter for sender");
                return MessageOutcome::Unmatched;
            }
        };

        let entry = new_entry(message, &newsletter);
        if let Err(e) = self.store.create_entry(&entry, newsletter.id).await {
            error!(
                message_id = %entry.message_id,
                newsletter = %newsletter.id,
                error = %e,
                "Failed to store entry, leaving message unseen"
            );
            return MessageOutcome::PersistFailed;
        }
        info!(
            newsletter = %newsletter.name,
            subject = %entry.subject,
            "Stored entry"
        );

        self.settle(uid, &newsletter).await;
        MessageOutcome::Created {
            newsletter_id: newsletter.id,
            provisioned,
        }
    }

    /// Marks and moves a stored message. Failures are logged only.
    async fn settle(&mut self, uid: u32, newsletter: &Newsletter) {
        if self.settings.mark_as_read {
            if let Err(e) = self.session.store(uid, Flag::Seen).await {
                warn!(folder = self.folder, uid, error = %e, "Failed to mark message read");
            }
        }

        let Some(target) = newsletter.effective_move_folder(self.settings.move_to_folder.as_deref())
        else {
            return;
        };
        if let Err(e) = self.session.copy(uid, target).await {
            warn!(
                folder = self.folder,
                uid,
                destination = target,
                error = %e,
                "Failed to move message"
            );
            return;
        }
        if let Err(e) = self.session.store(uid, Flag::Deleted).await {
            warn!(folder = self.folder, uid, error = %e, "Failed to flag moved message");
        }
    }

    fn moves_mail(&self) -> bool {
        let default = self.settings.move_to_folder.as_deref();
        self.newsletters
            .iter()
            .any(|newsletter| newsletter.effective_move_folder(default).is_some())
    }
}

fn new_entry(message: DecodedMessage, newsletter: &Newsletter) -> NewEntry {
    let body = if newsletter.extract_content {
        extract_content(&message.body).body
    } else {
        message.body
    };
    NewEntry {
        subject: message.subject,
        body,
        message_id: message.message_id,
        received_at: message.received_at,
    }
}
