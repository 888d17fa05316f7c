//! Sender classification and auto-provisioning of newsletters.

use std::collections::{HashMap, HashSet};

use tracing::info;

use super::decoder::DecodedMessage;
use crate::Result;
use crate::newsletter::{Newsletter, NewsletterData, NewsletterStore};

/// Sender address to newsletter lookup for one folder group.
///
/// Addresses are matched exactly, including case. Addresses owned by
/// newsletters scanned in other folders are kept apart so they are never
/// auto-provisioned a second time.
#[derive(Debug, Clone, Default)]
pub struct SenderMap {
    by_address: HashMap<String, Newsletter>,
    foreign: HashSet<String>,
}

impl SenderMap {
    /// Builds the map from the newsletters of a folder group.
    #[must_use]
    pub fn from_newsletters(newsletters: &[Newsletter]) -> Self {
        let mut map = Self::default();
        for newsletter in newsletters {
            map.register(newsletter.clone());
        }
        map
    }

    /// Adds every sender of a newsletter.
    pub fn register(&mut self, newsletter: Newsletter) {
        for email in newsletter.sender_emails() {
            self.by_address.insert(email.to_string(), newsletter.clone());
        }
    }

    /// Marks addresses that belong to newsletters of other folders.
    pub fn exclude<I, S>(&mut self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.foreign.extend(addresses.into_iter().map(Into::into));
    }

    /// Returns true if the address belongs to a newsletter of another folder.
    #[must_use]
    pub fn is_foreign(&self, address: &str) -> bool {
        !self.by_address.contains_key(address) && self.foreign.contains(address)
    }

    /// Looks a sender address up.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&Newsletter> {
        self.by_address.get(address)
    }

    /// Number of known addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    /// Returns true if no address is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

/// Outcome of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The sender belongs to an existing newsletter.
    Known(Newsletter),
    /// A newsletter was created for the sender.
    Provisioned(Newsletter),
    /// The sender belongs to a newsletter scanned in another folder.
    OtherFolder,
    /// The sender is unknown and auto-add is off.
    Unmatched,
}

impl Classification {
    /// The resolved newsletter, if any.
    #[must_use]
    pub const fn newsletter(&self) -> Option<&Newsletter> {
        match self {
            Self::Known(newsletter) | Self::Provisioned(newsletter) => Some(newsletter),
            Self::OtherFolder | Self::Unmatched => None,
        }
    }
}

/// Resolves the newsletter a message belongs to.
///
/// With `auto_add` set, an unknown sender gets a new newsletter named after
/// its display name (or address) with the sender as its only address. The
/// new newsletter is registered in `senders` so later messages from the
/// same address reuse it.
///
/// # Errors
///
/// Returns an error if a new newsletter could not be stored.
pub async fn classify<N: NewsletterStore + ?Sized>(
    store: &N,
    senders: &mut SenderMap,
    message: &DecodedMessage,
    auto_add: bool,
) -> Result<Classification> {
    if let Some(newsletter) = senders.get(&message.sender) {
        return Ok(Classification::Known(newsletter.clone()));
    }
    if senders.is_foreign(&message.sender) {
        return Ok(Classification::OtherFolder);
    }
    if !auto_add {
        return Ok(Classification::Unmatched);
    }

    let name = message
        .sender_name
        .clone()
        .unwrap_or_else(|| message.sender.clone());
    info!(sender = %message.sender, %name, "Auto-adding newsletter for new sender");

    let newsletter = store
        .create_newsletter(&NewsletterData::new(name, vec![message.sender.clone()]))
        .await?;
    senders.register(newsletter.clone());
    Ok(Classification::Provisioned(newsletter))
}
