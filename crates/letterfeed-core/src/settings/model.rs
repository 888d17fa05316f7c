//! Settings data models.

use std::collections::BTreeSet;
use std::fmt;

use crate::{Error, Result};

/// Prefix shared by every settings override variable.
pub const ENV_PREFIX: &str = "LETTERFEED_";

/// Default mailbox scanned for newsletters.
pub const DEFAULT_SEARCH_FOLDER: &str = "INBOX";

/// Default polling interval, in minutes.
pub const DEFAULT_CHECK_INTERVAL: u32 = 15;

/// A single settings field, used to report environment locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingsField {
    /// IMAP server host name.
    ImapServer,
    /// IMAP login name.
    ImapUsername,
    /// IMAP password.
    ImapPassword,
    /// Default folder to scan.
    SearchFolder,
    /// Default folder to move processed mail to.
    MoveToFolder,
    /// Mark processed mail as read.
    MarkAsRead,
    /// Polling interval in minutes.
    EmailCheckInterval,
    /// Create newsletters for unknown senders.
    AutoAddNewSenders,
}

impl SettingsField {
    /// Every field, in storage order.
    pub const ALL: [Self; 8] = [
        Self::ImapServer,
        Self::ImapUsername,
        Self::ImapPassword,
        Self::SearchFolder,
        Self::MoveToFolder,
        Self::MarkAsRead,
        Self::EmailCheckInterval,
        Self::AutoAddNewSenders,
    ];

    /// Column and field name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ImapServer => "imap_server",
            Self::ImapUsername => "imap_username",
            Self::ImapPassword => "imap_password",
            Self::SearchFolder => "search_folder",
            Self::MoveToFolder => "move_to_folder",
            Self::MarkAsRead => "mark_as_read",
            Self::EmailCheckInterval => "email_check_interval",
            Self::AutoAddNewSenders => "auto_add_new_senders",
        }
    }

    /// Environment variable that overrides this field.
    #[must_use]
    pub fn env_var(&self) -> String {
        format!("{ENV_PREFIX}{}", self.as_str().to_uppercase())
    }

    /// Looks a field up by its environment variable name.
    #[must_use]
    pub fn from_env_var(name: &str) -> Option<Self> {
        let field = name.strip_prefix(ENV_PREFIX)?.to_lowercase();
        Self::ALL.into_iter().find(|f| f.as_str() == field)
    }
}

impl fmt::Display for SettingsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stored settings record.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// IMAP server host name.
    pub imap_server: String,
    /// IMAP login name.
    pub imap_username: String,
    /// IMAP password, if one was ever stored.
    pub imap_password: Option<String>,
    /// Default folder to scan.
    pub search_folder: String,
    /// Default folder to move processed mail to.
    pub move_to_folder: Option<String>,
    /// Mark processed mail as read.
    pub mark_as_read: bool,
    /// Polling interval in minutes.
    pub email_check_interval: u32,
    /// Create newsletters for unknown senders.
    pub auto_add_new_senders: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            imap_server: String::new(),
            imap_username: String::new(),
            imap_password: None,
            search_folder: DEFAULT_SEARCH_FOLDER.to_string(),
            move_to_folder: None,
            mark_as_read: false,
            email_check_interval: DEFAULT_CHECK_INTERVAL,
            auto_add_new_senders: false,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("imap_server", &self.imap_server)
            .field("imap_username", &self.imap_username)
            .field("imap_password", &redacted(self.imap_password.as_ref()))
            .field("search_folder", &self.search_folder)
            .field("move_to_folder", &self.move_to_folder)
            .field("mark_as_read", &self.mark_as_read)
            .field("email_check_interval", &self.email_check_interval)
            .field("auto_add_new_senders", &self.auto_add_new_senders)
            .finish()
    }
}

/// Values supplied by the process environment.
///
/// Every field set here wins over the stored record and is reported as
/// locked.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    /// IMAP server host name.
    pub imap_server: Option<String>,
    /// IMAP login name.
    pub imap_username: Option<String>,
    /// IMAP password.
    pub imap_password: Option<String>,
    /// Default folder to scan.
    pub search_folder: Option<String>,
    /// Default move folder. An empty value locks the field to "no move".
    pub move_to_folder: Option<String>,
    /// Mark processed mail as read.
    pub mark_as_read: Option<bool>,
    /// Polling interval in minutes.
    pub email_check_interval: Option<u32>,
    /// Create newsletters for unknown senders.
    pub auto_add_new_senders: Option<bool>,
}

impl SettingsOverrides {
    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Reads overrides from `(name, value)` pairs.
    ///
    /// Names outside the settings namespace are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or numeric variable cannot be parsed.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut overrides = Self::default();
        for (name, value) in vars {
            let Some(field) = SettingsField::from_env_var(name.as_ref()) else {
                continue;
            };
            let value: String = value.into();
            match field {
                SettingsField::ImapServer => overrides.imap_server = Some(value),
                SettingsField::ImapUsername => overrides.imap_username = Some(value),
                SettingsField::ImapPassword => overrides.imap_password = Some(value),
                SettingsField::SearchFolder => overrides.search_folder = Some(value),
                SettingsField::MoveToFolder => overrides.move_to_folder = Some(value),
                SettingsField::MarkAsRead => {
                    overrides.mark_as_read = Some(parse_bool(field, &value)?);
                }
                SettingsField::EmailCheckInterval => {
                    let minutes = value.trim().parse().map_err(|_| invalid(field, &value))?;
                    overrides.email_check_interval = Some(minutes);
                }
                SettingsField::AutoAddNewSenders => {
                    overrides.auto_add_new_senders = Some(parse_bool(field, &value)?);
                }
            }
        }
        Ok(overrides)
    }

    /// Fields that carry an override.
    #[must_use]
    pub fn fields(&self) -> BTreeSet<SettingsField> {
        let set = [
            (SettingsField::ImapServer, self.imap_server.is_some()),
            (SettingsField::ImapUsername, self.imap_username.is_some()),
            (SettingsField::ImapPassword, self.imap_password.is_some()),
            (SettingsField::SearchFolder, self.search_folder.is_some()),
            (SettingsField::MoveToFolder, self.move_to_folder.is_some()),
            (SettingsField::MarkAsRead, self.mark_as_read.is_some()),
            (
                SettingsField::EmailCheckInterval,
                self.email_check_interval.is_some(),
            ),
            (
                SettingsField::AutoAddNewSenders,
                self.auto_add_new_senders.is_some(),
            ),
        ];
        set.into_iter()
            .filter_map(|(field, present)| present.then_some(field))
            .collect()
    }
}

impl fmt::Debug for SettingsOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsOverrides")
            .field("imap_server", &self.imap_server)
            .field("imap_username", &self.imap_username)
            .field("imap_password", &redacted(self.imap_password.as_ref()))
            .field("search_folder", &self.search_folder)
            .field("move_to_folder", &self.move_to_folder)
            .field("mark_as_read", &self.mark_as_read)
            .field("email_check_interval", &self.email_check_interval)
            .field("auto_add_new_senders", &self.auto_add_new_senders)
            .finish()
    }
}

/// Effective settings handed to the ingestion pipeline.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    /// IMAP server host name.
    pub imap_server: String,
    /// IMAP login name.
    pub imap_username: String,
    /// IMAP password. Only present when the secret was requested.
    pub imap_password: Option<String>,
    /// Default folder to scan.
    pub search_folder: String,
    /// Default folder to move processed mail to.
    pub move_to_folder: Option<String>,
    /// Mark processed mail as read.
    pub mark_as_read: bool,
    /// Polling interval in minutes.
    pub email_check_interval: u32,
    /// Create newsletters for unknown senders.
    pub auto_add_new_senders: bool,
    /// Fields pinned by the environment.
    pub locked_fields: BTreeSet<SettingsField>,
}

impl ResolvedSettings {
    /// Builds the resolved view of a merged record.
    #[must_use]
    pub fn new(
        settings: Settings,
        locked_fields: BTreeSet<SettingsField>,
        include_secret: bool,
    ) -> Self {
        Self {
            imap_server: settings.imap_server,
            imap_username: settings.imap_username,
            imap_password: settings.imap_password.filter(|_| include_secret),
            search_folder: settings.search_folder,
            move_to_folder: settings.move_to_folder,
            mark_as_read: settings.mark_as_read,
            email_check_interval: settings.email_check_interval,
            auto_add_new_senders: settings.auto_add_new_senders,
            locked_fields,
        }
    }

    /// Returns true when server, username and password are all present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.imap_server.trim().is_empty()
            && !self.imap_username.is_empty()
            && self.imap_password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Returns true if the field is pinned by the environment.
    #[must_use]
    pub fn is_locked(&self, field: SettingsField) -> bool {
        self.locked_fields.contains(&field)
    }
}

impl fmt::Debug for ResolvedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSettings")
            .field("imap_server", &self.imap_server)
            .field("imap_username", &self.imap_username)
            .field("imap_password", &redacted(self.imap_password.as_ref()))
            .field("search_folder", &self.search_folder)
            .field("move_to_folder", &self.move_to_folder)
            .field("mark_as_read", &self.mark_as_read)
            .field("email_check_interval", &self.email_check_interval)
            .field("auto_add_new_senders", &self.auto_add_new_senders)
            .field("locked_fields", &self.locked_fields)
            .finish()
    }
}

fn redacted(secret: Option<&String>) -> Option<&'static str> {
    secret.map(|_| "<redacted>")
}

fn parse_bool(field: SettingsField, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(field, value)),
    }
}

fn invalid(field: SettingsField, value: &str) -> Error {
    Error::Config(format!("invalid value {value:?} for {}", field.env_var()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_names() {
        assert_eq!(SettingsField::MarkAsRead.env_var(), "LETTERFEED_MARK_AS_READ");
        assert_eq!(
            SettingsField::from_env_var("LETTERFEED_IMAP_SERVER"),
            Some(SettingsField::ImapServer)
        );
        assert_eq!(SettingsField::from_env_var("LETTERFEED_DATABASE_URL"), None);
        assert_eq!(SettingsField::from_env_var("IMAP_SERVER"), None);
    }

    #[test]
    fn test_overrides_from_vars() {
        let overrides = SettingsOverrides::from_vars([
            ("LETTERFEED_IMAP_SERVER", "imap.example.com"),
            ("LETTERFEED_MARK_AS_READ", "yes"),
            ("LETTERFEED_AUTO_ADD_NEW_SENDERS", "0"),
            ("LETTERFEED_EMAIL_CHECK_INTERVAL", "5"),
            ("LETTERFEED_DATABASE_URL", "other.db"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap();

        assert_eq!(overrides.imap_server.as_deref(), Some("imap.example.com"));
        assert_eq!(overrides.mark_as_read, Some(true));
        assert_eq!(overrides.auto_add_new_senders, Some(false));
        assert_eq!(overrides.email_check_interval, Some(5));
        assert_eq!(overrides.fields().len(), 4);
    }

    #[test]
    fn test_overrides_reject_bad_values() {
        assert!(SettingsOverrides::from_vars([("LETTERFEED_MARK_AS_READ", "maybe")]).is_err());
        assert!(
            SettingsOverrides::from_vars([("LETTERFEED_EMAIL_CHECK_INTERVAL", "soon")]).is_err()
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = Settings {
            imap_password: Some("hunter2".to_string()),
            ..Settings::default()
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));

        let resolved = ResolvedSettings::new(settings, BTreeSet::new(), true);
        assert!(!format!("{resolved:?}").contains("hunter2"));
    }

    #[test]
    fn test_resolved_hides_secret_unless_requested() {
        let settings = Settings {
            imap_server: "imap.example.com".to_string(),
            imap_username: "me".to_string(),
            imap_password: Some("pw".to_string()),
            ..Settings::default()
        };

        let public = ResolvedSettings::new(settings.clone(), BTreeSet::new(), false);
        assert!(public.imap_password.is_none());
        assert!(!public.is_configured());

        let private = ResolvedSettings::new(settings, BTreeSet::new(), true);
        assert_eq!(private.imap_password.as_deref(), Some("pw"));
        assert!(private.is_configured());
    }
}
