//! Layering of environment overrides on top of stored settings.

use std::collections::BTreeSet;

use super::model::{Settings, SettingsField, SettingsOverrides};

/// Merges overrides into a base record.
///
/// Returns the merged record and the set of fields the overrides pinned.
/// An empty `move_to_folder` override clears the move folder.
#[must_use]
pub fn merge(base: &Settings, overrides: &SettingsOverrides) -> (Settings, BTreeSet<SettingsField>) {
    let merged = Settings {
        imap_server: pick(&base.imap_server, overrides.imap_server.as_ref()),
        imap_username: pick(&base.imap_username, overrides.imap_username.as_ref()),
        imap_password: overrides
            .imap_password
            .clone()
            .or_else(|| base.imap_password.clone()),
        search_folder: pick(&base.search_folder, overrides.search_folder.as_ref()),
        move_to_folder: match &overrides.move_to_folder {
            Some(folder) if folder.trim().is_empty() => None,
            Some(folder) => Some(folder.clone()),
            None => base.move_to_folder.clone(),
        },
        mark_as_read: overrides.mark_as_read.unwrap_or(base.mark_as_read),
        email_check_interval: overrides
            .email_check_interval
            .unwrap_or(base.email_check_interval),
        auto_add_new_senders: overrides
            .auto_add_new_senders
            .unwrap_or(base.auto_add_new_senders),
    };

    (merged, overrides.fields())
}

fn pick(base: &str, over: Option<&String>) -> String {
    over.map_or_else(|| base.to_string(), Clone::clone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> Settings {
        Settings {
            imap_server: "db.example.com".to_string(),
            imap_username: "db-user".to_string(),
            imap_password: Some("db-pass".to_string()),
            search_folder: "Newsletters".to_string(),
            move_to_folder: Some("Archive".to_string()),
            mark_as_read: true,
            email_check_interval: 30,
            auto_add_new_senders: false,
        }
    }

    #[test]
    fn test_merge_without_overrides_is_identity() {
        let (merged, locked) = merge(&stored(), &SettingsOverrides::default());
        assert_eq!(merged, stored());
        assert!(locked.is_empty());
    }

    #[test]
    fn test_merge_overrides_win_and_lock() {
        let overrides = SettingsOverrides {
            imap_server: Some("env.example.com".to_string()),
            imap_password: Some("env-pass".to_string()),
            auto_add_new_senders: Some(true),
            ..SettingsOverrides::default()
        };

        let (merged, locked) = merge(&stored(), &overrides);
        assert_eq!(merged.imap_server, "env.example.com");
        assert_eq!(merged.imap_username, "db-user");
        assert_eq!(merged.imap_password.as_deref(), Some("env-pass"));
        assert!(merged.auto_add_new_senders);
        assert_eq!(
            locked.into_iter().collect::<Vec<_>>(),
            vec![
                SettingsField::ImapServer,
                SettingsField::ImapPassword,
                SettingsField::AutoAddNewSenders
            ]
        );
    }

    #[test]
    fn test_merge_empty_move_folder_clears() {
        let overrides = SettingsOverrides {
            move_to_folder: Some(String::new()),
            ..SettingsOverrides::default()
        };
        let (merged, locked) = merge(&stored(), &overrides);
        assert!(merged.move_to_folder.is_none());
        assert!(locked.contains(&SettingsField::MoveToFolder));
    }
}
