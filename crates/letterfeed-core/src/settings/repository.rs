//! Settings repository for persistent storage of the singleton settings row.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use super::layered::merge;
use super::model::{
    DEFAULT_SEARCH_FOLDER, ResolvedSettings, Settings, SettingsField, SettingsOverrides,
};
use crate::Result;
use crate::database::database_url;

/// Source of the effective settings for an ingestion run.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Resolves stored settings with environment overrides applied.
    ///
    /// The IMAP password is only included when `include_secret` is true.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be loaded.
    async fn resolve(&self, include_secret: bool) -> Result<ResolvedSettings>;
}

/// Repository for the settings row.
pub struct SettingsRepository {
    pool: SqlitePool,
    overrides: SettingsOverrides,
}

impl SettingsRepository {
    /// Create a new repository on a database file path or `sqlite:` URL.
    ///
    /// Creates the database, the table and the settings row if they don't
    /// exist. The row is seeded from `overrides` on first open.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str, overrides: SettingsOverrides) -> Result<Self> {
        let url = database_url(database_path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool, overrides };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory(overrides: SettingsOverrides) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool, overrides };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                imap_server TEXT NOT NULL DEFAULT '',
                imap_username TEXT NOT NULL DEFAULT '',
                imap_password TEXT,
                search_folder TEXT NOT NULL DEFAULT 'INBOX',
                move_to_folder TEXT,
                mark_as_read INTEGER NOT NULL DEFAULT 0,
                email_check_interval INTEGER NOT NULL DEFAULT 15,
                auto_add_new_senders INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        let exists = sqlx::query("SELECT 1 FROM settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        if !exists {
            info!("No settings found, seeding defaults from the environment");
            let (seed, _) = merge(&Settings::default(), &self.overrides);
            self.write(&seed).await?;
        }

        Ok(())
    }

    /// Overrides applied on every read.
    #[must_use]
    pub const fn overrides(&self) -> &SettingsOverrides {
        &self.overrides
    }

    /// Get the stored record, without overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self) -> Result<Settings> {
        let row = sqlx::query(
            r"
            SELECT imap_server, imap_username, imap_password, search_folder,
                   move_to_folder, mark_as_read, email_check_interval,
                   auto_add_new_senders
            FROM settings
            WHERE id = 1
            ",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_settings(&row))
    }

    /// Update the stored record.
    ///
    /// Fields locked by the environment keep their stored value. The
    /// password is only replaced when `settings` carries a non-empty one.
    ///
    /// Returns the resolved view without the secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn update(&self, settings: &Settings) -> Result<ResolvedSettings> {
        let stored = self.get().await?;
        let locked = self.overrides.fields();
        debug!(?locked, "Updating settings");

        let keep = |field: SettingsField| locked.contains(&field);
        let next = Settings {
            imap_server: if keep(SettingsField::ImapServer) {
                stored.imap_server
            } else {
                settings.imap_server.clone()
            },
            imap_username: if keep(SettingsField::ImapUsername) {
                stored.imap_username
            } else {
                settings.imap_username.clone()
            },
            imap_password: match &settings.imap_password {
                Some(password) if !password.is_empty() && !keep(SettingsField::ImapPassword) => {
                    Some(password.clone())
                }
                _ => stored.imap_password,
            },
            search_folder: if keep(SettingsField::SearchFolder) {
                stored.search_folder
            } else {
                settings.search_folder.clone()
            },
            move_to_folder: if keep(SettingsField::MoveToFolder) {
                stored.move_to_folder
            } else {
                settings.move_to_folder.clone()
            },
            mark_as_read: if keep(SettingsField::MarkAsRead) {
                stored.mark_as_read
            } else {
                settings.mark_as_read
            },
            email_check_interval: if keep(SettingsField::EmailCheckInterval) {
                stored.email_check_interval
            } else {
                settings.email_check_interval
            },
            auto_add_new_senders: if keep(SettingsField::AutoAddNewSenders) {
                stored.auto_add_new_senders
            } else {
                settings.auto_add_new_senders
            },
        };

        self.write(&next).await?;
        info!("Settings updated");
        self.resolve(false).await
    }

    async fn write(&self, settings: &Settings) -> Result<()> {
        let search_folder = if settings.search_folder.trim().is_empty() {
            DEFAULT_SEARCH_FOLDER
        } else {
            settings.search_folder.as_str()
        };
        let move_to_folder = settings
            .move_to_folder
            .as_deref()
            .filter(|f| !f.trim().is_empty());

        sqlx::query(
            r"
            INSERT INTO settings (id, imap_server, imap_username, imap_password,
                                  search_folder, move_to_folder, mark_as_read,
                                  email_check_interval, auto_add_new_senders)
            VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                imap_server = excluded.imap_server,
                imap_username = excluded.imap_username,
                imap_password = excluded.imap_password,
                search_folder = excluded.search_folder,
                move_to_folder = excluded.move_to_folder,
                mark_as_read = excluded.mark_as_read,
                email_check_interval = excluded.email_check_interval,
                auto_add_new_senders = excluded.auto_add_new_senders
            ",
        )
        .bind(&settings.imap_server)
        .bind(&settings.imap_username)
        .bind(&settings.imap_password)
        .bind(search_folder)
        .bind(move_to_folder)
        .bind(settings.mark_as_read)
        .bind(i64::from(settings.email_check_interval))
        .bind(settings.auto_add_new_senders)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SettingsProvider for SettingsRepository {
    async fn resolve(&self, include_secret: bool) -> Result<ResolvedSettings> {
        let stored = self.get().await?;
        let (merged, locked) = merge(&stored, &self.overrides);
        debug!(?locked, "Resolved settings");
        Ok(ResolvedSettings::new(merged, locked, include_secret))
    }
}

/// Convert a database row to `Settings`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn row_to_settings(row: &sqlx::sqlite::SqliteRow) -> Settings {
    Settings {
        imap_server: row.get("imap_server"),
        imap_username: row.get("imap_username"),
        imap_password: row.get("imap_password"),
        search_folder: row.get("search_folder"),
        move_to_folder: row.get("move_to_folder"),
        mark_as_read: row.get("mark_as_read"),
        email_check_interval: row.get::<i64, _>("email_check_interval").max(1) as u32,
        auto_add_new_senders: row.get("auto_add_new_senders"),
    }
}
