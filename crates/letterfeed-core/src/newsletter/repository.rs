//! Newsletter repository for newsletters, their senders and entries.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{debug, info};

use super::model::{
    Entry, NewEntry, Newsletter, NewsletterData, NewsletterId, NewsletterSummary, Sender,
};
use super::slug::sanitize_slug;
use crate::{Error, Result};
use crate::database::database_url;

/// Store contract used by the ingestion pipeline.
#[async_trait]
pub trait NewsletterStore: Send + Sync {
    /// Lists every newsletter with its senders.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn list_newsletters_with_senders(&self) -> Result<Vec<Newsletter>>;

    /// Finds the entry created from the given `Message-ID`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn find_entry_by_message_id(&self, message_id: &str) -> Result<Option<Entry>>;

    /// Stores a new entry for a newsletter.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be written, including when
    /// the `Message-ID` already exists.
    async fn create_entry(&self, entry: &NewEntry, newsletter_id: NewsletterId) -> Result<Entry>;

    /// Creates a newsletter with its senders.
    ///
    /// # Errors
    ///
    /// Returns an error if the newsletter could not be written.
    async fn create_newsletter(&self, data: &NewsletterData) -> Result<Newsletter>;
}

/// Repository for newsletters, senders and entries.
pub struct NewsletterRepository {
    pool: SqlitePool,
}

impl NewsletterRepository {
    /// Create a new repository on a database file path or `sqlite:` URL.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = database_url(database_path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS newsletters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT UNIQUE,
                search_folder TEXT,
                move_to_folder TEXT,
                extract_content INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS senders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                newsletter_id INTEGER NOT NULL
                    REFERENCES newsletters(id) ON DELETE CASCADE
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                newsletter_id INTEGER NOT NULL
                    REFERENCES newsletters(id) ON DELETE CASCADE,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                message_id TEXT NOT NULL UNIQUE,
                received_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Feed rendering reads entries newest first per newsletter
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_entries_newsletter_received
            ON entries(newsletter_id, received_at DESC)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_senders_newsletter
            ON senders(newsletter_id)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a newsletter with its senders.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_newsletter(&self, id: NewsletterId) -> Result<Option<Newsletter>> {
        let row = sqlx::query(
            r"
            SELECT id, name, slug, search_folder, move_to_folder,
                   extract_content, is_active, created_at
            FROM newsletters
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let senders = self.senders_of(id).await?;
                Ok(row_to_newsletter(&row, senders))
            }
            None => Ok(None),
        }
    }

    /// Get a newsletter by its slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_newsletter_by_slug(&self, slug: &str) -> Result<Option<Newsletter>> {
        let id: Option<i64> = sqlx::query("SELECT id FROM newsletters WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get("id"));

        match id {
            Some(id) => self.get_newsletter(NewsletterId::new(id)).await,
            None => Ok(None),
        }
    }

    /// List all newsletters with senders and entry counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[allow(clippy::cast_sign_loss)]
    pub async fn list_newsletters(&self) -> Result<Vec<NewsletterSummary>> {
        let rows = sqlx::query(
            r"
            SELECT n.id, n.name, n.slug, n.search_folder, n.move_to_folder,
                   n.extract_content, n.is_active, n.created_at,
                   (SELECT COUNT(*) FROM entries e WHERE e.newsletter_id = n.id)
                       AS entries_count
            FROM newsletters n
            ORDER BY n.id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut senders = self.all_senders().await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let id: i64 = row.get("id");
                let own = senders.remove(&id).unwrap_or_default();
                let newsletter = row_to_newsletter(row, own)?;
                Some(NewsletterSummary {
                    newsletter,
                    entries_count: row.get::<i64, _>("entries_count").max(0) as u64,
                })
            })
            .collect())
    }

    /// Replace a newsletter's fields and sender set.
    ///
    /// Senders missing from `data` are removed, new ones are added and
    /// existing ones keep their identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the newsletter does not exist and
    /// [`Error::Conflict`] if the slug or a sender belongs to another
    /// newsletter.
    pub async fn update_newsletter(
        &self,
        id: NewsletterId,
        data: &NewsletterData,
    ) -> Result<Newsletter> {
        let slug = data.slug.as_deref().and_then(sanitize_slug);
        let wanted = normalize_senders(&data.sender_emails);

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE newsletters
            SET name = ?, slug = ?, search_folder = ?, move_to_folder = ?,
                extract_content = ?
            WHERE id = ?
            ",
        )
        .bind(&data.name)
        .bind(&slug)
        .bind(non_empty(data.search_folder.as_deref()))
        .bind(non_empty(data.move_to_folder.as_deref()))
        .bind(data.extract_content)
        .bind(id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict(e, || format!("slug {slug:?} is already taken")))?;

        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(format!("newsletter {id}")));
        }

        let existing: Vec<String> =
            sqlx::query("SELECT email FROM senders WHERE newsletter_id = ?")
                .bind(id.0)
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|row| row.get("email"))
                .collect();

        for email in existing.iter().filter(|e| !wanted.contains(e)) {
            sqlx::query("DELETE FROM senders WHERE newsletter_id = ? AND email = ?")
                .bind(id.0)
                .bind(email)
                .execute(&mut *tx)
                .await?;
        }

        let added: Vec<String> = wanted
            .into_iter()
            .filter(|e| !existing.contains(e))
            .collect();
        insert_senders(&mut tx, id, &added).await?;

        tx.commit().await?;
        info!(newsletter_id = %id, "Updated newsletter");

        self.get_newsletter(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("newsletter {id}")))
    }

    /// Enable or disable a newsletter's feed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the newsletter does not exist.
    pub async fn set_active(&self, id: NewsletterId, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE newsletters SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("newsletter {id}")));
        }
        Ok(())
    }

    /// Delete a newsletter together with its senders and entries.
    ///
    /// Returns `false` if no such newsletter existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete_newsletter(&self, id: NewsletterId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM newsletters WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(newsletter_id = %id, "Deleted newsletter");
        }
        Ok(deleted)
    }

    /// List a newsletter's entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_entries(&self, newsletter_id: NewsletterId, limit: u32) -> Result<Vec<Entry>> {
        let rows = sqlx::query(
            r"
            SELECT id, newsletter_id, subject, body, message_id, received_at
            FROM entries
            WHERE newsletter_id = ?
            ORDER BY received_at DESC, id DESC
            LIMIT ?
            ",
        )
        .bind(newsletter_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_entry).collect())
    }

    async fn senders_of(&self, id: NewsletterId) -> Result<Vec<Sender>> {
        let rows = sqlx::query(
            "SELECT id, email, newsletter_id FROM senders WHERE newsletter_id = ? ORDER BY id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_sender).collect())
    }

    async fn all_senders(&self) -> Result<HashMap<i64, Vec<Sender>>> {
        let rows = sqlx::query("SELECT id, email, newsletter_id FROM senders ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut by_newsletter: HashMap<i64, Vec<Sender>> = HashMap::new();
        for sender in rows.iter().map(row_to_sender) {
            by_newsletter
                .entry(sender.newsletter_id.0)
                .or_default()
                .push(sender);
        }
        Ok(by_newsletter)
    }
}

#[async_trait]
impl NewsletterStore for NewsletterRepository {
    async fn list_newsletters_with_senders(&self) -> Result<Vec<Newsletter>> {
        Ok(self
            .list_newsletters()
            .await?
            .into_iter()
            .map(|summary| summary.newsletter)
            .collect())
    }

    async fn find_entry_by_message_id(&self, message_id: &str) -> Result<Option<Entry>> {
        let row = sqlx::query(
            r"
            SELECT id, newsletter_id, subject, body, message_id, received_at
            FROM entries
            WHERE message_id = ?
            ",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(row_to_entry))
    }

    async fn create_entry(&self, entry: &NewEntry, newsletter_id: NewsletterId) -> Result<Entry> {
        let received_at = entry.received_at.unwrap_or_else(Utc::now);

        let result = sqlx::query(
            r"
            INSERT INTO entries (newsletter_id, subject, body, message_id, received_at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(newsletter_id.0)
        .bind(&entry.subject)
        .bind(&entry.body)
        .bind(&entry.message_id)
        .bind(received_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict(e, || format!("entry {} already exists", entry.message_id)))?;

        debug!(%newsletter_id, message_id = %entry.message_id, "Created entry");

        Ok(Entry {
            id: result.last_insert_rowid(),
            newsletter_id,
            subject: entry.subject.clone(),
            body: entry.body.clone(),
            message_id: entry.message_id.clone(),
            received_at,
        })
    }

    async fn create_newsletter(&self, data: &NewsletterData) -> Result<Newsletter> {
        let slug = data.slug.as_deref().and_then(sanitize_slug);
        let senders = normalize_senders(&data.sender_emails);

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            INSERT INTO newsletters (name, slug, search_folder, move_to_folder,
                                     extract_content, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            ",
        )
        .bind(&data.name)
        .bind(&slug)
        .bind(non_empty(data.search_folder.as_deref()))
        .bind(non_empty(data.move_to_folder.as_deref()))
        .bind(data.extract_content)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict(e, || format!("slug {slug:?} is already taken")))?;

        let id = NewsletterId::new(result.last_insert_rowid());
        insert_senders(&mut tx, id, &senders).await?;
        tx.commit().await?;

        info!(newsletter_id = %id, name = %data.name, "Created newsletter");

        self.get_newsletter(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("newsletter {id}")))
    }
}

async fn insert_senders(
    tx: &mut Transaction<'_, Sqlite>,
    id: NewsletterId,
    emails: &[String],
) -> Result<()> {
    for email in emails {
        sqlx::query("INSERT INTO senders (email, newsletter_id) VALUES (?, ?)")
            .bind(email)
            .bind(id.0)
            .execute(&mut **tx)
            .await
            .map_err(|e| conflict(e, || format!("sender {email} already belongs to a newsletter")))?;
    }
    Ok(())
}

/// Trims, drops blanks and removes duplicates while keeping order.
fn normalize_senders(emails: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    emails
        .iter()
        .map(|email| email.trim())
        .filter(|email| !email.is_empty() && seen.insert(*email))
        .map(ToString::to_string)
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn conflict(err: sqlx::Error, message: impl FnOnce() -> String) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(message()),
        _ => Error::Database(err),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    Some(DateTime::parse_from_rfc3339(value).ok()?.with_timezone(&Utc))
}

/// Convert a database row to a `Newsletter`.
fn row_to_newsletter(row: &SqliteRow, senders: Vec<Sender>) -> Option<Newsletter> {
    let created_at: String = row.get("created_at");
    Some(Newsletter {
        id: NewsletterId::new(row.get("id")),
        name: row.get("name"),
        slug: row.get("slug"),
        search_folder: row.get("search_folder"),
        move_to_folder: row.get("move_to_folder"),
        extract_content: row.get("extract_content"),
        is_active: row.get("is_active"),
        created_at: parse_timestamp(&created_at)?,
        senders,
    })
}

fn row_to_sender(row: &SqliteRow) -> Sender {
    Sender {
        id: row.get("id"),
        email: row.get("email"),
        newsletter_id: NewsletterId::new(row.get("newsletter_id")),
    }
}

fn row_to_entry(row: &SqliteRow) -> Option<Entry> {
    let received_at: String = row.get("received_at");
    Some(Entry {
        id: row.get("id"),
        newsletter_id: NewsletterId::new(row.get("newsletter_id")),
        subject: row.get("subject"),
        body: row.get("body"),
        message_id: row.get("message_id"),
        received_at: parse_timestamp(&received_at)?,
    })
}
