//! History storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::warn;

use super::model::{DeliveryRecord, DeliveryStatus, HistoryEntry};
use crate::db::{self, parse_timestamp, timestamp};
use crate::message::ImageInfo;
use crate::Result;

const COLUMNS: &str = "id, recipients, subject, from_email, from_name, status, provider_message_id, \
     content_preview_html, base64_count, url_count, total_size_kb, error, created_at";

/// Repository for delivery history.
#[derive(Debug, Clone)]
pub struct HistoryRepository {
    pool: SqlitePool,
}

impl HistoryRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let repo = Self {
            pool: db::connect(database_path).await?,
        };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let repo = Self {
            pool: db::connect_in_memory().await?,
        };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS email_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipients TEXT NOT NULL,
                subject TEXT NOT NULL,
                from_email TEXT NOT NULL,
                from_name TEXT,
                status TEXT NOT NULL,
                provider_message_id TEXT,
                content_preview_html TEXT NOT NULL DEFAULT '',
                base64_count INTEGER NOT NULL DEFAULT 0,
                url_count INTEGER NOT NULL DEFAULT 0,
                total_size_kb REAL NOT NULL DEFAULT 0,
                error TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_history_created ON email_history(created_at)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a send attempt. Returns the new row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn record(&self, record: &DeliveryRecord) -> Result<i64> {
        let recipients = serde_json::to_string(&record.recipients)?;

        let result = sqlx::query(
            r"
            INSERT INTO email_history
                (recipients, subject, from_email, from_name, status, provider_message_id,
                 content_preview_html, base64_count, url_count, total_size_kb, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(recipients)
        .bind(&record.subject)
        .bind(&record.from_email)
        .bind(&record.from_name)
        .bind(record.status.as_str())
        .bind(&record.provider_message_id)
        .bind(&record.content_preview_html)
        .bind(record.image_info.base64_count)
        .bind(record.image_info.url_count)
        .bind(record.image_info.rounded_kb())
        .bind(&record.error)
        .bind(timestamp(record.created_at))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent attempts first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM email_history ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(entry_from_row).collect())
    }

    /// A single attempt by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: i64) -> Result<Option<HistoryEntry>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM email_history WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().and_then(entry_from_row))
    }
}

fn entry_from_row(row: &SqliteRow) -> Option<HistoryEntry> {
    let id: i64 = row.get("id");
    let Some(record) = record_from_row(row) else {
        warn!(id, "Skipping unreadable history row");
        return None;
    };
    Some(HistoryEntry { id, record })
}

fn record_from_row(row: &SqliteRow) -> Option<DeliveryRecord> {
    let recipients = serde_json::from_str(row.get::<&str, _>("recipients")).ok()?;
    let status = DeliveryStatus::parse(row.get("status"))?;
    let created_at = parse_timestamp(row.get("created_at"))?;
    Some(DeliveryRecord {
        recipients,
        subject: row.get("subject"),
        from_email: row.get("from_email"),
        from_name: row.get("from_name"),
        status,
        provider_message_id: row.get("provider_message_id"),
        content_preview_html: row.get("content_preview_html"),
        image_info: ImageInfo {
            base64_count: row.get("base64_count"),
            url_count: row.get("url_count"),
            total_size_kb: row.get("total_size_kb"),
        },
        error: row.get("error"),
        created_at,
    })
}
