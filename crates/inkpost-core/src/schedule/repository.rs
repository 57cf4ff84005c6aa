//! Schedule storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::warn;

use super::model::{ScheduleStatus, ScheduledEmail};
use crate::db::{self, parse_timestamp, timestamp};
use crate::message::Recipient;
use crate::{Error, Result};

const TABLE: &str = "scheduled_emails";

const COLUMNS: &str =
    "id, recipients, subject, html_content, scheduled_for, status, last_error, created_at, updated_at";

/// Repository for scheduled emails.
#[derive(Debug, Clone)]
pub struct ScheduleRepository {
    pool: SqlitePool,
}

impl ScheduleRepository {
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
            CREATE TABLE IF NOT EXISTS scheduled_emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipients TEXT NOT NULL,
                subject TEXT NOT NULL,
                html_content TEXT NOT NULL,
                scheduled_for TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Index for the due-scan
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_scheduled_due ON scheduled_emails(status, scheduled_for)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store an email for later delivery. Returns the new row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn schedule(
        &self,
        recipients: &[Recipient],
        subject: &str,
        html_content: &str,
        scheduled_for: DateTime<Utc>,
    ) -> Result<i64> {
        let now = timestamp(Utc::now());

        let result = sqlx::query(
            r"
            INSERT INTO scheduled_emails
                (recipients, subject, html_content, scheduled_for, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'pending', ?, ?)
            ",
        )
        .bind(serde_json::to_string(recipients)?)
        .bind(subject)
        .bind(html_content)
        .bind(timestamp(scheduled_for))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Pending emails whose time is at or before `now`, earliest first.
    ///
    /// Rows that cannot be decoded are marked `failed` with the reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEmail>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM scheduled_emails \
             WHERE status = 'pending' AND scheduled_for <= ? \
             ORDER BY scheduled_for ASC, id ASC"
        ))
        .bind(timestamp(now))
        .fetch_all(&self.pool)
        .await?;

        let mut due = Vec::with_capacity(rows.len());
        for row in &rows {
            match email_from_row(row) {
                Ok(email) => due.push(email),
                Err(e) => {
                    let id: i64 = row.get("id");
                    warn!(id, error = %e, "Failing unreadable scheduled email");
                    let reason = e.to_string();
                    self.transition(
                        id,
                        ScheduleStatus::Pending,
                        ScheduleStatus::Failed,
                        Some(&reason),
                    )
                    .await?;
                }
            }
        }
        Ok(due)
    }

    /// Move a pending email to `processing`.
    ///
    /// Returns false if the row is missing or was already claimed, cancelled or finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn claim(&self, id: i64) -> Result<bool> {
        self.transition(id, ScheduleStatus::Pending, ScheduleStatus::Processing, None)
            .await
    }

    /// Mark a claimed email as delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_sent(&self, id: i64) -> Result<bool> {
        self.transition(id, ScheduleStatus::Processing, ScheduleStatus::Sent, None)
            .await
    }

    /// Mark a claimed email as failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_failed(&self, id: i64, error: &str) -> Result<bool> {
        self.transition(
            id,
            ScheduleStatus::Processing,
            ScheduleStatus::Failed,
            Some(error),
        )
        .await
    }

    /// Cancel a pending email. Returns false if it is no longer pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn cancel(&self, id: i64) -> Result<bool> {
        self.transition(id, ScheduleStatus::Pending, ScheduleStatus::Cancelled, None)
            .await
    }

    #[cfg(test)]
    pub(crate) const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn transition(
        &self,
        id: i64,
        from: ScheduleStatus,
        to: ScheduleStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE scheduled_emails
            SET status = ?, last_error = ?, updated_at = ?
            WHERE id = ? AND status = ?
            ",
        )
        .bind(to.as_str())
        .bind(error)
        .bind(timestamp(Utc::now()))
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// All scheduled emails, earliest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<ScheduledEmail>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM scheduled_emails ORDER BY scheduled_for ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(readable).collect())
    }

    /// A single scheduled email by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored row cannot be decoded.
    pub async fn get(&self, id: i64) -> Result<Option<ScheduledEmail>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM scheduled_emails WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(email_from_row).transpose()
    }
}

fn readable(row: &SqliteRow) -> Option<ScheduledEmail> {
    email_from_row(row)
        .inspect_err(|e| warn!(error = %e, "Skipping unreadable scheduled email"))
        .ok()
}

fn email_from_row(row: &SqliteRow) -> Result<ScheduledEmail> {
    let corrupt = |reason: String| Error::CorruptRecord {
        table: TABLE,
        reason,
    };
    let id: i64 = row.get("id");
    let time = |column: &str| {
        parse_timestamp(row.get(column)).ok_or_else(|| corrupt(format!("row {id}: bad {column}")))
    };

    let recipients: Vec<Recipient> = serde_json::from_str(row.get::<&str, _>("recipients"))
        .map_err(|e| corrupt(format!("row {id}: recipients: {e}")))?;
    let status_text: &str = row.get("status");
    let status = ScheduleStatus::parse(status_text)
        .ok_or_else(|| corrupt(format!("row {id}: unknown status {status_text:?}")))?;

    Ok(ScheduledEmail {
        id,
        recipients,
        subject: row.get("subject"),
        html_content: row.get("html_content"),
        scheduled_for: time("scheduled_for")?,
        status,
        last_error: row.get("last_error"),
        created_at: time("created_at")?,
        updated_at: time("updated_at")?,
    })
}
