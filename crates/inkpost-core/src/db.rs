//! `SQLite` connection and timestamp helpers shared by the repositories.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::Result;

/// Opens (creating if needed) the database file at `database_path`.
pub(crate) async fn connect(database_path: &str) -> Result<SqlitePool> {
    let url = format!("sqlite:{database_path}?mode=rwc");
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    Ok(pool)
}

/// Opens a private in-memory database.
pub(crate) async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

/// Fixed-width RFC 3339 form, so stored timestamps compare correctly as text.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_sorts_as_text() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(timestamp(early) < timestamp(late));
        assert_eq!(timestamp(early), "2024-01-01T09:00:00.000000Z");
        assert_eq!(parse_timestamp(&timestamp(late)), Some(late));
    }
}
