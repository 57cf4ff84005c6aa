//! Schedule data models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::message::Recipient;

/// Lifecycle state of a scheduled email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    /// Waiting for its time.
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Delivered.
    Sent,
    /// Cancelled before it was claimed.
    Cancelled,
    /// Delivery failed; not retried.
    Failed,
}

impl ScheduleStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Parses the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "sent" => Some(Self::Sent),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true once the row will not change again.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Sent | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A stored scheduled email.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEmail {
    /// Row id.
    pub id: i64,
    /// Recipients as submitted.
    pub recipients: Vec<Recipient>,
    /// Subject line.
    pub subject: String,
    /// Source HTML, prepared at send time.
    pub html_content: String,
    /// When the email becomes due.
    pub scheduled_for: DateTime<Utc>,
    /// Current state.
    pub status: ScheduleStatus,
    /// Failure message from the last attempt.
    pub last_error: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row last changed.
    pub updated_at: DateTime<Utc>,
}

impl ScheduledEmail {
    /// Returns true if the email is pending and its time has come.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Pending && self.scheduled_for <= now
    }
}
