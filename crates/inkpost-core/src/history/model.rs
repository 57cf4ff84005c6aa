//! History data models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::message::{ImageInfo, Mailbox};

/// Length of the stored HTML preview, in characters.
pub const PREVIEW_CHARS: usize = 500;

/// Final state of a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Accepted by the transport.
    Sent,
    /// Failed; see the error text.
    Failed,
}

impl DeliveryStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Parses the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A send attempt to be recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    /// Recipients.
    pub recipients: Vec<Mailbox>,
    /// Subject line.
    pub subject: String,
    /// Sender address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: Option<String>,
    /// Outcome.
    pub status: DeliveryStatus,
    /// Provider message id when sent.
    pub provider_message_id: Option<String>,
    /// Start of the final HTML.
    pub content_preview_html: String,
    /// Image statistics.
    pub image_info: ImageInfo,
    /// Failure message.
    pub error: Option<String>,
    /// When the attempt finished.
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Creates a record for an attempt that just finished.
    #[must_use]
    pub fn new(
        from: &Mailbox,
        recipients: Vec<Mailbox>,
        subject: impl Into<String>,
        html: &str,
        image_info: ImageInfo,
    ) -> Self {
        Self {
            recipients,
            subject: subject.into(),
            from_email: from.email.clone(),
            from_name: from.name.clone(),
            status: DeliveryStatus::Failed,
            provider_message_id: None,
            content_preview_html: html.chars().take(PREVIEW_CHARS).collect(),
            image_info,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Marks the record as sent.
    #[must_use]
    pub fn sent(mut self, message_id: impl Into<String>) -> Self {
        self.status = DeliveryStatus::Sent;
        self.provider_message_id = Some(message_id.into());
        self.error = None;
        self
    }

    /// Marks the record as failed.
    #[must_use]
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = DeliveryStatus::Failed;
        self.provider_message_id = None;
        self.error = Some(error.into());
        self
    }
}

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Row id.
    pub id: i64,
    /// Recorded attempt.
    #[serde(flatten)]
    pub record: DeliveryRecord,
}
