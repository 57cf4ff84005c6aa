//! Message model shared by the pipeline, dispatcher and stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A recipient as supplied by callers: either a bare address or an
/// address with a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    /// `"a@example.com"`.
    Plain(String),
    /// `{ "email": "a@example.com", "name": "Ann" }`.
    Named {
        /// Address.
        email: String,
        /// Display name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl Recipient {
    /// Resolves the recipient into its canonical mailbox.
    #[must_use]
    pub fn resolve(&self) -> Mailbox {
        match self {
            Self::Plain(email) => Mailbox::new(email),
            Self::Named { email, name } => Mailbox {
                email: email.trim().to_string(),
                name: name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string),
            },
        }
    }
}

impl From<&str> for Recipient {
    fn from(email: &str) -> Self {
        Self::Plain(email.to_string())
    }
}

/// Canonical address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    /// Address.
    pub email: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Mailbox {
    /// Creates a mailbox without a display name.
    #[must_use]
    pub fn new(email: impl AsRef<str>) -> Self {
        Self {
            email: email.as_ref().trim().to_string(),
            name: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.trim().is_empty()).then(|| name.trim().to_string());
        self
    }

    /// Formats the mailbox for an address header.
    #[must_use]
    pub fn header_value(&self) -> String {
        inkpost_mime::format_mailbox(self.name.as_deref(), &self.email)
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Where an attachment's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentPayload {
    /// Decoded bytes, ready to send.
    Bytes(Vec<u8>),
    /// Fetched by the dispatcher at send time.
    Remote(Url),
}

/// An inline image referenced from the HTML body by `cid:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    /// Content-ID, unique within the message, without angle brackets.
    pub content_id: String,
    /// Suggested filename.
    pub filename: String,
    /// MIME type, e.g. `image/png`.
    pub content_type: String,
    /// Rendered in place rather than offered as a download.
    pub inline: bool,
    /// Image bytes or their location.
    pub payload: AttachmentPayload,
}

impl AttachmentDescriptor {
    /// Returns true if the bytes still have to be fetched.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self.payload, AttachmentPayload::Remote(_))
    }
}

/// Image statistics reported to callers and stored with history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    /// Inline `data:` images attached.
    pub base64_count: u32,
    /// Remote images attached.
    pub url_count: u32,
    /// Total attached image payload in KiB.
    pub total_size_kb: f64,
}

impl ImageInfo {
    /// Adds `len` bytes to the total size.
    #[allow(clippy::cast_precision_loss)]
    pub fn add_bytes(&mut self, len: usize) {
        self.total_size_kb += len as f64 / 1024.0;
    }

    /// Total size rounded to two decimals.
    #[must_use]
    pub fn rounded_kb(&self) -> f64 {
        (self.total_size_kb * 100.0).round() / 100.0
    }
}

/// A fully prepared message, owned by the dispatcher until sent.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Sender.
    pub from: Mailbox,
    /// Recipients.
    pub to: Vec<Mailbox>,
    /// Subject line.
    pub subject: String,
    /// Final HTML with `cid:` references.
    pub html_body: String,
    /// Plaintext alternative.
    pub plaintext_body: String,
    /// Inline images in document order.
    pub attachments: Vec<AttachmentDescriptor>,
}

/// SMTP envelope for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Reverse path.
    pub from: String,
    /// Forward paths.
    pub to: Vec<String>,
    /// Message-ID of the payload, without angle brackets.
    pub message_id: String,
}

/// What remains of a message after the transport accepted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Provider message id (queue id or Message-ID).
    pub message_id: String,
    /// When the transport accepted the message.
    pub accepted_at: DateTime<Utc>,
}
