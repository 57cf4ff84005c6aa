//! Outbound transport seam.

use async_trait::async_trait;

use crate::message::{Envelope, Receipt};

/// Whether retrying the same message later could succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Network failure, timeout, or a 4xx reply.
    Transient,
    /// Authentication failure, 5xx reply, or a bad address or setting.
    Permanent,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        })
    }
}

/// Errors that abort delivery of a message.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connecting, TLS, or greeting failed.
    #[error("Connection failed: {0}")]
    Connection(inkpost_smtp::Error),

    /// The server refused the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(inkpost_smtp::Error),

    /// The server refused the sender, a recipient, or the message.
    #[error("Send failed: {0}")]
    Rejected(inkpost_smtp::Error),

    /// An address could not be used in the envelope.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Transport settings are incomplete or unusable.
    #[error("Transport misconfigured: {0}")]
    Configuration(String),
}

impl TransportError {
    /// Classifies the failure.
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Connection(e) | Self::Authentication(e) | Self::Rejected(e) => {
                if e.is_transient() {
                    TransportErrorKind::Transient
                } else {
                    TransportErrorKind::Permanent
                }
            }
            Self::InvalidAddress(_) | Self::Configuration(_) => TransportErrorKind::Permanent,
        }
    }
}

/// Hands an assembled message to a mail server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers `raw` (a complete RFC 5322 message) to the envelope
    /// recipients.
    async fn send(&self, envelope: &Envelope, raw: &[u8]) -> Result<Receipt, TransportError>;
}
