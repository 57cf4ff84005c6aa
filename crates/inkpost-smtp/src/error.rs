//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// An operation did not finish within its deadline.
    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(Duration, &'static str),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message too large.
    #[error("Message exceeds size limit: {size} bytes (server limit {limit})")]
    MessageTooLarge {
        /// Message size in bytes.
        size: usize,
        /// Limit advertised by the server.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if retrying later could succeed.
    ///
    /// Network failures, timeouts and 4xx replies are transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Io(_) | Self::Timeout(..) => true,
            Self::SmtpError { code, .. } => *code >= 400 && *code < 500,
            _ => false,
        }
    }

    /// Returns true if this is a permanent failure (5xx, bad input, TLS, protocol).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::smtp_error(451, "try later").is_transient());
        assert!(Error::smtp_error(535, "bad credentials").is_permanent());
        assert!(Error::Timeout(Duration::from_secs(10), "greeting").is_transient());
        assert!(Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused)).is_transient());
        assert!(Error::InvalidAddress("x".into()).is_permanent());
    }
}
