//! Send request validation.
//!
//! Runs before any pipeline work; a request that fails here never touches
//! the network.

use crate::message::Mailbox;

/// Validation error for a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// No recipients given.
    NoRecipients,
    /// A recipient address is malformed.
    InvalidRecipient,
    /// Subject is empty.
    EmptySubject,
    /// HTML body is empty.
    EmptyBody,
    /// Sender address is missing or malformed.
    InvalidSender,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::NoRecipients => "At least one recipient is required",
            Self::InvalidRecipient => "Invalid recipient email address",
            Self::EmptySubject => "Subject is required",
            Self::EmptyBody => "Email content is required",
            Self::InvalidSender => "Sender email address is not configured correctly",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::NoRecipients | Self::InvalidRecipient => "to",
            Self::EmptySubject => "subject",
            Self::EmptyBody => "html",
            Self::InvalidSender => "from",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a request.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Joins the messages of `errors` into one line.
#[must_use]
pub fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::message)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Basic address shape check: exactly one `@`, non-empty local part and
/// domain, no whitespace or angle brackets.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !email
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
}

/// Validate a send request.
///
/// # Errors
///
/// Returns every validation error found, in field order.
pub fn validate_send(
    from: &Mailbox,
    to: &[Mailbox],
    subject: &str,
    html: &str,
) -> ValidationResult {
    let mut errors = Vec::new();

    if to.is_empty() {
        errors.push(ValidationError::NoRecipients);
    } else if to.iter().any(|m| !is_valid_email(&m.email)) {
        errors.push(ValidationError::InvalidRecipient);
    }

    if subject.trim().is_empty() {
        errors.push(ValidationError::EmptySubject);
    }

    if html.trim().is_empty() {
        errors.push(ValidationError::EmptyBody);
    }

    if !is_valid_email(&from.email) {
        errors.push(ValidationError::InvalidSender);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
