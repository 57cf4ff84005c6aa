//! Command-line argument parsing helpers.

use chrono::{DateTime, Utc};
use inkpost_core::Recipient;

/// Parses `a@example.com` or `Name <a@example.com>`.
pub fn parse_recipient(arg: &str) -> Result<Recipient, String> {
    let arg = arg.trim();
    let Some(open) = arg.rfind('<') else {
        return if arg.is_empty() {
            Err("empty recipient".to_string())
        } else {
            Ok(Recipient::Plain(arg.to_string()))
        };
    };
    let Some(email) = arg[open + 1..].strip_suffix('>') else {
        return Err(format!("unterminated address in {arg:?}"));
    };
    let name = arg[..open].trim().trim_matches('"').trim();
    Ok(Recipient::Named {
        email: email.trim().to_string(),
        name: (!name.is_empty()).then(|| name.to_string()),
    })
}

/// Parses an RFC 3339 timestamp such as `2025-01-31T09:00:00Z`.
pub fn parse_time(arg: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(arg.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("{arg:?}: {e}"))
}
