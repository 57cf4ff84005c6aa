//! SMTP password storage in the system keyring.
//!
//! Uses the platform's native credential storage:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::debug;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "inkpost";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Generates the keyring entry key for an SMTP login.
fn credential_key(host: &str, username: &str) -> String {
    format!("smtp_{username}@{host}")
}

/// Stores an SMTP password in the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_smtp_password(host: &str, username: &str, password: &str) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, &credential_key(host, username))?;
    entry.set_password(password)?;
    debug!(host, username, "Stored SMTP password");
    Ok(())
}

/// Retrieves an SMTP password from the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails for any reason other
/// than a missing entry.
pub fn get_smtp_password(host: &str, username: &str) -> CredentialResult<Option<String>> {
    let entry = Entry::new(SERVICE_NAME, &credential_key(host, username))?;
    match entry.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => {
            debug!(host, username, "No SMTP password in keyring");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Deletes a stored SMTP password. A missing entry is not an error.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn delete_smtp_password(host: &str, username: &str) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, &credential_key(host, username))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_key_format() {
        assert_eq!(credential_key("smtp.example.com", "me"), "smtp_me@smtp.example.com");
    }
}
