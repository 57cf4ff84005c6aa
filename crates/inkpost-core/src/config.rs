//! Configuration file and defaults.
//!
//! ```toml
//! database_path = "/var/lib/inkpost/inkpost.db"
//!
//! [smtp]
//! host = "smtp.example.com"
//! port = 587
//! security = "starttls"
//! username = "news@example.com"
//!
//! [sender]
//! email = "news@example.com"
//! name = "Example News"
//!
//! [pipeline]
//! site_origin = "https://www.example.com"
//! cid_domain = "example.com"
//!
//! [timeouts]
//! fetch_secs = 10
//! send_secs = 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials;
use crate::message::Mailbox;
use crate::{Error, Result};

/// Environment variable consulted for the SMTP password.
pub const PASSWORD_ENV: &str = "INKPOST_SMTP_PASSWORD";

/// Security/encryption mode for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tls => 465,
            Self::StartTls => 587,
            Self::None => 25,
        }
    }
}

impl From<Security> for inkpost_smtp::Security {
    fn from(security: Security) -> Self {
        match security {
            Security::None => Self::None,
            Security::Tls => Self::Tls,
            Security::StartTls => Self::StartTls,
        }
    }
}

/// SMTP server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    /// Server hostname.
    pub host: String,
    /// Server port; derived from the security mode when unset.
    pub port: Option<u16>,
    /// Security mode.
    pub security: Security,
    /// Username for authentication. No AUTH is attempted when unset.
    pub username: Option<String>,
    /// Password. Prefer the environment or keyring over storing it here.
    pub password: Option<String>,
}

impl SmtpSettings {
    /// Port to connect to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }

    /// Resolves the password: config value, then `INKPOST_SMTP_PASSWORD`,
    /// then the system keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring cannot be queried.
    pub fn resolve_password(&self) -> Result<Option<String>> {
        if let Some(password) = self.password.clone().filter(|p| !p.is_empty()) {
            return Ok(Some(password));
        }
        if let Some(password) = std::env::var(PASSWORD_ENV).ok().filter(|p| !p.is_empty()) {
            debug!("Using SMTP password from {PASSWORD_ENV}");
            return Ok(Some(password));
        }
        match &self.username {
            Some(username) => Ok(credentials::get_smtp_password(&self.host, username)?),
            None => Ok(None),
        }
    }
}

/// Sender identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderSettings {
    /// From address.
    pub email: String,
    /// From display name.
    pub name: Option<String>,
}

impl SenderSettings {
    /// Sender as a mailbox.
    #[must_use]
    pub fn mailbox(&self) -> Mailbox {
        let mailbox = Mailbox::new(&self.email);
        match &self.name {
            Some(name) => mailbox.with_name(name),
            None => mailbox,
        }
    }
}

/// HTML pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Origin that site-relative image paths (`/img/x.png`) resolve against.
    pub site_origin: Option<String>,
    /// Image shown in place of images that cannot be used.
    pub placeholder_image_url: String,
    /// Domain part of generated Content-IDs and Message-IDs.
    pub cid_domain: String,
    /// Rewrite `http://` image URLs to `https://`.
    pub upgrade_http: bool,
    /// Run the allow-list sanitizer over incoming HTML.
    pub sanitize: bool,
    /// Largest remote image that will be attached.
    pub max_image_bytes: usize,
    /// Entries kept in the process-wide image cache.
    pub image_cache_entries: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            site_origin: None,
            placeholder_image_url: "https://placehold.co/600x300/png?text=Image".to_string(),
            cid_domain: "inkpost.local".to_string(),
            upgrade_http: true,
            sanitize: true,
            max_image_bytes: 5 * 1024 * 1024,
            image_cache_entries: 128,
        }
    }
}

/// Network timeouts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Per remote image fetch.
    pub fetch_secs: u64,
    /// Per SMTP operation.
    pub send_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fetch_secs: 10,
            send_secs: 10,
        }
    }
}

impl Timeouts {
    /// Fetch timeout.
    #[must_use]
    pub const fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }

    /// Send timeout.
    #[must_use]
    pub const fn send(&self) -> Duration {
        Duration::from_secs(self.send_secs)
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `SQLite` database for history and schedules.
    pub database_path: Option<PathBuf>,
    /// SMTP server.
    pub smtp: SmtpSettings,
    /// Sender identity.
    pub sender: SenderSettings,
    /// Pipeline settings.
    pub pipeline: PipelineSettings,
    /// Timeouts.
    pub timeouts: Timeouts,
}

impl Config {
    /// Default config file location: `<config dir>/inkpost/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("inkpost").join("config.toml"))
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads configuration from `path`, or from the default location.
    ///
    /// A missing file at the default location yields the defaults; a
    /// missing explicit path is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                debug!(path = %path.display(), "Loaded configuration");
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Database location: configured path or `<data dir>/inkpost/inkpost.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory can be determined.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|d| d.join("inkpost").join("inkpost.db"))
            .ok_or_else(|| Error::Config("cannot determine data directory".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.smtp.security, Security::Tls);
        assert_eq!(config.smtp.port(), 465);
        assert!(config.pipeline.upgrade_http);
        assert!(config.pipeline.sanitize);
        assert_eq!(config.pipeline.max_image_bytes, 5 * 1024 * 1024);
        assert_eq!(config.pipeline.image_cache_entries, 128);
        assert_eq!(config.timeouts.fetch(), Duration::from_secs(10));
        assert_eq!(config.timeouts.send(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_full() {
        let config = Config::from_toml_str(
            r#"
            database_path = "/tmp/ink.db"

            [smtp]
            host = "smtp.example.com"
            security = "starttls"
            username = "me"

            [sender]
            email = "news@example.com"
            name = "News"

            [pipeline]
            site_origin = "https://www.example.com"
            cid_domain = "example.com"
            upgrade_http = false

            [timeouts]
            send_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.smtp.port(), 587);
        assert_eq!(config.smtp.security, Security::StartTls);
        assert_eq!(config.sender.mailbox().header_value(), "\"News\" <news@example.com>");
        assert_eq!(config.pipeline.cid_domain, "example.com");
        assert!(!config.pipeline.upgrade_http);
        assert_eq!(config.timeouts.send_secs, 30);
        assert_eq!(config.timeouts.fetch_secs, 10);
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/ink.db"));
    }

    #[test]
    fn test_unknown_security_is_rejected() {
        assert!(Config::from_toml_str("[smtp]\nsecurity = \"ssl3\"").is_err());
    }

    #[test]
    fn test_configured_password_wins() {
        let settings = SmtpSettings {
            password: Some("from-config".to_string()),
            ..SmtpSettings::default()
        };
        assert_eq!(settings.resolve_password().unwrap().as_deref(), Some("from-config"));
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/inkpost/config.toml"))).is_err());
    }
}
