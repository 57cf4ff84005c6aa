//! SMTP implementation of [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use inkpost_smtp::connection::connect_with;
use inkpost_smtp::{Address, Client};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::transport::{Transport, TransportError};
use crate::config::{Security, SmtpSettings};
use crate::message::{Envelope, Receipt};

/// Settings checked on first use.
#[derive(Debug)]
struct Login {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
}

/// Sends each message over a fresh SMTP connection.
///
/// Settings are validated and the password resolved lazily, on the first
/// call to [`Transport::send`], so constructing the transport never touches
/// the keyring or the network.
#[derive(Debug)]
pub struct SmtpTransport {
    settings: SmtpSettings,
    timeout: Duration,
    client_hostname: String,
    login: OnceCell<Login>,
}

impl SmtpTransport {
    /// Creates a transport; every SMTP operation is bounded by `timeout`.
    #[must_use]
    pub fn new(settings: SmtpSettings, timeout: Duration) -> Self {
        Self {
            settings,
            timeout,
            client_hostname: "localhost".to_string(),
            login: OnceCell::new(),
        }
    }

    /// Sets the name announced in EHLO.
    #[must_use]
    pub fn with_client_hostname(mut self, name: impl Into<String>) -> Self {
        self.client_hostname = name.into();
        self
    }

    fn validate(&self) -> Result<Login, TransportError> {
        let host = self.settings.host.trim();
        if host.is_empty() {
            return Err(TransportError::Configuration("SMTP host is not set".into()));
        }

        let credentials = match &self.settings.username {
            Some(username) if !username.is_empty() => {
                let password = self
                    .settings
                    .resolve_password()
                    .map_err(|e| TransportError::Configuration(e.to_string()))?
                    .ok_or_else(|| {
                        TransportError::Configuration(format!("no SMTP password for {username}"))
                    })?;
                Some((username.clone(), password))
            }
            _ => None,
        };

        if credentials.is_some() && self.settings.security == Security::None {
            warn!(host, "Sending SMTP credentials without encryption");
        }

        Ok(Login {
            host: host.to_string(),
            port: self.settings.port(),
            credentials,
        })
    }

    async fn deliver(&self, login: &Login, envelope: &Envelope, raw: &[u8]) -> Result<String, TransportError> {
        let from = Address::new(&envelope.from)
            .map_err(|e| TransportError::InvalidAddress(e.to_string()))?;
        let recipients = envelope
            .to
            .iter()
            .map(|to| Address::new(to).map_err(|e| TransportError::InvalidAddress(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        let Some((first, rest)) = recipients.split_first() else {
            return Err(TransportError::InvalidAddress("No recipients specified".into()));
        };

        let security = self.settings.security;
        let stream = connect_with(&login.host, login.port, security.into(), self.timeout)
            .await
            .map_err(TransportError::Connection)?;
        let client = Client::from_stream(stream, self.timeout)
            .await
            .map_err(TransportError::Connection)?;
        let client = client
            .ehlo(&self.client_hostname)
            .await
            .map_err(TransportError::Connection)?;
        let client = if security == Security::StartTls {
            client
                .starttls(&login.host, &self.client_hostname)
                .await
                .map_err(TransportError::Connection)?
        } else {
            client
        };

        let size = Some(raw.len());
        let client = match &login.credentials {
            Some((username, password)) => client
                .authenticate(username, password)
                .await
                .map_err(TransportError::Authentication)?
                .mail_from(from, size)
                .await,
            None => client.mail_from(from, size).await,
        }
        .map_err(TransportError::Rejected)?;

        let mut client = client
            .rcpt_to(first.clone())
            .await
            .map_err(TransportError::Rejected)?;
        for recipient in rest {
            client = client
                .rcpt_to(recipient.clone())
                .await
                .map_err(TransportError::Rejected)?;
        }

        let client = client.data().await.map_err(TransportError::Rejected)?;
        let (client, reply) = client
            .send_message(raw)
            .await
            .map_err(TransportError::Rejected)?;

        // The message is accepted at this point; a failed QUIT changes nothing.
        if let Err(e) = client.quit().await {
            debug!(error = %e, "QUIT failed after delivery");
        }

        Ok(reply.queue_id().unwrap_or_else(|| envelope.message_id.clone()))
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, envelope: &Envelope, raw: &[u8]) -> Result<Receipt, TransportError> {
        let login = self
            .login
            .get_or_try_init(|| async { self.validate() })
            .await?;

        let message_id = self.deliver(login, envelope, raw).await?;
        info!(
            host = %login.host,
            recipients = envelope.to.len(),
            message_id = %message_id,
            "Message accepted by SMTP server"
        );

        Ok(Receipt {
            message_id,
            accepted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dispatch::TransportErrorKind;

    fn envelope() -> Envelope {
        Envelope {
            from: "news@example.com".into(),
            to: vec!["a@example.com".into()],
            message_id: "abc@example.com".into(),
        }
    }

    #[tokio::test]
    async fn test_missing_host_is_permanent_configuration_error() {
        let transport = SmtpTransport::new(SmtpSettings::default(), Duration::from_secs(1));
        let err = transport.send(&envelope(), b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::Configuration(_)));
        assert_eq!(err.kind(), TransportErrorKind::Permanent);
    }

    #[tokio::test]
    async fn test_invalid_envelope_address() {
        let settings = SmtpSettings {
            host: "127.0.0.1".into(),
            port: Some(1),
            security: Security::None,
            ..SmtpSettings::default()
        };
        let transport = SmtpTransport::new(settings, Duration::from_secs(1));
        let mut env = envelope();
        env.to = vec!["not an address".into()];
        let err = transport.send(&env, b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let settings = SmtpSettings {
            host: "127.0.0.1".into(),
            port: Some(port),
            security: Security::None,
            ..SmtpSettings::default()
        };
        let transport = SmtpTransport::new(settings, Duration::from_secs(2));
        let err = transport.send(&envelope(), b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
        assert_eq!(err.kind(), TransportErrorKind::Transient);
    }
}
