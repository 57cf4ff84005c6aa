//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
///
/// Every command round-trip is bounded by the client's timeout.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    timeout: Duration,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

fn ensure_success(reply: &Reply) -> Result<()> {
    if reply.is_success() {
        Ok(())
    } else {
        Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()))
    }
}

fn parse_extensions(reply: &Reply) -> HashSet<Extension> {
    // First line is the server greeting
    reply.message.iter().skip(1).map(|l| Extension::parse(l)).collect()
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails, times out, or the
    /// server refuses service.
    pub async fn from_stream(mut stream: SmtpStream, timeout: Duration) -> Result<Self> {
        let greeting = tokio::time::timeout(timeout, Self::read_reply(&mut stream))
            .await
            .map_err(|_| Error::Timeout(timeout, "greeting"))??;
        ensure_success(&greeting)?;

        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        debug!(server = %hostname, "SMTP greeting received");

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            timeout,
            _state: PhantomData,
        })
    }

    /// Sends EHLO and discovers server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        ensure_success(&reply)?;

        self.server_info.extensions = parse_extensions(&reply);
        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS, then repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not supported or if the upgrade fails.
    pub async fn starttls(mut self, hostname: &str, client_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.send_command(Command::StartTls).await?;
        ensure_success(&reply)?;

        let timeout = self.timeout;
        self.stream = tokio::time::timeout(timeout, self.stream.upgrade_to_tls(hostname))
            .await
            .map_err(|_| Error::Timeout(timeout, "TLS handshake"))??;

        self.ehlo(client_hostname).await
    }

    /// Authenticates with the best mechanism the server offers.
    ///
    /// PLAIN is preferred; LOGIN is used when it is the only one advertised.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn authenticate(
        self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let mechanisms = self.server_info.auth_mechanisms();
        if mechanisms.contains(&AuthMechanism::Login) && !mechanisms.contains(&AuthMechanism::Plain)
        {
            self.auth_login(username, password).await
        } else {
            self.auth_plain(username, password).await
        }
    }

    /// Authenticates using PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let credentials = format!("\0{username}\0{password}");
        let reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(STANDARD.encode(credentials.as_bytes())),
            })
            .await?;
        ensure_success(&reply)?;

        Ok(self.transition())
    }

    /// Authenticates using the two-step LOGIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects either step.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let mut reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Login,
                initial_response: None,
            })
            .await?;

        for secret in [username, password] {
            if reply.code != ReplyCode::AUTH_CONTINUE {
                return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
            }
            reply = self
                .send_command(Command::AuthResponse(STANDARD.encode(secret.as_bytes())))
                .await?;
        }
        ensure_success(&reply)?;

        Ok(self.transition())
    }

    /// Starts a mail transaction without authentication (if server allows).
    ///
    /// # Errors
    ///
    /// Returns an error if the message is over the server's size limit or
    /// the MAIL FROM command fails.
    pub async fn mail_from(
        self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        self.start_mail(from, size).await
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is over the server's size limit or
    /// the MAIL FROM command fails.
    pub async fn mail_from(
        self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        self.start_mail(from, size).await
    }
}

impl Client<MailTransaction> {
    /// Adds a recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<RecipientAdded>> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        ensure_success(&reply)?;
        Ok(self.transition())
    }

    /// Resets the transaction and returns to connected state.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(mut self) -> Result<Client<Connected>> {
        let reply = self.send_command(Command::Rset).await?;
        ensure_success(&reply)?;
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        ensure_success(&reply)?;
        Ok(self)
    }

    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command fails.
    pub async fn data(mut self) -> Result<Client<Data>> {
        let reply = self.send_command(Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }
        Ok(self.transition())
    }

    /// Resets the transaction and returns to connected state.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(mut self) -> Result<Client<Connected>> {
        let reply = self.send_command(Command::Rset).await?;
        ensure_success(&reply)?;
        Ok(self.transition())
    }
}

/// Normalizes line endings to CRLF, byte-stuffs leading dots, and appends
/// the terminating `.` line.
fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);
    let body = message.strip_suffix(b"\r\n").unwrap_or(message);
    let body = body.strip_suffix(b"\n").unwrap_or(body);

    for line in body.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.first() == Some(&b'.') {
            out.push(b'.');
        }
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(b".\r\n");
    out
}

impl Client<Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// Message should be RFC 5322 formatted. Line endings are normalized
    /// to CRLF and the terminating "." line is added automatically.
    /// Returns the server's final reply, which may carry a queue id.
    ///
    /// # Errors
    ///
    /// Returns an error if sending the message fails or server rejects it.
    pub async fn send_message(mut self, message: &[u8]) -> Result<(Client<Connected>, Reply)> {
        let payload = dot_stuff(message);
        let timeout = self.timeout;

        let reply = tokio::time::timeout(timeout, async {
            self.stream.write_all(&payload).await?;
            Self::read_reply(&mut self.stream).await
        })
        .await
        .map_err(|_| Error::Timeout(timeout, "message data"))??;
        ensure_success(&reply)?;
        debug!(bytes = payload.len(), "Message accepted by server");

        Ok((self.transition(), reply))
    }
}

// Common implementation for all states
impl<S> Client<S> {
    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            timeout: self.timeout,
            _state: PhantomData,
        }
    }

    async fn start_mail(mut self, from: Address, size: Option<usize>) -> Result<Client<MailTransaction>> {
        if let (Some(size), Some(limit)) = (size, self.server_info.max_message_size()) {
            if size > limit {
                return Err(Error::MessageTooLarge { size, limit });
            }
        }

        let size = size.filter(|_| self.server_info.supports_size());
        let reply = self.send_command(Command::MailFrom { from, size }).await?;
        ensure_success(&reply)?;
        Ok(self.transition())
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        let name = cmd.name();
        let data = cmd.serialize();
        let timeout = self.timeout;
        debug!(command = name, "SMTP command");

        tokio::time::timeout(timeout, async {
            self.stream.write_all(&data).await?;
            Self::read_reply(&mut self.stream).await
        })
        .await
        .map_err(|_| Error::Timeout(timeout, name))?
    }

    async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = stream.read_line().await?;
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
        }

        parse_reply(&lines)
    }

    /// Returns true if the connection is TLS-protected.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.stream.is_tls()
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;

        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_stuff_normalizes_and_terminates() {
        let out = dot_stuff(b"Subject: x\n\n.hidden\r\nlast\r\n");
        assert_eq!(out, b"Subject: x\r\n\r\n..hidden\r\nlast\r\n.\r\n");
    }

    #[test]
    fn test_dot_stuff_without_trailing_newline() {
        assert_eq!(dot_stuff(b"body"), b"body\r\n.\r\n");
    }
}
