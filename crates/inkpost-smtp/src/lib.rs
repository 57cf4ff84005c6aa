//! # inkpost-smtp
//!
//! An async SMTP submission client implementing the parts of RFC 5321
//! needed to hand a finished MIME message to a relay.
//!
//! ## Features
//!
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   SMTP state transitions
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS
//! - **Authentication**: PLAIN and LOGIN
//! - **Timeouts**: every connect and command round-trip is bounded
//! - **Error classification**: [`Error::is_transient`] separates network
//!   failures and 4xx replies from permanent rejections
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use inkpost_smtp::{Address, Client, Security};
//! use inkpost_smtp::connection::connect_with;
//!
//! let timeout = Duration::from_secs(10);
//! let stream = connect_with("smtp.example.com", 587, Security::StartTls, timeout).await?;
//! let client = Client::from_stream(stream, timeout).await?;
//! let client = client.ehlo("client.example.com").await?;
//! let client = client.starttls("smtp.example.com", "client.example.com").await?;
//! let client = client.authenticate("user@example.com", "password").await?;
//!
//! let client = client.mail_from(Address::new("sender@example.com")?, None).await?;
//! let client = client.rcpt_to(Address::new("recipient@example.com")?).await?;
//! let client = client.data().await?;
//! let (client, reply) = client.send_message(b"Subject: Test\r\n\r\nHello\r\n").await?;
//! println!("queued as {:?}", reply.queue_id());
//! client.quit().await?;
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── authenticate() ───→ Authenticated
//! └──────────────┘                               │
//!        │                                       │
//!        └────────── mail_from() ────────────────┘
//!                        ↓
//!   MailTransaction ─→ RecipientAdded ─→ Data ─→ Connected
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, Security, ServerInfo,
    SmtpConnection,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
