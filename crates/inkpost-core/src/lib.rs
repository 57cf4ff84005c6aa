//! # inkpost-core
//!
//! Turns author-supplied HTML into deliverable email.
//!
//! This crate provides:
//! - HTML sanitizing, attribute scrubbing, table layout and plaintext derivation
//! - Image classification and extraction into `cid:` attachments
//! - Delivery dispatch over a pluggable [`Transport`] (SMTP by default)
//! - Delivery history and scheduled sends (`SQLite`)
//! - Configuration and SMTP credential lookup
//! - The [`EmailService`] façade

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod credentials;
mod db;
pub mod dispatch;
mod error;
pub mod history;
pub mod html;
pub mod image;
pub mod message;
pub mod pipeline;
pub mod schedule;
pub mod service;
pub mod validation;

pub use config::{Config, PipelineSettings, SenderSettings, SmtpSettings, Timeouts};
pub use credentials::{CredentialError, CredentialResult};
pub use dispatch::{
    Delivery, DispatchError, Dispatcher, SmtpTransport, Transport, TransportError,
    TransportErrorKind,
};
pub use error::{Error, Result};
pub use history::{DeliveryRecord, DeliveryStatus, HistoryEntry, HistoryRepository};
pub use image::{FetchedImage, HttpImageFetcher, ImageCache, ImageFetcher};
pub use message::{ImageInfo, Mailbox, Recipient};
pub use pipeline::{Pipeline, PreparedEmail};
pub use schedule::{ScheduleRepository, ScheduleStatus, ScheduledEmail};
pub use service::{EmailService, ProcessReport, SendOutcome, SendRequest};
pub use validation::{ValidationError, ValidationResult, validate_send};
