//! # inkpost-mime
//!
//! MIME generation for HTML email with inline (CID-referenced) images.
//!
//! ## Features
//!
//! - **Message generation**: `multipart/alternative` text + HTML bodies,
//!   nested in `multipart/related` when inline images are attached
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Content types**: ordered parameters for reproducible output
//! - **Parsing**: enough of RFC 2046 to inspect what was generated
//!
//! ## Quick Start
//!
//! ```ignore
//! use inkpost_mime::{ContentType, InlineImage, MessageBuilder};
//!
//! let message = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Newsletter")
//!     .text_body("Hello")
//!     .html_body("<img src=\"cid:logo@example.com\"><p>Hello</p>")
//!     .inline_image(InlineImage {
//!         content_id: "logo@example.com".into(),
//!         filename: "logo.png".into(),
//!         content_type: ContentType::image("png"),
//!         data: png_bytes,
//!     })
//!     .build()?;
//!
//! let wire = message.to_bytes()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod builder;
mod content_type;
mod error;
mod header;
mod message;
mod parse;

pub mod encoding;

pub use builder::{InlineImage, MessageBuilder, format_mailbox, generate_boundary};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, Message, Part, TransferEncoding};
