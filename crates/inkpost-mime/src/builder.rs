//! Message builder for HTML email with inline images.
//!
//! Structure produced by [`MessageBuilder::build`]:
//!
//! ```text
//! multipart/related            (only when inline images exist)
//! ├── multipart/alternative    (only when both bodies exist)
//! │   ├── text/plain
//! │   └── text/html
//! ├── image/png  Content-ID: <...>
//! └── image/jpeg Content-ID: <...>
//! ```

use chrono::{DateTime, Utc};

use crate::content_type::ContentType;
use crate::encoding::{encode_base64_wrapped, encode_quoted_printable, encode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::{Message, Part, TransferEncoding};

/// An image part referenced from the HTML body by `cid:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// Content-ID without angle brackets.
    pub content_id: String,
    /// Suggested filename.
    pub filename: String,
    /// Image content type (e.g. `image/png`).
    pub content_type: ContentType,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

/// Formats a mailbox for an address header.
///
/// ASCII display names are quoted, anything else is RFC 2047 encoded.
#[must_use]
pub fn format_mailbox(name: Option<&str>, email: &str) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        None => email.to_string(),
        Some(name) if name.is_ascii() => {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\" <{email}>")
        }
        Some(name) => format!("{} <{email}>", encode_rfc2047(name)),
    }
}

/// Generates a fresh multipart boundary.
///
/// The `=_` prefix cannot appear in quoted-printable or base64 output.
#[must_use]
pub fn generate_boundary() -> String {
    format!("=_inkpost_{:016x}{:08x}", rand::random::<u64>(), rand::random::<u32>())
}

/// Builder for outgoing MIME messages.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    subject: String,
    text: Option<String>,
    html: Option<String>,
    inline: Vec<InlineImage>,
    message_id: Option<String>,
    date: Option<DateTime<Utc>>,
    extra_headers: Vec<(String, String)>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the From mailbox (already formatted, see [`format_mailbox`]).
    #[must_use]
    pub fn from(mut self, mailbox: impl Into<String>) -> Self {
        self.from = Some(mailbox.into());
        self
    }

    /// Adds a To mailbox (already formatted).
    #[must_use]
    pub fn to(mut self, mailbox: impl Into<String>) -> Self {
        self.to.push(mailbox.into());
        self
    }

    /// Sets the subject. Non-ASCII subjects are RFC 2047 encoded on build.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the plain-text alternative.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Adds an inline image part.
    #[must_use]
    pub fn inline_image(mut self, image: InlineImage) -> Self {
        self.inline.push(image);
        self
    }

    /// Sets the Message-ID (without angle brackets).
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the Date header; defaults to now.
    #[must_use]
    pub const fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Adds an extra top-level header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    fn text_leaf(content_type: ContentType, text: &str) -> Part {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add(
            "Content-Transfer-Encoding",
            TransferEncoding::QuotedPrintable.to_string(),
        );
        Part::leaf(headers, encode_quoted_printable(text).into_bytes())
    }

    fn image_leaf(image: InlineImage) -> Part {
        let content_type = image
            .content_type
            .with_parameter("name", image.filename.clone());
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add("Content-Transfer-Encoding", TransferEncoding::Base64.to_string());
        headers.add("Content-ID", format!("<{}>", image.content_id));
        headers.add(
            "Content-Disposition",
            format!("inline; filename=\"{}\"", image.filename),
        );
        Part::leaf(headers, encode_base64_wrapped(&image.data).into_bytes())
    }

    fn multipart(content_type: ContentType, parts: Vec<Part>) -> Part {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        Part::multipart(headers, parts)
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns an error if From, To, or both bodies are missing.
    pub fn build(self) -> Result<Message> {
        let from = self
            .from
            .ok_or_else(|| Error::MissingHeader("From".to_string()))?;
        if self.to.is_empty() {
            return Err(Error::MissingHeader("To".to_string()));
        }

        let text = self.text.map(|t| Self::text_leaf(ContentType::text_plain(), &t));
        let html = self.html.map(|h| Self::text_leaf(ContentType::text_html(), &h));

        let content = match (text, html) {
            (Some(text), Some(html)) => Self::multipart(
                ContentType::multipart_alternative(generate_boundary()),
                vec![text, html],
            ),
            (Some(single), None) | (None, Some(single)) => single,
            (None, None) => return Err(Error::MissingHeader("body".to_string())),
        };

        let entity = if self.inline.is_empty() {
            content
        } else {
            let root_type = content.content_type()?.essence();
            let mut parts = Vec::with_capacity(self.inline.len() + 1);
            parts.push(content);
            parts.extend(self.inline.into_iter().map(Self::image_leaf));
            Self::multipart(
                ContentType::multipart_related(generate_boundary(), &root_type),
                parts,
            )
        };

        let mut headers = Headers::new();
        headers.add(
            "Date",
            self.date.unwrap_or_else(Utc::now).to_rfc2822(),
        );
        headers.add("From", from);
        headers.add("To", self.to.join(", "));
        headers.add("Subject", encode_rfc2047(&self.subject));
        if let Some(id) = self.message_id {
            headers.add("Message-ID", format!("<{id}>"));
        }
        headers.add("MIME-Version", "1.0");
        for (name, value) in self.extra_headers {
            headers.add(name, value);
        }
        for (name, value) in entity.headers.iter() {
            headers.add(name, value);
        }

        Ok(Message::new(Part {
            headers,
            body: entity.body,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::Body;

    fn png(id: &str) -> InlineImage {
        InlineImage {
            content_id: id.to_string(),
            filename: "image1.png".to_string(),
            content_type: ContentType::image("png"),
            data: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn test_format_mailbox() {
        assert_eq!(format_mailbox(None, "a@example.com"), "a@example.com");
        assert_eq!(format_mailbox(Some("  "), "a@example.com"), "a@example.com");
        assert_eq!(
            format_mailbox(Some("Ann \"A\" Lee"), "a@example.com"),
            "\"Ann \\\"A\\\" Lee\" <a@example.com>"
        );
        assert!(format_mailbox(Some("Zoë"), "z@example.com").starts_with("=?utf-8?B?"));
    }

    #[test]
    fn test_build_requires_recipient() {
        let result = MessageBuilder::new()
            .from("a@example.com")
            .html_body("<p>x</p>")
            .build();
        assert!(matches!(result, Err(Error::MissingHeader(h)) if h == "To"));
    }

    #[test]
    fn test_alternative_only_without_images() {
        let message = MessageBuilder::new()
            .from("a@example.com")
            .to("b@example.com")
            .subject("Test")
            .text_body("Hello")
            .html_body("<p>Hello</p>")
            .build()
            .unwrap();

        let ct = message.content_type().unwrap();
        assert!(ct.is("multipart", "alternative"));
        assert_eq!(message.root.children().len(), 2);
    }

    #[test]
    fn test_related_wraps_alternative_with_images() {
        let message = MessageBuilder::new()
            .from("a@example.com")
            .to("b@example.com")
            .subject("Täst")
            .message_id("abc@example.com")
            .text_body("Hello")
            .html_body("<img src=\"cid:img1@example.com\">")
            .inline_image(png("img1@example.com"))
            .build()
            .unwrap();

        let ct = message.content_type().unwrap();
        assert!(ct.is("multipart", "related"));
        assert_eq!(ct.parameter("type"), Some("multipart/alternative"));

        let children = message.root.children();
        assert!(matches!(children[0].body, Body::Multipart(_)));
        assert_eq!(children[1].content_id(), Some("img1@example.com"));
        assert_eq!(children[1].decode_body().unwrap(), vec![0x89, b'P', b'N', b'G']);
        assert_eq!(message.message_id(), Some("<abc@example.com>"));
        assert!(message.subject().unwrap().starts_with("=?utf-8?B?"));
    }

    #[test]
    fn test_render_and_parse_back() {
        let message = MessageBuilder::new()
            .from("a@example.com")
            .to("b@example.com")
            .subject("Round")
            .text_body("Hello World")
            .html_body("<p>Hello <b>World</b></p>")
            .inline_image(png("one@example.com"))
            .build()
            .unwrap();

        let wire = message.to_bytes().unwrap();
        let parsed = Message::parse(&wire).unwrap();
        assert_eq!(parsed.html_part().unwrap(), "<p>Hello <b>World</b></p>");
        assert_eq!(parsed.text_part().unwrap(), "Hello World");
        assert_eq!(parsed.inline_parts().len(), 1);
    }

    #[test]
    fn test_wire_lines_stay_within_limit() {
        let subject = "Überraschung: unser großer Herbstnewsletter ist da";
        let message = MessageBuilder::new()
            .from("a@example.com")
            .to("b@example.com")
            .subject(subject)
            .text_body("Hello World")
            .html_body("<p>Hello</p><img src=\"cid:one@example.com\">")
            .inline_image(png("one@example.com"))
            .build()
            .unwrap();

        let wire = message.to_bytes().unwrap();
        let text = String::from_utf8(wire.clone()).unwrap();
        assert!(text.lines().all(|line| line.len() <= 78), "{text}");
        assert!(
            text.lines()
                .filter(|line| line.starts_with("Subject:") || line.starts_with(" =?"))
                .all(|line| line.len() <= 76)
        );

        let parsed = Message::parse(&wire).unwrap();
        let ct = parsed.content_type().unwrap();
        assert!(ct.is("multipart", "related"));
        assert_eq!(ct.boundary(), message.content_type().unwrap().boundary());
        assert_eq!(
            crate::encoding::decode_rfc2047(parsed.subject().unwrap()).unwrap(),
            subject
        );
        assert_eq!(parsed.inline_parts().len(), 1);
    }
}
