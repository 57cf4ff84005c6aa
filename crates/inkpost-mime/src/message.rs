//! MIME message structure, rendering, and body decoding.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Body of a message or part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Leaf body, stored in its transfer-encoded (wire) form.
    Leaf(Vec<u8>),
    /// Multipart body whose boundary lives in the owning Content-Type header.
    Multipart(Vec<Part>),
}

/// MIME entity: headers plus a leaf or multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body.
    pub body: Body,
}

impl Part {
    /// Creates a leaf part from already-encoded body bytes.
    #[must_use]
    pub const fn leaf(headers: Headers, encoded_body: Vec<u8>) -> Self {
        Self {
            headers,
            body: Body::Leaf(encoded_body),
        }
    }

    /// Creates a multipart part. `headers` must carry a multipart Content-Type.
    #[must_use]
    pub const fn multipart(headers: Headers, parts: Vec<Self>) -> Self {
        Self {
            headers,
            body: Body::Multipart(parts),
        }
    }

    /// Gets the content type, defaulting to `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns the Content-ID without angle brackets.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.headers
            .get("content-id")
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>'))
    }

    /// Returns child parts for multipart bodies.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.body {
            Body::Multipart(parts) => parts,
            Body::Leaf(_) => &[],
        }
    }

    /// Decodes a leaf body according to its transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if this part is multipart or decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        let Body::Leaf(body) = &self.body else {
            return Err(Error::InvalidMultipart(
                "Multipart bodies have no single payload".to_string(),
            ));
        };

        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&String::from_utf8_lossy(body)),
            TransferEncoding::QuotedPrintable => {
                decode_quoted_printable(&String::from_utf8_lossy(body))
            }
            _ => Ok(body.clone()),
        }
    }

    /// Gets the decoded body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        String::from_utf8(self.decode_body()?).map_err(Into::into)
    }

    /// Depth-first search for the first leaf part matching `main/sub`.
    #[must_use]
    pub fn find(&self, main: &str, sub: &str) -> Option<&Self> {
        match &self.body {
            Body::Leaf(_) => self
                .content_type()
                .ok()
                .filter(|ct| ct.is(main, sub))
                .map(|_| self),
            Body::Multipart(parts) => parts.iter().find_map(|p| p.find(main, sub)),
        }
    }

    /// Collects every leaf part in document order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Self> {
        match &self.body {
            Body::Leaf(_) => vec![self],
            Body::Multipart(parts) => parts.iter().flat_map(Self::leaves).collect(),
        }
    }

    /// Writes the wire form of this entity (headers, blank line, body).
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart part has no boundary.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(self.headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");

        match &self.body {
            Body::Leaf(body) => out.extend_from_slice(body),
            Body::Multipart(parts) => {
                let content_type = self.content_type()?;
                let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
                out.extend_from_slice(b"This is a multi-part message in MIME format.\r\n");
                for part in parts {
                    out.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
                    part.write_to(out)?;
                }
                out.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
            }
        }

        Ok(())
    }
}

/// Top-level MIME message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Root entity; its headers are the message headers.
    pub root: Part,
}

impl Message {
    /// Wraps a root entity as a message.
    #[must_use]
    pub const fn new(root: Part) -> Self {
        Self { root }
    }

    /// Message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Gets the root content type.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.root.content_type()
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.root.headers.get("subject")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.root.headers.get("message-id")
    }

    /// Decoded text of the first `text/plain` part.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such part or decoding fails.
    pub fn text_part(&self) -> Result<String> {
        self.root
            .find("text", "plain")
            .ok_or_else(|| Error::Parse("No text/plain part found".to_string()))?
            .body_text()
    }

    /// Decoded text of the first `text/html` part.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such part or decoding fails.
    pub fn html_part(&self) -> Result<String> {
        self.root
            .find("text", "html")
            .ok_or_else(|| Error::Parse("No text/html part found".to_string()))?
            .body_text()
    }

    /// Leaf parts that carry a Content-ID (inline resources).
    #[must_use]
    pub fn inline_parts(&self) -> Vec<&Part> {
        self.root
            .leaves()
            .into_iter()
            .filter(|p| p.content_id().is_some())
            .collect()
    }

    /// Renders the message in RFC 5322 wire form with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart part has no boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.root.write_to(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn leaf(content_type: &str, encoding: &str, body: &[u8]) -> Part {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type);
        headers.add("Content-Transfer-Encoding", encoding);
        Part::leaf(headers, body.to_vec())
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" BASE64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_decode_base64_leaf() {
        let part = leaf("image/png", "base64", b"iVBO\r\nRw0KGgo=");
        assert_eq!(
            part.decode_body().unwrap(),
            vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']
        );
    }

    #[test]
    fn test_multipart_without_boundary_fails_to_render() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "multipart/alternative");
        let message = Message::new(Part::multipart(headers, vec![]));
        assert!(matches!(message.to_bytes(), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_find_nested_html() {
        let mut alt_headers = Headers::new();
        alt_headers.add("Content-Type", "multipart/alternative; boundary=alt");
        let alt = Part::multipart(
            alt_headers,
            vec![
                leaf("text/plain; charset=utf-8", "7bit", b"Hello"),
                leaf("text/html; charset=utf-8", "quoted-printable", b"<p>H=C3=A9</p>"),
            ],
        );

        let mut image = leaf("image/png", "base64", b"AAAA");
        image.headers.add("Content-ID", "<img1@example.com>");

        let mut root_headers = Headers::new();
        root_headers.add("Content-Type", "multipart/related; boundary=rel");
        let message = Message::new(Part::multipart(root_headers, vec![alt, image]));

        assert_eq!(message.html_part().unwrap(), "<p>Hé</p>");
        assert_eq!(message.text_part().unwrap(), "Hello");
        let inline = message.inline_parts();
        assert_eq!(inline.len(), 1);
        assert_eq!(inline[0].content_id(), Some("img1@example.com"));

        let wire = String::from_utf8(message.to_bytes().unwrap()).unwrap();
        assert!(wire.contains("\r\n--rel\r\nContent-Type: multipart/alternative; boundary=alt"));
        assert!(wire.ends_with("\r\n--rel--\r\n"));
    }
}
