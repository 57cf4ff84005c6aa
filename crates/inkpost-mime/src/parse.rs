//! Parsing of rendered MIME messages.
//!
//! Handles the subset of RFC 2045/2046 this crate generates, which is
//! enough to inspect outgoing messages or messages handed back by a mock
//! transport.

use crate::content_type::ContentType;
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::{Message, Part};

impl Message {
    /// Parses a raw RFC 5322 message.
    ///
    /// # Errors
    ///
    /// Returns an error if a content type is invalid or a multipart body
    /// has no boundary or delimiter.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        parse_entity(raw).map(Self::new)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(rest) = raw.strip_prefix(b"\r\n") {
        return (&[], rest);
    }
    if let Some(rest) = raw.strip_prefix(b"\n") {
        return (&[], rest);
    }
    if let Some(pos) = find(raw, b"\r\n\r\n") {
        return (&raw[..pos + 2], &raw[pos + 4..]);
    }
    if let Some(pos) = find(raw, b"\n\n") {
        return (&raw[..pos + 1], &raw[pos + 2..]);
    }
    (raw, &[])
}

fn parse_entity(raw: &[u8]) -> Result<Part> {
    let (head, body) = split_head_body(raw);
    let headers = Headers::parse(&String::from_utf8_lossy(head));
    let content_type = headers
        .get("content-type")
        .map(ContentType::parse)
        .transpose()?;

    match content_type {
        Some(ct) if ct.is_multipart() => {
            let boundary = ct.boundary().ok_or(Error::MissingBoundary)?;
            let parts = split_multipart(body, boundary)?
                .into_iter()
                .map(parse_entity)
                .collect::<Result<Vec<_>>>()?;
            Ok(Part::multipart(headers, parts))
        }
        _ => Ok(Part::leaf(headers, body.to_vec())),
    }
}

/// Strips one trailing line break (CRLF or LF) from a body segment.
fn trim_line_break(segment: &[u8]) -> &[u8] {
    segment
        .strip_suffix(b"\r\n")
        .or_else(|| segment.strip_suffix(b"\n"))
        .unwrap_or(segment)
}

fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut positions = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = find(&body[search_from..], delimiter) {
        let pos = search_from + offset;
        if pos == 0 || body[pos - 1] == b'\n' {
            positions.push(pos);
        }
        search_from = pos + delimiter.len();
    }

    if positions.is_empty() {
        return Err(Error::InvalidMultipart(format!(
            "No delimiter for boundary {boundary}"
        )));
    }

    let content_start = |pos: usize, limit: usize| {
        let after = pos + delimiter.len();
        find(&body[after..limit], b"\n").map_or(limit, |i| after + i + 1)
    };

    let mut parts = Vec::new();
    let mut closed = false;
    for window in positions.windows(2) {
        let (start, next) = (window[0], window[1]);
        if body[start + delimiter.len()..].starts_with(b"--") {
            closed = true;
            break;
        }
        let begin = content_start(start, next);
        parts.push(trim_line_break(&body[begin..next]));
    }

    if let Some(&last) = positions.last() {
        let is_closing = body[last + delimiter.len()..].starts_with(b"--");
        if !closed && !is_closing {
            let begin = content_start(last, body.len());
            parts.push(&body[begin..]);
        }
    }

    Ok(parts)
}
