//! MIME transfer and header encodings.
//!
//! Supports Base64 (wrapped for message bodies), Quoted-Printable, and
//! RFC 2047 encoded words for header values.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length for message bodies (RFC 2045).
const MAX_LINE_LENGTH: usize = 76;

/// Maximum raw bytes carried by one RFC 2047 encoded word.
///
/// 39 bytes encode to a 64-char word, so `Subject: ` plus one word fits in 76.
const ENCODED_WORD_CHUNK: usize = 39;

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at 76 columns with CRLF line breaks.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);
    for (index, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }
        // Base64 output is pure ASCII.
        result.push_str(&String::from_utf8_lossy(chunk));
    }
    result
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input become hard CRLF breaks; long lines get soft
/// breaks. Trailing whitespace on a line is always encoded.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 8);
    let mut lines = text.split('\n').peekable();

    while let Some(line) = lines.next() {
        let bytes = line.strip_suffix('\r').unwrap_or(line).as_bytes();
        let mut line_length = 0;

        for (index, &byte) in bytes.iter().enumerate() {
            let is_last = index + 1 == bytes.len();
            let literal = matches!(byte, b'!'..=b'<' | b'>'..=b'~')
                || (matches!(byte, b' ' | b'\t') && !is_last);
            let width = if literal { 1 } else { 3 };

            if line_length + width > MAX_LINE_LENGTH - 1 {
                result.push_str("=\r\n");
                line_length = 0;
            }

            if literal {
                result.push(char::from(byte));
            } else {
                let _ = write!(result, "={byte:02X}");
            }
            line_length += width;
        }

        if lines.peek().is_some() {
            result.push_str("\r\n");
        }
    }

    result
}

/// Decodes Quoted-Printable text (RFC 2045) into raw bytes.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        let byte = bytes[index];
        if byte != b'=' {
            result.push(byte);
            index += 1;
            continue;
        }

        match bytes.get(index + 1..index + 3) {
            Some(b"\r\n") => index += 3,
            Some([b'\n', ..]) => index += 2,
            Some(hex) => {
                let hex = std::str::from_utf8(hex)
                    .map_err(|_| Error::InvalidEncoding("Non-ASCII escape".to_string()))?;
                let value = u8::from_str_radix(hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(value);
                index += 3;
            }
            None if bytes.get(index + 1) == Some(&b'\n') => index += 2,
            None if index + 1 == bytes.len() => index += 1,
            None => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    Ok(result)
}

/// Returns true if a header value can be written without encoding.
fn is_header_safe(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) && !text.contains("=?")
}

/// Encodes a header value using RFC 2047 `B` encoded words when needed.
///
/// Plain ASCII values are returned unchanged. Long values are split into
/// several encoded words on character boundaries, joined by folding whitespace.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if is_header_safe(text) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > ENCODED_WORD_CHUNK {
            words.push(format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())));
    }

    words.join("\r\n ")
}

/// Decodes a single `=?charset?enc?text?=` word, if it is one.
fn decode_encoded_word(word: &str) -> Option<Result<String>> {
    let inner = word.strip_prefix("=?")?.strip_suffix("?=")?;
    let mut parts = inner.splitn(3, '?');
    let _charset = parts.next()?;
    let encoding = parts.next()?;
    let encoded_text = parts.next()?;

    let decoded = match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64(encoded_text),
        "Q" => decode_quoted_printable(&encoded_text.replace('_', " ")),
        other => Err(Error::InvalidEncoding(format!("Unknown encoding: {other}"))),
    };

    Some(decoded.and_then(|bytes| String::from_utf8(bytes).map_err(Into::into)))
}

/// Decodes an RFC 2047 header value.
///
/// Whitespace between adjacent encoded words is dropped, as the RFC requires.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut result = String::new();
    let mut previous_was_encoded = false;

    for token in text.split_whitespace() {
        match decode_encoded_word(token) {
            Some(decoded) => {
                if !result.is_empty() && !previous_was_encoded {
                    result.push(' ');
                }
                result.push_str(&decoded?);
                previous_was_encoded = true;
            }
            None => {
                if !result.is_empty() {
                    result.push(' ');
                }
                result.push_str(token);
                previous_was_encoded = false;
            }
        }
    }

    Ok(result)
}
