//! MIME content type handling.

use crate::error::{Error, Result};
use std::fmt;

/// MIME content type with ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "png").
    pub sub_type: String,
    /// Parameters in declaration order (e.g., charset=utf-8, boundary=xxx).
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into().to_ascii_lowercase(),
            sub_type: sub_type.into().to_ascii_lowercase(),
            parameters: Vec::new(),
        }
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a text/html content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html").with_parameter("charset", "utf-8")
    }

    /// Creates an `image/<subtype>` content type.
    #[must_use]
    pub fn image(sub_type: impl Into<String>) -> Self {
        Self::new("image", sub_type)
    }

    /// Creates a multipart/alternative content type with boundary.
    #[must_use]
    pub fn multipart_alternative(boundary: impl Into<String>) -> Self {
        Self::new("multipart", "alternative").with_parameter("boundary", boundary)
    }

    /// Creates a multipart/related content type with boundary.
    ///
    /// The `type` parameter names the root part's type, as RFC 2387 asks.
    #[must_use]
    pub fn multipart_related(boundary: impl Into<String>, root_type: &str) -> Self {
        Self::new("multipart", "related")
            .with_parameter("type", root_type)
            .with_parameter("boundary", boundary)
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        if let Some(slot) = self.parameters.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.parameters.push((key, value));
        }
        self
    }

    /// Returns a parameter value by (case-insensitive) name.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks whether this content type is `main/sub` (case-insensitive).
    #[must_use]
    pub fn is(&self, main: &str, sub: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main) && self.sub_type.eq_ignore_ascii_case(sub)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is an image content type.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("image")
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// # Errors
    ///
    /// Returns an error if the type or subtype is missing.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(';');

        let type_str = parts.next().unwrap_or_default().trim();
        if type_str.is_empty() {
            return Err(Error::InvalidContentType("Empty content type".to_string()));
        }

        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype: {type_str}")))?;
        if main_type.trim().is_empty() || sub_type.trim().is_empty() {
            return Err(Error::InvalidContentType(type_str.to_string()));
        }

        let mut content_type = Self::new(main_type.trim(), sub_type.trim());

        for param in parts {
            if let Some((key, value)) = param.trim().split_once('=') {
                content_type = content_type.with_parameter(key.trim(), value.trim().trim_matches('"'));
            }
        }

        Ok(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;

        for (key, value) in &self.parameters {
            if value.is_empty()
                || value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c))
            {
                write!(f, "; {key}=\"{value}\"")?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_html() {
        let ct = ContentType::text_html();
        assert!(ct.is("text", "html"));
        assert_eq!(ct.charset(), Some("utf-8"));
        assert_eq!(ct.to_string(), "text/html; charset=utf-8");
    }

    #[test]
    fn test_multipart_related_keeps_parameter_order() {
        let ct = ContentType::multipart_related("b1", "multipart/alternative");
        assert_eq!(
            ct.to_string(),
            "multipart/related; type=\"multipart/alternative\"; boundary=b1"
        );
        assert!(ct.is_multipart());
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct = ContentType::parse("Multipart/Related; boundary=\"----=_Part_123\"").unwrap();
        assert!(ct.is("multipart", "related"));
        assert_eq!(ct.boundary(), Some("----=_Part_123"));
    }

    #[test]
    fn test_content_type_parse_rejects_missing_subtype() {
        assert!(ContentType::parse("image").is_err());
        assert!(ContentType::parse("").is_err());
        assert!(ContentType::parse("image/").is_err());
    }

    #[test]
    fn test_with_parameter_replaces() {
        let ct = ContentType::image("png")
            .with_parameter("name", "a.png")
            .with_parameter("NAME", "b.png");
        assert_eq!(ct.parameters.len(), 1);
        assert_eq!(ct.parameter("name"), Some("b.png"));
        assert_eq!(ct.essence(), "image/png");
    }
}
