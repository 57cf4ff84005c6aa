//! MIME header handling.

use std::fmt;

/// Ordered collection of email headers with case-insensitive lookup.
///
/// Insertion order is kept so rendered messages are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Sets a header value, replacing any existing values in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(index) => {
                self.entries[index].1 = value;
                let mut seen = false;
                self.entries.retain(|(n, _)| {
                    if !n.eq_ignore_ascii_case(&name) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses a header block, unfolding continuation lines.
    ///
    /// Parsing stops at the first empty line. Lines without a colon are ignored.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }
            if let Some((name, value)) = line.split_once(':') {
                current = Some((name.trim().to_string(), value.trim().to_string()));
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        headers
    }
}

/// Longest header line written before folding, excluding CRLF.
const FOLD_WIDTH: usize = 78;

/// Splits a header line before each run of whitespace outside quoted strings.
fn fold_segments(line: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    let mut previous_space = false;

    for (index, ch) in line.char_indices() {
        let space = !quoted && (ch == ' ' || ch == '\t');
        if space && !previous_space && index > start {
            segments.push(&line[start..index]);
            start = index;
        }
        previous_space = space;

        if escaped {
            escaped = false;
        } else if quoted && ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            quoted = !quoted;
        }
    }

    segments.push(&line[start..]);
    segments
}

/// Writes one header, folding at whitespace so lines stay within [`FOLD_WIDTH`].
///
/// Folds already present in the value are kept. A segment longer than the
/// limit is written whole.
fn write_folded(f: &mut fmt::Formatter<'_>, name: &str, value: &str) -> fmt::Result {
    write!(f, "{name}:")?;
    let mut width = name.len() + 1;

    for (index, line) in value.split("\r\n").enumerate() {
        if index == 0 {
            f.write_str(" ")?;
            width += 1;
        } else {
            f.write_str("\r\n")?;
            width = 0;
        }

        let mut fresh = true;
        for segment in fold_segments(line) {
            if !fresh && width + segment.len() > FOLD_WIDTH {
                f.write_str("\r\n")?;
                width = 0;
            }
            f.write_str(segment)?;
            width += segment.len();
            fresh = false;
        }
    }

    f.write_str("\r\n")
}

impl fmt::Display for Headers {
    /// Renders headers as `Name: value` lines terminated by CRLF, folding
    /// lines longer than 78 characters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write_folded(f, name, value)?;
        }
        Ok(())
    }
}
