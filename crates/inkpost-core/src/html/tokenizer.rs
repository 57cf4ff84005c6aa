//! Lossless HTML tag tokenizer.
//!
//! Splits markup into text, comments, declarations and tags without
//! building a tree. Concatenating the raw slices of every token yields the
//! input again, so callers can rewrite individual tags and copy everything
//! else through untouched.
//!
//! Only tag *structure* is parsed: element name, attribute names and the
//! byte span of each attribute. Text inside `<script>` and `<style>` is
//! treated as raw text so that markup-looking strings in scripts are never
//! mistaken for tags.

use std::borrow::Cow;
use std::ops::Range;

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// A single lexical unit of HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Character data between tags.
    Text(&'a str),
    /// `<!-- ... -->`.
    Comment(&'a str),
    /// `<!DOCTYPE ...>`, `<![CDATA[...]]>`, `<?...?>` and similar.
    Declaration(&'a str),
    /// An opening (or self-closing) tag.
    StartTag(Tag<'a>),
    /// A closing tag.
    EndTag(Tag<'a>),
}

impl<'a> Token<'a> {
    /// Returns the exact source text of the token.
    #[must_use]
    pub const fn raw(&self) -> &'a str {
        match self {
            Self::Text(s) | Self::Comment(s) | Self::Declaration(s) => s,
            Self::StartTag(tag) | Self::EndTag(tag) => tag.raw,
        }
    }
}

/// A parsed start or end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag<'a> {
    /// Full source text, from `<` to `>` inclusive.
    pub raw: &'a str,
    /// Element name as written.
    pub name: &'a str,
    /// Attributes in source order.
    pub attributes: Vec<Attribute<'a>>,
    /// Whether the tag ends with `/>`.
    pub self_closing: bool,
}

/// An attribute inside a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    /// Attribute name as written. Empty for a stray `=value`.
    pub name: &'a str,
    /// Value without surrounding quotes, if present. Entities are not decoded.
    pub value: Option<&'a str>,
    /// Byte range within [`Tag::raw`], including leading whitespace.
    pub span: Range<usize>,
    /// Byte range within [`Tag::raw`] without the leading whitespace.
    pub text: Range<usize>,
}

impl Attribute<'_> {
    /// Case-insensitive name comparison.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl<'a> Tag<'a> {
    /// Case-insensitive element name comparison.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Returns the first attribute with the given name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute<'a>> {
        self.attributes.iter().find(|a| a.is(name))
    }

    /// Returns the value of the first attribute with the given name.
    #[must_use]
    pub fn attribute_value(&self, name: &str) -> Option<&'a str> {
        self.attribute(name).and_then(|a| a.value)
    }

    /// Renders the tag without the attributes rejected by `keep`.
    ///
    /// Stray `=value` attributes that follow a removed attribute go with it,
    /// so they cannot attach to the attribute before. Everything else in the
    /// tag, including spacing and quoting of the remaining attributes, is
    /// preserved byte for byte.
    pub fn retain_attributes(&self, mut keep: impl FnMut(&Attribute<'a>) -> bool) -> Cow<'a, str> {
        let mut out: Option<String> = None;
        let mut cursor = 0;
        let mut after_removed = false;

        for attr in &self.attributes {
            let stray = after_removed && attr.name.is_empty();
            if !stray && keep(attr) {
                after_removed = false;
                continue;
            }
            let buf = out.get_or_insert_with(|| String::with_capacity(self.raw.len()));
            push_joined(buf, &self.raw[cursor..attr.span.start]);
            cursor = attr.span.end;
            after_removed = true;
        }

        match out {
            None => Cow::Borrowed(self.raw),
            Some(mut buf) => {
                push_joined(&mut buf, &self.raw[cursor..]);
                Cow::Owned(buf)
            }
        }
    }

    /// Renders the tag with the first `name` attribute replaced by
    /// `name="value"`. The value is written as given and must already be
    /// attribute-safe.
    ///
    /// Returns the raw tag unchanged if the attribute is absent.
    #[must_use]
    pub fn replace_attribute(&self, name: &str, value: &str) -> Cow<'a, str> {
        let Some(attr) = self.attribute(name) else {
            return Cow::Borrowed(self.raw);
        };
        let mut out = String::with_capacity(self.raw.len() + value.len());
        out.push_str(&self.raw[..attr.text.start]);
        out.push_str(attr.name);
        out.push_str("=\"");
        out.push_str(value);
        out.push('"');
        out.push_str(&self.raw[attr.text.end..]);
        Cow::Owned(out)
    }
}

/// Appends `segment`, inserting a space if removing an attribute would
/// otherwise glue two words of the tag together.
fn push_joined(out: &mut String, segment: &str) {
    let glued = out
        .as_bytes()
        .last()
        .is_some_and(|b| !b.is_ascii_whitespace())
        && segment
            .as_bytes()
            .first()
            .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'>' && *b != b'/');
    if glued {
        out.push(' ');
    }
    out.push_str(segment);
}

/// Iterator over the tokens of an HTML string.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    raw_text_end: Option<&'static str>,
}

impl<'a> Tokenizer<'a> {
    /// Creates a tokenizer over `input`.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            raw_text_end: None,
        }
    }

    /// Byte offset just past the most recently returned token.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, end: usize) -> &'a str {
        let start = self.pos;
        self.pos = end;
        &self.input[start..end]
    }

    fn next_raw_text(&mut self, element: &str) -> Option<Token<'a>> {
        let rest = &self.input.as_bytes()[self.pos..];
        let closing = format!("</{element}");
        let end = find_ignore_case(rest, closing.as_bytes()).map_or(self.input.len(), |i| self.pos + i);
        if end == self.pos {
            return None;
        }
        Some(Token::Text(self.take(end)))
    }

    fn next_markup(&mut self) -> Option<Token<'a>> {
        let bytes = self.input.as_bytes();
        let rest = &bytes[self.pos..];

        if rest.starts_with(b"<!--") {
            let end = find(&rest[4..], b"-->").map_or(bytes.len(), |i| self.pos + 4 + i + 3);
            return Some(Token::Comment(self.take(end)));
        }
        if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
            let end = find(rest, b">").map_or(bytes.len(), |i| self.pos + i + 1);
            return Some(Token::Declaration(self.take(end)));
        }

        let is_end = rest.get(1) == Some(&b'/');
        let name_start = if is_end { 2 } else { 1 };
        if !rest.get(name_start).is_some_and(u8::is_ascii_alphabetic) {
            return None;
        }

        let source = &self.input[self.pos..];
        let (tag, len) = parse_tag(source, name_start)?;
        self.pos += len;

        if is_end {
            return Some(Token::EndTag(tag));
        }
        if !tag.self_closing {
            self.raw_text_end = RAW_TEXT_ELEMENTS.iter().copied().find(|e| tag.is(e));
        }
        Some(Token::StartTag(tag))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.input.len() {
            return None;
        }

        if let Some(element) = self.raw_text_end.take() {
            if let Some(text) = self.next_raw_text(element) {
                return Some(text);
            }
        }

        let bytes = self.input.as_bytes();
        if bytes[self.pos] == b'<' {
            if let Some(token) = self.next_markup() {
                return Some(token);
            }
        }

        // Text up to the next '<' (a lone '<' that opens nothing is text too).
        let end = find(&bytes[self.pos + 1..], b"<").map_or(bytes.len(), |i| self.pos + 1 + i);
        Some(Token::Text(self.take(end)))
    }
}

/// Parses a tag starting at `source[0] == '<'`. Returns the tag and its
/// length, or `None` if the tag is not closed.
fn parse_tag(source: &str, name_start: usize) -> Option<(Tag<'_>, usize)> {
    let bytes = source.as_bytes();
    let mut i = name_start;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = &source[name_start..i];
    let mut attributes = Vec::new();

    loop {
        // A '/' that does not close the tag separates attributes like whitespace.
        let ws_start = i;
        while i < bytes.len()
            && (bytes[i].is_ascii_whitespace()
                || (bytes[i] == b'/' && bytes.get(i + 1) != Some(&b'>')))
        {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => {
                let tag = Tag {
                    raw: &source[..=i],
                    name,
                    attributes,
                    self_closing: false,
                };
                return Some((tag, i + 1));
            }
            b'/' => {
                let tag = Tag {
                    raw: &source[..i + 2],
                    name,
                    attributes,
                    self_closing: true,
                };
                return Some((tag, i + 2));
            }
            b'=' => {
                // Stray value with no name: keep it as a nameless attribute
                // so that it always parses the same way.
                let text_start = i;
                let (value, end) = parse_value(source, i + 1)?;
                attributes.push(Attribute {
                    name: "",
                    value: Some(value),
                    span: ws_start..end,
                    text: text_start..end,
                });
                i = end;
            }
            _ => {
                let text_start = i;
                while i < bytes.len() && !is_attribute_name_end(bytes[i]) {
                    i += 1;
                }
                let attr_name = &source[text_start..i];

                let mut j = i;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let (value, end) = if bytes.get(j) == Some(&b'=') {
                    let (value, end) = parse_value(source, j + 1)?;
                    (Some(value), end)
                } else {
                    (None, i)
                };

                attributes.push(Attribute {
                    name: attr_name,
                    value,
                    span: ws_start..end,
                    text: text_start..end,
                });
                i = end;
            }
        }
    }
}

/// Parses an attribute value after `=`. Returns the unquoted value and the
/// index just past it.
fn parse_value(source: &str, mut i: usize) -> Option<(&str, usize)> {
    let bytes = source.as_bytes();
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    match bytes.get(i)? {
        quote @ (b'"' | b'\'') => {
            let close = find(&bytes[i + 1..], &[*quote])?;
            let end = i + 1 + close;
            Some((&source[i + 1..end], end + 1))
        }
        _ => {
            let start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                i += 1;
            }
            Some((&source[start..i], i))
        }
    }
}

const fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

const fn is_attribute_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'=' | b'>' | b'/')
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tokens(html: &str) -> Vec<Token<'_>> {
        Tokenizer::new(html).collect()
    }

    fn start_tag(html: &str) -> Tag<'_> {
        match tokens(html).into_iter().next().unwrap() {
            Token::StartTag(tag) => tag,
            other => panic!("expected start tag, got {other:?}"),
        }
    }

    #[test]
    fn test_basic_tokens() {
        let toks = tokens("<!DOCTYPE html><p>Hi <!-- note --></p>");
        assert_eq!(toks.len(), 5);
        assert!(matches!(toks[0], Token::Declaration("<!DOCTYPE html>")));
        assert!(matches!(&toks[1], Token::StartTag(t) if t.is("P")));
        assert!(matches!(toks[2], Token::Text("Hi ")));
        assert!(matches!(toks[3], Token::Comment("<!-- note -->")));
        assert!(matches!(&toks[4], Token::EndTag(t) if t.name == "p"));
    }

    #[test]
    fn test_attributes() {
        let tag = start_tag(r#"<img src="a.png" alt='x y' width=10 hidden>"#);
        assert_eq!(tag.name, "img");
        let names: Vec<_> = tag.attributes.iter().map(|a| a.name).collect();
        assert_eq!(names, ["src", "alt", "width", "hidden"]);
        assert_eq!(tag.attribute_value("SRC"), Some("a.png"));
        assert_eq!(tag.attribute_value("alt"), Some("x y"));
        assert_eq!(tag.attribute_value("width"), Some("10"));
        assert_eq!(tag.attribute("hidden").unwrap().value, None);
    }

    #[test]
    fn test_quoted_gt_does_not_close_tag() {
        let tag = start_tag(r#"<a title="1 > 0" href=x>rest"#);
        assert_eq!(tag.raw, r#"<a title="1 > 0" href=x>"#);
        assert_eq!(tag.attribute_value("href"), Some("x"));
    }

    #[test]
    fn test_self_closing() {
        let tag = start_tag("<br/>");
        assert!(tag.self_closing);
        assert!(tag.attributes.is_empty());
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        let toks = tokens("1 < 2 <3");
        assert!(toks.iter().all(|t| matches!(t, Token::Text(_))));
    }

    #[test]
    fn test_unterminated_tag_is_text() {
        let toks = tokens(r#"<img src="x"#);
        assert!(matches!(toks[0], Token::Text("<img src=\"x")));
    }

    #[test]
    fn test_script_content_is_raw_text() {
        let toks = tokens("<script>if (a<b) { x = '<img src=y>'; }</script><img src=z>");
        assert!(matches!(toks[1], Token::Text(t) if t.contains("<img src=y>")));
        assert!(matches!(&toks[2], Token::EndTag(t) if t.is("script")));
        assert!(matches!(&toks[3], Token::StartTag(t) if t.attribute_value("src") == Some("z")));
    }

    #[test]
    fn test_retain_attributes_preserves_rest() {
        let tag = start_tag(r#"<td class="x" align=center  id='y' style="a:b">"#);
        let out = tag.retain_attributes(|a| !a.is("class") && !a.is("id"));
        assert_eq!(out, r#"<td align=center style="a:b">"#);
    }

    #[test]
    fn test_retain_attributes_keeps_words_apart() {
        let tag = start_tag(r#"<p class="1"title="t">"#);
        assert_eq!(tag.retain_attributes(|a| !a.is("class")), r#"<p title="t">"#);
    }

    #[test]
    fn test_retain_attributes_drops_trailing_stray_value() {
        let tag = start_tag(r#"<p x class="a"=b>"#);
        assert_eq!(tag.retain_attributes(|a| !a.is("class")), "<p x>");

        let tag = start_tag(r#"<p x class="a" =b title=t>"#);
        assert_eq!(tag.retain_attributes(|a| !a.is("class")), "<p x title=t>");

        // A stray value after a kept attribute is left alone.
        let tag = start_tag(r#"<p x="a"=b class=c>"#);
        assert_eq!(tag.retain_attributes(|a| !a.is("class")), r#"<p x="a"=b>"#);
    }

    #[test]
    fn test_retain_all_borrows() {
        let tag = start_tag("<p a=1>");
        assert!(matches!(tag.retain_attributes(|_| true), Cow::Borrowed(_)));
    }

    #[test]
    fn test_replace_attribute() {
        let tag = start_tag(r"<img alt=logo src='data:x' width=5>");
        assert_eq!(
            tag.replace_attribute("src", "cid:img1@x"),
            r#"<img alt=logo src="cid:img1@x" width=5>"#
        );
    }

    proptest! {
        #[test]
        fn prop_tokens_cover_input(input in "\\PC{0,80}") {
            let joined: String = Tokenizer::new(&input).map(|t| t.raw()).collect();
            prop_assert_eq!(joined, input);
        }

        #[test]
        fn prop_markup_tokens_cover_input(parts in proptest::collection::vec(
            prop_oneof![
                Just("<p"), Just(" class=\"a\""), Just("id=x"), Just(">"), Just("<"),
                Just("</p>"), Just("\""), Just("'"), Just("="), Just(" "), Just("/"),
                Just("<!--"), Just("-->"), Just("<script>"), Just("</script>"), Just("é"),
            ],
            0..24,
        )) {
            let input: String = parts.concat();
            let joined: String = Tokenizer::new(&input).map(|t| t.raw()).collect();
            prop_assert_eq!(joined, input);
        }
    }
}
