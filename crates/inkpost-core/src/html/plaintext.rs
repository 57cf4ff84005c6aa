//! Plaintext alternative derived from the final HTML.

use super::tokenizer::{Token, Tokenizer};

/// Elements whose content never appears in the plaintext.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "head", "title"];

/// Elements that separate words even when the source has no whitespace.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "blockquote", "body", "br", "center", "div", "footer", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr", "ul",
];

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.iter().any(|b| b.eq_ignore_ascii_case(name))
}

/// Strips all markup from `html`, decodes common entities, collapses
/// whitespace runs to single spaces and trims.
///
/// Lists and line breaks are not preserved.
#[must_use]
pub fn derive_plaintext(html: &str) -> String {
    let mut text = String::with_capacity(html.len() / 2);
    let mut hidden: Option<&str> = None;

    for token in Tokenizer::new(html) {
        match token {
            Token::Text(t) if hidden.is_none() => text.push_str(t),
            Token::StartTag(tag) if hidden.is_none() => {
                if !tag.self_closing {
                    hidden = HIDDEN_ELEMENTS.iter().copied().find(|e| tag.is(e));
                }
                if is_block(tag.name) {
                    text.push(' ');
                }
            }
            Token::EndTag(tag) => {
                if hidden.is_some_and(|e| tag.is(e)) {
                    hidden = None;
                } else if hidden.is_none() && is_block(tag.name) {
                    text.push(' ');
                }
            }
            _ => {}
        }
    }

    collapse_whitespace(&decode_entities(&text))
}

/// Decodes the named entities common in email markup plus numeric ones.
/// Unknown entities are left as written.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_world() {
        assert_eq!(derive_plaintext("<p>Hello <b>World</b></p>"), "Hello World");
    }

    #[test]
    fn test_empty_and_markup_only() {
        assert_eq!(derive_plaintext(""), "");
        assert_eq!(derive_plaintext("<br/><hr>"), "");
    }

    #[test]
    fn test_drops_hidden_content() {
        let html = "<html><head><title>T</title><style>p{color:red}</style></head>\
                    <body><script>var a = 1;</script><p>Body</p></body></html>";
        assert_eq!(derive_plaintext(html), "Body");
    }

    #[test]
    fn test_block_boundaries_separate_words() {
        assert_eq!(derive_plaintext("<td>One</td><td>Two</td>"), "One Two");
    }

    #[test]
    fn test_entities() {
        assert_eq!(
            derive_plaintext("<p>Fish &amp; Chips&nbsp;&lt;3 &#39;yum&#39; &#x263A; &quot;ok&quot;</p>"),
            "Fish & Chips <3 'yum' \u{263A} \"ok\""
        );
    }

    #[test]
    fn test_unknown_entity_kept() {
        assert_eq!(decode_entities("a &bogus; b & c"), "a &bogus; b & c");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(derive_plaintext("  <p>\n  a \t\n b </p>  "), "a b");
    }
}
