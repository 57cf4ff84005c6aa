//! Removal of non-portable attributes.

use super::tokenizer::{Attribute, Token, Tokenizer};

/// Returns true for attributes that are stripped from outgoing mail.
fn is_scrubbed(attr: &Attribute<'_>) -> bool {
    attr.is("class")
        || attr.is("id")
        || attr
            .name
            .as_bytes()
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"data-"))
}

/// Strips `class`, `id` and `data-*` attributes from every start tag.
///
/// Only attribute names are matched. Text, comments and attribute values
/// are copied through unchanged, so a value such as `title="class"` is left
/// alone. Scrubbing is idempotent.
#[must_use]
pub fn scrub_attributes(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    for token in Tokenizer::new(html) {
        match token {
            Token::StartTag(tag) => out.push_str(&tag.retain_attributes(|a| !is_scrubbed(a))),
            other => out.push_str(other.raw()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_class_id_and_data() {
        let html = r#"<div class="wrap" id="main" data-track="1" style="color:red"><p DATA-x=y>Hi</p></div>"#;
        assert_eq!(
            scrub_attributes(html),
            r#"<div style="color:red"><p>Hi</p></div>"#
        );
    }

    #[test]
    fn test_values_containing_keywords_are_untouched() {
        let html = r#"<a title="class id data-x" href="/p?id=3&class=a">class="x" id=y</a>"#;
        assert_eq!(scrub_attributes(html), html);
    }

    #[test]
    fn test_similar_names_are_kept() {
        let html = r#"<td classname="a" idx="1" data="2" metadata-x="3">"#;
        assert_eq!(scrub_attributes(html), html);
    }

    #[test]
    fn test_comments_and_scripts_untouched() {
        let html = "<!-- <p class=x> --><script>var s = '<b id=1>';</script>";
        assert_eq!(scrub_attributes(html), html);
    }

    #[test]
    fn test_end_tags_untouched() {
        assert_eq!(scrub_attributes("<b>x</b class=y>"), "<b>x</b class=y>");
    }

    #[test]
    fn test_stray_value_does_not_move_to_previous_attribute() {
        let once = scrub_attributes(r#"<p x class="a"=b>Hi</p>"#);
        assert_eq!(once, "<p x>Hi</p>");
        assert_eq!(scrub_attributes(&once), once);
    }

    #[test]
    fn test_idempotent_example() {
        let once = scrub_attributes(r#"<img class=a src="x.png"id=b data-n=1 alt="">"#);
        assert_eq!(once, r#"<img src="x.png" alt="">"#);
        assert_eq!(scrub_attributes(&once), once);
    }

    fn fragment() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("<p"), Just("<img"), Just(" class=\"a\""), Just(" id=x"), Just("data-k='v'"),
            Just(" title=\"class\""), Just("class"), Just("id"), Just(">"), Just("/>"),
            Just("</p>"), Just("\""), Just("'"), Just("="), Just(" "), Just("/"), Just("<"),
            Just("<!--"), Just("-->"), Just("<script>"), Just("</script>"), Just("text"),
        ]
    }

    proptest! {
        #[test]
        fn prop_scrub_is_idempotent(parts in proptest::collection::vec(fragment(), 0..30)) {
            let html = parts.concat();
            let once = scrub_attributes(&html);
            prop_assert_eq!(scrub_attributes(&once), once);
        }

        #[test]
        fn prop_scrub_is_idempotent_on_any_text(html in "\\PC{0,80}") {
            let once = scrub_attributes(&html);
            prop_assert_eq!(scrub_attributes(&once), once);
        }
    }
}
