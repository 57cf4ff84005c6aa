//! Allow-list sanitizing of user-authored markup.

use std::collections::HashSet;

/// Tags kept on top of ammonia's defaults. Old-school email layouts still
/// rely on these.
const EXTRA_TAGS: &[&str] = &["center", "font"];

/// Presentational attributes allowed on any element.
const LAYOUT_ATTRIBUTES: &[&str] = &[
    "style",
    "align",
    "valign",
    "width",
    "height",
    "bgcolor",
    "border",
    "cellpadding",
    "cellspacing",
    "color",
    "face",
    "size",
    "dir",
    "role",
];

/// URL schemes that survive sanitizing. `cid:` and `data:` carry inline
/// images; relative URLs pass through for later resolution.
const URL_SCHEMES: &[&str] = &["http", "https", "mailto", "data", "cid"];

/// Removes scripting and active content while keeping email layout markup.
///
/// Dropped: `<script>` and `<style>` elements with their content, event
/// handler attributes, `javascript:` and other non-listed URLs, and
/// `<iframe>`, `<object>`, `<embed>` and `<form>` elements.
#[must_use]
pub fn sanitize(html: &str) -> String {
    let schemes: HashSet<&str> = URL_SCHEMES.iter().copied().collect();

    ammonia::Builder::default()
        .add_tags(EXTRA_TAGS)
        .add_generic_attributes(LAYOUT_ATTRIBUTES)
        .url_schemes(schemes)
        .link_rel(None)
        .clean(html)
        .to_string()
}
