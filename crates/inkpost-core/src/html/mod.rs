//! HTML transformations for outgoing mail.
//!
//! Everything here is a pure string transform. The order used by the
//! pipeline is: [`body_fragment`], [`sanitize`], [`scrub_attributes`],
//! image extraction, [`wrap_in_layout`], [`derive_plaintext`].

mod layout;
mod plaintext;
mod sanitize;
mod scrub;
pub mod tokenizer;

pub use layout::{body_fragment, wrap_in_layout};
pub use plaintext::{decode_entities, derive_plaintext};
pub use sanitize::sanitize;
pub use scrub::scrub_attributes;

/// Escapes text for use in element content or a double-quoted attribute.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
