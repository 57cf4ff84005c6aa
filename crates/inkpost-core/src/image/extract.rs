//! Rewriting `<img>` sources into `cid:` references.

use tracing::{debug, warn};

use super::classify::{ClassifiedImage, Classifier, extension_for, subtype_from_url};
use crate::html::tokenizer::{Token, Tokenizer};
use crate::html::{decode_entities, escape_text};
use crate::message::{AttachmentDescriptor, AttachmentPayload, ImageInfo};

/// Source of Content-IDs for one message.
pub trait CidGenerator {
    /// Returns a new Content-ID (without angle brackets) for an image with
    /// the given file extension. Must never repeat within a message.
    fn next_cid(&mut self, extension: &str) -> String;
}

/// `img{n}-{token}.{ext}@{domain}` with a per-message counter.
///
/// The counter makes ids unique within the message; the random token
/// keeps them distinct across messages.
#[derive(Debug, Clone)]
pub struct SequentialCids {
    counter: u32,
    token: String,
    domain: String,
}

impl SequentialCids {
    /// Creates a generator with a fresh random token.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self::with_token(domain, format!("{:08x}", rand::random::<u32>()))
    }

    /// Creates a generator with a fixed token.
    #[must_use]
    pub fn with_token(domain: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            counter: 0,
            token: token.into(),
            domain: domain.into(),
        }
    }
}

impl CidGenerator for SequentialCids {
    fn next_cid(&mut self, extension: &str) -> String {
        self.counter += 1;
        format!("img{}-{}.{extension}@{}", self.counter, self.token, self.domain)
    }
}

/// Result of rewriting a document's images.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// HTML with `cid:` and placeholder sources.
    pub html: String,
    /// One descriptor per rewritten image, in document order.
    pub attachments: Vec<AttachmentDescriptor>,
    /// Counts and inline payload size.
    pub image_info: ImageInfo,
    /// Images replaced by the placeholder.
    pub placeholders: u32,
}

/// Rewrites every `<img src>` in `html`.
///
/// Remote and inline images get a fresh Content-ID each, even when two
/// tags share a source, so every id is referenced exactly once. Unusable
/// sources point at `placeholder_url` and produce no attachment. No
/// network access happens here.
pub fn extract_images(
    html: &str,
    classifier: &Classifier,
    placeholder_url: &str,
    cids: &mut impl CidGenerator,
) -> Extraction {
    let mut out = Extraction {
        html: String::with_capacity(html.len()),
        ..Extraction::default()
    };
    let placeholder = escape_text(placeholder_url);

    for token in Tokenizer::new(html) {
        let tag = match token {
            Token::StartTag(tag) if tag.is("img") => tag,
            other => {
                out.html.push_str(other.raw());
                continue;
            }
        };
        let Some(src) = tag.attribute_value("src") else {
            out.html.push_str(tag.raw);
            continue;
        };

        let index = out.attachments.len() + 1;
        let descriptor = match classifier.classify(&decode_entities(src)) {
            ClassifiedImage::InlineBase64 { subtype, data } => {
                out.image_info.base64_count += 1;
                out.image_info.add_bytes(data.len());
                descriptor(cids, index, &subtype, AttachmentPayload::Bytes(data))
            }
            ClassifiedImage::RemoteUrl(url) => {
                out.image_info.url_count += 1;
                let subtype = subtype_from_url(&url);
                descriptor(cids, index, subtype, AttachmentPayload::Remote(url))
            }
            ClassifiedImage::LocalPath(path) => {
                warn!(path = %path, "Local image path cannot be sent, using placeholder");
                out.placeholders += 1;
                out.html.push_str(&tag.replace_attribute("src", &placeholder));
                continue;
            }
            ClassifiedImage::Malformed(reason) => {
                warn!(reason, "Unusable image source, using placeholder");
                out.placeholders += 1;
                out.html.push_str(&tag.replace_attribute("src", &placeholder));
                continue;
            }
        };

        debug!(cid = %descriptor.content_id, remote = descriptor.is_remote(), "Image attached");
        out.html
            .push_str(&tag.replace_attribute("src", &format!("cid:{}", descriptor.content_id)));
        out.attachments.push(descriptor);
    }

    out
}

fn descriptor(
    cids: &mut impl CidGenerator,
    index: usize,
    subtype: &str,
    payload: AttachmentPayload,
) -> AttachmentDescriptor {
    let ext = extension_for(subtype);
    AttachmentDescriptor {
        content_id: cids.next_cid(ext),
        filename: format!("image{index}.{ext}"),
        content_type: format!("image/{subtype}"),
        inline: true,
        payload,
    }
}
