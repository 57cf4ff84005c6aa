//! The HTML-to-email pipeline.
//!
//! `body -> sanitize -> scrub -> extract images -> wrap -> plaintext`.
//! Pure apart from logging; no network access.

use tracing::debug;
use url::Url;

use crate::config::PipelineSettings;
use crate::html::{body_fragment, derive_plaintext, sanitize, scrub_attributes, wrap_in_layout};
use crate::image::{CidGenerator, Classifier, SequentialCids, extract_images};
use crate::message::{AttachmentDescriptor, ImageInfo};
use crate::{Error, Result};

/// An email ready for dispatch.
#[derive(Debug, Clone)]
pub struct PreparedEmail {
    /// Final HTML document with `cid:` references.
    pub html: String,
    /// Plaintext alternative.
    pub plaintext: String,
    /// Inline images in document order.
    pub attachments: Vec<AttachmentDescriptor>,
    /// Image statistics before remote fetching.
    pub image_info: ImageInfo,
    /// Images replaced by the placeholder.
    pub placeholders: u32,
}

/// Pipeline configured from [`PipelineSettings`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    classifier: Classifier,
    placeholder_url: String,
    cid_domain: String,
    sanitize: bool,
}

impl Pipeline {
    /// Builds a pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if `site_origin` is not an absolute http(s) URL.
    pub fn from_settings(settings: &PipelineSettings) -> Result<Self> {
        let site_origin = settings
            .site_origin
            .as_deref()
            .map(parse_origin)
            .transpose()?;

        Ok(Self {
            classifier: Classifier::new(site_origin, settings.upgrade_http),
            placeholder_url: settings.placeholder_image_url.clone(),
            cid_domain: settings.cid_domain.clone(),
            sanitize: settings.sanitize,
        })
    }

    /// Domain used for Content-IDs and Message-IDs.
    #[must_use]
    pub fn cid_domain(&self) -> &str {
        &self.cid_domain
    }

    /// Prepares `html` with fresh Content-IDs.
    #[must_use]
    pub fn prepare(&self, html: &str, subject: &str) -> PreparedEmail {
        self.prepare_with(html, subject, &mut SequentialCids::new(&self.cid_domain))
    }

    /// Prepares `html` using the given Content-ID source.
    #[must_use]
    pub fn prepare_with(
        &self,
        html: &str,
        subject: &str,
        cids: &mut impl CidGenerator,
    ) -> PreparedEmail {
        let fragment = body_fragment(html);
        let cleaned = if self.sanitize {
            sanitize(fragment)
        } else {
            fragment.to_string()
        };
        let scrubbed = scrub_attributes(&cleaned);
        let extraction = extract_images(&scrubbed, &self.classifier, &self.placeholder_url, cids);

        let html = wrap_in_layout(&extraction.html, subject);
        let plaintext = derive_plaintext(&extraction.html);
        debug!(
            attachments = extraction.attachments.len(),
            placeholders = extraction.placeholders,
            "Email prepared"
        );

        PreparedEmail {
            html,
            plaintext,
            attachments: extraction.attachments,
            image_info: extraction.image_info,
            placeholders: extraction.placeholders,
        }
    }
}

fn parse_origin(origin: &str) -> Result<Url> {
    let url = Url::parse(origin).map_err(|e| Error::Config(format!("site_origin {origin:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::Config(format!(
            "site_origin {origin:?} must be an http(s) URL"
        )));
    }
    Ok(url)
}
