//! Delivery: resolving remote images, MIME assembly, and hand-off to a
//! [`Transport`].

mod smtp;
mod transport;

use std::sync::Arc;

use futures::future::join_all;
use inkpost_mime::{ContentType, InlineImage, MessageBuilder};
use tracing::{debug, info, warn};

use crate::image::{FetchedImage, ImageCache, ImageFetcher};
use crate::message::{AttachmentDescriptor, AttachmentPayload, Envelope, ImageInfo, OutboundMessage, Receipt};

pub use smtp::SmtpTransport;
pub use transport::{Transport, TransportError, TransportErrorKind};

/// Errors that abort a dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The MIME message could not be assembled.
    #[error("Message assembly failed: {0}")]
    Assembly(#[from] inkpost_mime::Error),

    /// The transport refused or failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Classifies the failure.
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Assembly(_) => TransportErrorKind::Permanent,
            Self::Transport(e) => e.kind(),
        }
    }
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Transport receipt.
    pub receipt: Receipt,
    /// Image statistics including fetched remote bytes.
    pub image_info: ImageInfo,
    /// Images that were sent.
    pub attached: usize,
    /// Remote images dropped because they could not be fetched.
    pub dropped: usize,
}

/// Turns prepared messages into deliveries.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    fetcher: Arc<dyn ImageFetcher>,
    cache: Arc<ImageCache>,
    id_domain: String,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cache_entries", &self.cache.len())
            .field("id_domain", &self.id_domain)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher. Message-IDs are generated under `id_domain`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn ImageFetcher>,
        cache: Arc<ImageCache>,
        id_domain: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            fetcher,
            cache,
            id_domain: id_domain.into(),
        }
    }

    /// Fetches remote images, assembles the MIME message and sends it.
    ///
    /// All remote fetches run concurrently and are awaited before
    /// assembly. A failed fetch drops that image only; its `cid:` reference
    /// stays in the HTML.
    ///
    /// # Errors
    ///
    /// Returns an error if assembly fails or the transport fails.
    pub async fn dispatch(
        &self,
        message: OutboundMessage,
        mut image_info: ImageInfo,
    ) -> Result<Delivery, DispatchError> {
        let total = message.attachments.len();
        let resolved = join_all(message.attachments.into_iter().map(|a| self.resolve(a))).await;

        let mut images = Vec::with_capacity(total);
        for (image, fetched_bytes) in resolved.into_iter().flatten() {
            if let Some(len) = fetched_bytes {
                image_info.add_bytes(len);
            }
            images.push(image);
        }
        let dropped = total - images.len();
        let attached = images.len();

        let message_id = format!("{:016x}{:08x}@{}", rand::random::<u64>(), rand::random::<u32>(), self.id_domain);
        let mut builder = MessageBuilder::new()
            .from(message.from.header_value())
            .subject(&message.subject)
            .text_body(message.plaintext_body)
            .html_body(message.html_body)
            .message_id(&message_id);
        for to in &message.to {
            builder = builder.to(to.header_value());
        }
        for image in images {
            builder = builder.inline_image(image);
        }
        let raw = builder.build()?.to_bytes()?;

        let envelope = Envelope {
            from: message.from.email,
            to: message.to.into_iter().map(|m| m.email).collect(),
            message_id,
        };
        debug!(bytes = raw.len(), attached, dropped, "Message assembled");

        let receipt = self.transport.send(&envelope, &raw).await?;
        info!(message_id = %receipt.message_id, recipients = envelope.to.len(), "Message sent");

        Ok(Delivery {
            receipt,
            image_info,
            attached,
            dropped,
        })
    }

    /// Resolves a descriptor to an inline image and, for remote images,
    /// the number of fetched bytes. `None` drops the image.
    async fn resolve(&self, attachment: AttachmentDescriptor) -> Option<(InlineImage, Option<usize>)> {
        let AttachmentDescriptor {
            content_id,
            filename,
            content_type,
            payload,
            ..
        } = attachment;

        let (content_type, data, fetched) = match payload {
            AttachmentPayload::Bytes(data) => (content_type, data, None),
            AttachmentPayload::Remote(url) => {
                let image = match self.cache.get(&url) {
                    Some(hit) => {
                        debug!(url = %url, "Image cache hit");
                        hit
                    }
                    None => match self.fetcher.fetch(&url).await {
                        Ok(image) => {
                            self.cache.insert(url.clone(), image.clone());
                            image
                        }
                        Err(e) => {
                            warn!(url = %url, error = %e, "Dropping image that could not be fetched");
                            return None;
                        }
                    },
                };
                let FetchedImage {
                    content_type: served_type,
                    data,
                } = image;
                let len = data.len();
                (served_type.unwrap_or(content_type), data.to_vec(), Some(len))
            }
        };

        let content_type = ContentType::parse(&content_type)
            .unwrap_or_else(|_| ContentType::new("application", "octet-stream"));

        Some((
            InlineImage {
                content_id,
                filename,
                content_type,
                data,
            },
            fetched,
        ))
    }
}
