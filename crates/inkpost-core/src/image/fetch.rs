//! Remote image fetching.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

/// Bytes of a fetched image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    /// `image/*` content type reported by the server, if any.
    pub content_type: Option<String>,
    /// Image bytes.
    pub data: Arc<[u8]>,
}

/// Errors from a single image fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Server answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// Image is larger than the configured limit.
    #[error("image exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit.
        limit: usize,
    },

    /// Fetch did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Fetches remote images for the dispatcher.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Downloads the image at `url`.
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, FetchError>;
}

/// [`ImageFetcher`] over HTTPS with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpImageFetcher {
    /// Creates a fetcher with a per-request timeout and a size limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("inkpost/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            timeout,
            max_bytes,
        })
    }

    async fn download(&self, url: &Url) -> Result<FetchedImage, FetchError> {
        let mut response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(image_essence);

        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if data.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            data.extend_from_slice(&chunk);
        }

        debug!(url = %url, bytes = data.len(), "Fetched image");
        Ok(FetchedImage {
            content_type,
            data: data.into(),
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, FetchError> {
        match tokio::time::timeout(self.timeout, self.download(url)).await {
            Ok(Err(FetchError::Request(e))) if e.is_timeout() => Err(FetchError::Timeout(self.timeout)),
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }
}

/// Returns the lowercased `type/subtype` of an `image/*` content type.
fn image_essence(value: &str) -> Option<String> {
    let essence = value.split(';').next()?.trim().to_ascii_lowercase();
    (essence.starts_with("image/") && essence.len() > "image/".len()).then_some(essence)
}
