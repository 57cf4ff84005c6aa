//! Image classification, extraction and fetching.

mod cache;
mod classify;
mod extract;
mod fetch;

pub use cache::ImageCache;
pub use classify::{ClassifiedImage, Classifier, extension_for, subtype_from_url};
pub use extract::{CidGenerator, Extraction, SequentialCids, extract_images};
pub use fetch::{FetchError, FetchedImage, HttpImageFetcher, ImageFetcher};
