//! Process-wide cache of fetched image bytes.
//!
//! Purely an optimization: entries may be missing or evicted at any time
//! without changing what gets sent.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;
use url::Url;

use super::fetch::FetchedImage;

/// Bounded URL-to-bytes cache with least-recently-used eviction.
#[derive(Debug)]
pub struct ImageCache {
    entries: Option<Mutex<LruCache<Url, FetchedImage>>>,
}

impl ImageCache {
    /// Creates a cache holding at most `capacity` images. Zero disables it.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Returns the cached image for `url`, marking it recently used.
    #[must_use]
    pub fn get(&self, url: &Url) -> Option<FetchedImage> {
        let entries = self.entries.as_ref()?;
        entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    /// Stores an image, evicting the least recently used entry when full.
    pub fn insert(&self, url: Url, image: FetchedImage) {
        if let Some(entries) = &self.entries {
            entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .put(url, image);
        }
    }

    /// Number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| {
            entries.lock().unwrap_or_else(PoisonError::into_inner).len()
        })
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(n: u32) -> Url {
        Url::parse(&format!("https://cdn.test/{n}.png")).unwrap()
    }

    fn image(byte: u8) -> FetchedImage {
        FetchedImage {
            content_type: Some("image/png".into()),
            data: vec![byte].into(),
        }
    }

    #[test]
    fn test_get_and_insert() {
        let cache = ImageCache::new(4);
        assert!(cache.get(&url(1)).is_none());
        cache.insert(url(1), image(1));
        assert_eq!(cache.get(&url(1)).unwrap().data.as_ref(), &[1]);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ImageCache::new(2);
        cache.insert(url(1), image(1));
        cache.insert(url(2), image(2));
        assert!(cache.get(&url(1)).is_some());
        cache.insert(url(3), image(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&url(2)).is_none());
        assert!(cache.get(&url(1)).is_some());
        assert!(cache.get(&url(3)).is_some());
    }

    #[test]
    fn test_reinsert_replaces_entry() {
        let cache = ImageCache::new(2);
        cache.insert(url(1), image(1));
        cache.insert(url(1), image(9));
        cache.insert(url(2), image(2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&url(1)).unwrap().data.as_ref(), &[9]);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = ImageCache::new(0);
        cache.insert(url(1), image(1));
        assert!(cache.is_empty());
        assert!(cache.get(&url(1)).is_none());
    }
}
