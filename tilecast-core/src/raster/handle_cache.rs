use std::sync::{Arc, Mutex};

use gdal::Dataset;
use moka::sync::Cache;
use tracing::instrument;

use super::read::open_dataset;
use crate::error::RenderError;

/// Process-wide, reference-counted LRU of open `gdal::Dataset` handles
/// keyed by URL. Concurrent openers for the same URL coalesce onto the
/// single in-flight open via `moka`'s `try_get_with`; the cache never
/// hands out a handle after it has been evicted because eviction simply
/// drops the cache's `Arc`, and any reader still holding a clone keeps
/// the dataset alive until its own reads finish.
#[derive(Debug, Clone)]
pub struct HandleCache {
    cache: Cache<String, Arc<Mutex<Dataset>>>,
}

impl HandleCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::new(capacity),
        }
    }

    #[instrument(skip(self), fields(url))]
    pub fn get_or_open(&self, url: &str) -> Result<Arc<Mutex<Dataset>>, Arc<RenderError>> {
        self.cache
            .try_get_with(url.to_string(), || open_dataset(url).map(Mutex::new).map(Arc::new))
    }

    pub fn invalidate(&self, url: &str) {
        self.cache.invalidate(url);
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
