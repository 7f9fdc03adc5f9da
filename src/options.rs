use std::fmt;
use std::sync::Arc;

/// Behavioral knobs for a [`Loader`](crate::Loader), fixed at construction time.
///
/// The defaults reproduce the reference dataloader behavior: batching on,
/// unbounded batch size, caching on, raw keys used as cache keys.
pub struct LoaderOptions<K> {
    batch: bool,
    max_batch_size: Option<usize>,
    cache: bool,
    cache_key_fn: Option<Arc<dyn Fn(&K) -> K + Send + Sync>>,
}

impl<K> Default for LoaderOptions<K> {
    fn default() -> Self {
        Self { batch: true, max_batch_size: None, cache: true, cache_key_fn: None }
    }
}

impl<K> Clone for LoaderOptions<K> {
    fn clone(&self) -> Self {
        Self {
            batch: self.batch,
            max_batch_size: self.max_batch_size,
            cache: self.cache,
            cache_key_fn: self.cache_key_fn.clone(),
        }
    }
}

impl<K> fmt::Debug for LoaderOptions<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderOptions")
            .field("batch", &self.batch)
            .field("max_batch_size", &self.max_batch_size)
            .field("cache", &self.cache)
            .field("cache_key_fn", &self.cache_key_fn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl<K> LoaderOptions<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// When false, every requested key is flushed immediately as its own
    /// single-key batch. Useful for debugging a misbehaving batch function.
    pub fn batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    /// Caps how many keys a single batch function invocation may receive.
    /// Staged keys beyond the cap spill into further invocations, in enqueue
    /// order. Unset or zero means unbounded.
    pub fn max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max);
        self
    }

    /// When false, the cache map is bypassed entirely: no lookups, no
    /// deduplication, no stored outcomes. Every `load` reaches the batch
    /// function.
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Derives the cache/deduplication key from a requested key, letting
    /// structurally distinct keys collapse into one cache slot. The batch
    /// function still receives the raw key as requested.
    pub fn cache_key_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&K) -> K + Send + Sync + 'static,
    {
        self.cache_key_fn = Some(Arc::new(f));
        self
    }

    pub(crate) fn batching(&self) -> bool {
        self.batch
    }

    pub(crate) fn batch_cap(&self) -> Option<usize> {
        self.max_batch_size.filter(|&cap| cap > 0)
    }

    pub(crate) fn caching(&self) -> bool {
        self.cache
    }

    pub(crate) fn cache_key(&self, key: &K) -> K
    where
        K: Clone,
    {
        match &self.cache_key_fn {
            Some(f) => f(key),
            None => key.clone(),
        }
    }
}
