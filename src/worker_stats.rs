#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Human readable name used to identify this worker stats when it is reported.
    tag: &'static str,
    /// Number of `LoaderOp::Load` that were received by the worker.
    load_requests: u32,
    /// The total number of keys that were requested for loading (not necessarily unique).
    items_requested: u32,
    /// The number of keys that were immediately found in the loader cache.
    cache_hits: u32,
    /// Number of batches handed to the batch function.
    batches: u32,
    /// The average number of keys per executed batch.
    average_batch_size: f32,
    /// The max number of keys handed to the batch function in a single batch.
    max_batch_size: u32,
    /// The min number of keys handed to the batch function in a single batch.
    min_batch_size: u32,
}

impl WorkerStats {
    pub fn new(tag: &'static str) -> Self {
        Self { tag, min_batch_size: u32::MAX, ..Default::default() }
    }

    pub fn record_load_request(&mut self, items_requested: u32) {
        self.load_requests += 1;
        self.items_requested += items_requested;
    }

    pub fn record_cache_hits(&mut self, hits: u32) {
        self.cache_hits += hits;
    }

    pub fn record_batch_exec(&mut self, batch_size: u32) {
        let new_total = self.batches + 1;
        self.average_batch_size = (((self.average_batch_size as f64 * self.batches as f64)
            + batch_size as f64)
            / new_total as f64) as f32;
        self.batches = new_total;
        if batch_size > self.max_batch_size {
            self.max_batch_size = batch_size;
        }
        if batch_size < self.min_batch_size {
            self.min_batch_size = batch_size;
        }
    }
}

impl Drop for WorkerStats {
    fn drop(&mut self) {
        tracing::debug!(worker_stats = ?self);
    }
}
