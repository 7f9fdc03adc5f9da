use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::slice;

use futures::future::FutureExt;
use tokio::sync::mpsc;

use crate::{
    batch_function::BatchFunction,
    cache::Cache,
    error::{LoadError, LoadResult},
    loader_op::{LoadRequest, LoaderOp},
    options::LoaderOptions,
};

#[cfg(feature = "stats")]
use crate::worker_stats::WorkerStats;

/// Where one position of a parked request finds its outcome: a value that was
/// already cached when the request arrived, or a slot in the frame's executor
/// input.
enum Slot<V, E> {
    Ready(LoadResult<V, E>),
    Staged(usize),
}

/// A load request that could not be answered from the cache alone and is
/// parked until the current execution frame has flushed.
struct PendingLoad<K, V, E> {
    request: LoadRequest<K, V, E>,
    positions: Vec<Slot<V, E>>,
}

/// A `LoaderWorker` is the "single-thread" worker task that actually does the loading work.
///
/// Once started, it runs in a loop until the parent Loader aborts it's `JoinHandle` or drops the
/// request queue tx channel.
///
/// The worker can be in one of three states during its lifetime:
///
/// 1. Waiting for requests
/// 2. Flushing the request queue and staging keys for loading.
/// 3. Executing its batch function with the staged keys.
///
/// One cycle through this loop may be called an "execution frame".
///
/// In state (1), the worker awaits any messages on the request queue channel, idling until work arrives.
///
/// In state (2), the worker will synchronously pull requests from the queue until it receives a
/// NoneType indicating that there are no more pending requests. Prime and Clear requests are
/// resolved immediately by synchronously issuing requests to the cache. For Load requests, the
/// worker checks if the request can be resolved immediately from the cache. If so, it immediately
/// sends the values on the load request's response channel, otherwise it stages the missing keys
/// for loading and parks the request. Staged keys keep their first-enqueued order, each occupying
/// one slot of the frame's executor input; while caching is enabled a derived key is staged at
/// most once per frame and later requesters share its slot, while caching disabled stages every
/// occurrence (duplicates included) in its own slot.
///
/// In state (3), the loader invokes its `BatchFunction` with the keys staged in (2), split into
/// chunks of at most `max_batch_size` keys. Batching disabled degenerates to a chunk per key, and
/// a chunk also flushes early the moment `max_batch_size` keys are staged. Chunk outcomes land in
/// the frame's slot-indexed results (and, when caching, in the cache map, rejections included),
/// and once the whole frame has flushed the parked requests are answered from their slots.
pub struct LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
    F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    CacheT: Cache,
    ContextT: Send + Sync + 'static,
{
    cache: CacheT,
    options: LoaderOptions<K>,
    request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V, F::Error>>,
    /// Executor input of the current frame, in enqueue order; index is the slot.
    staged_keys: Vec<K>,
    /// Slots already handed to the batch function.
    flushed: usize,
    /// Outcome per flushed slot, aligned with `staged_keys`.
    frame_results: Vec<LoadResult<V, F::Error>>,
    /// Derived key to slot, for dedup while caching is enabled.
    staged_slots: HashMap<K, usize>,
    pending_requests: Vec<PendingLoad<K, V, F::Error>>,
    context: ContextT,
    phantom_batch_function: PhantomData<F>,
    #[cfg(feature = "stats")]
    stats: WorkerStats,
}

impl<K, V, F, CacheT, ContextT> LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
    F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    CacheT: Cache<K = K, V = LoadResult<V, F::Error>>,
    ContextT: Send + Sync + 'static,
{
    pub fn new(
        cache: CacheT,
        options: LoaderOptions<K>,
        request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V, F::Error>>,
        context: ContextT,
    ) -> Self {
        Self {
            cache,
            options,
            request_rx,
            staged_keys: Vec::new(),
            flushed: 0,
            frame_results: Vec::new(),
            staged_slots: HashMap::new(),
            pending_requests: Vec::new(),
            context,
            phantom_batch_function: PhantomData,
            #[cfg(feature = "stats")]
            stats: WorkerStats::new(std::any::type_name::<(K, V)>()),
        }
    }

    pub async fn start(mut self) {
        loop {
            // Async await until we receive the first op.
            match self.request_rx.recv().await {
                None => {
                    tracing::info!("Tx channel closed. Terminating LoaderWorker.");
                    return;
                }
                Some(op) => self.mux_op(op),
            }
            self.flush_eager().await;
            // Flush remainder of the op queue before executing the frame.
            while let Some(Some(op)) = self.request_rx.recv().now_or_never() {
                self.mux_op(op);
                self.flush_eager().await;
            }
            self.flush_remaining().await;
            self.resolve_pending();
            self.staged_keys.clear();
            self.staged_slots.clear();
            self.frame_results.clear();
            self.flushed = 0;
        }
    }

    #[tracing::instrument(skip(self))]
    fn mux_op(&mut self, op: LoaderOp<K, V, F::Error>) {
        match op {
            LoaderOp::Load(request) => self.mux_load(request),
            LoaderOp::Prime { key, value, force } => self.prime(vec![(key, value)], force),
            LoaderOp::PrimeMany { key_vals, force } => self.prime(key_vals, force),
            LoaderOp::Clear(key) => {
                let derived = self.options.cache_key(&key);
                self.cache.remove(slice::from_ref(&derived));
                self.forget_flushed_slot(&derived);
            }
            LoaderOp::ClearMany(keys) => {
                let derived = keys.iter().map(|k| self.options.cache_key(k)).collect::<Vec<_>>();
                self.cache.remove(&derived);
                for derived_key in &derived {
                    self.forget_flushed_slot(derived_key);
                }
            }
            LoaderOp::ClearAll => {
                self.cache.flush();
                let flushed = self.flushed;
                self.staged_slots.retain(|_, slot| *slot >= flushed);
            }
        }
    }

    fn mux_load(&mut self, request: LoadRequest<K, V, F::Error>) {
        #[cfg(feature = "stats")]
        self.stats.record_load_request(request.keys().len() as u32);

        if !self.options.caching() {
            // Cache bypass: no lookups and no key derivation; every requested
            // key occupies its own slot, duplicates included.
            let positions = request
                .keys()
                .iter()
                .map(|raw| {
                    let slot = self.staged_keys.len();
                    self.staged_keys.push(raw.clone());
                    Slot::Staged(slot)
                })
                .collect::<Vec<_>>();
            self.pending_requests.push(PendingLoad { request, positions });
            return;
        }

        let derived = request.keys().iter().map(|k| self.options.cache_key(k)).collect::<Vec<_>>();
        let cached = self.cache.get(&derived);

        #[cfg(feature = "stats")]
        self.stats.record_cache_hits(cached.iter().filter(|v| v.is_some()).count() as u32);

        if cached.iter().all(Option::is_some) {
            tracing::debug!(requested_keys = ?request.keys(), "all keys cached");
            request.send_response(cached.into_iter().flatten());
            return;
        }

        let mut keys_to_load = Vec::new();
        let mut positions = Vec::with_capacity(request.keys().len());
        for ((raw, derived_key), hit) in
            request.keys().iter().zip(derived.into_iter()).zip(cached.into_iter())
        {
            match hit {
                Some(outcome) => positions.push(Slot::Ready(outcome)),
                None => {
                    let slot = match self.staged_slots.get(&derived_key) {
                        Some(slot) => *slot,
                        None => {
                            let slot = self.staged_keys.len();
                            self.staged_keys.push(raw.clone());
                            self.staged_slots.insert(derived_key, slot);
                            keys_to_load.push(raw.clone());
                            slot
                        }
                    };
                    positions.push(Slot::Staged(slot));
                }
            }
        }
        tracing::debug!(requested_keys = ?request.keys(), ?keys_to_load);
        self.pending_requests.push(PendingLoad { request, positions });
    }

    fn prime(&mut self, key_vals: Vec<(K, V)>, force: bool) {
        for (key, value) in key_vals {
            let derived = self.options.cache_key(&key);
            let occupied =
                self.cache.get(slice::from_ref(&derived)).pop().flatten().is_some();
            if force || !occupied {
                self.cache.insert(derived, Ok(value));
            }
        }
    }

    /// A clear landing mid-frame must also drop the dedup slot of a key whose
    /// chunk already flushed, so that a later load in the same frame re-stages
    /// it. Slots that have not flushed yet stay: their fetch happens after the
    /// clear and is fresh.
    fn forget_flushed_slot(&mut self, derived: &K) {
        let already_flushed =
            self.staged_slots.get(derived).map_or(false, |slot| *slot < self.flushed);
        if already_flushed {
            self.staged_slots.remove(derived);
        }
    }

    /// Flushes ahead of the frame boundary: per-key when batching is off, and
    /// whole chunks as soon as the staged count reaches `max_batch_size`.
    async fn flush_eager(&mut self) {
        if !self.options.batching() {
            while self.flushed < self.staged_keys.len() {
                self.flush_next(1).await;
            }
        } else if let Some(cap) = self.options.batch_cap() {
            while self.staged_keys.len() - self.flushed >= cap {
                self.flush_next(cap).await;
            }
        }
    }

    /// Flushes whatever is still staged at the end of the frame.
    async fn flush_remaining(&mut self) {
        while self.flushed < self.staged_keys.len() {
            let pending = self.staged_keys.len() - self.flushed;
            let take = self.options.batch_cap().map_or(pending, |cap| cap.min(pending));
            self.flush_next(take).await;
        }
    }

    async fn flush_next(&mut self, take: usize) {
        let chunk = self.staged_keys[self.flushed..self.flushed + take].to_vec();
        self.flushed += take;
        self.execute_load(chunk).await;
    }

    #[tracing::instrument(skip(self))]
    async fn execute_load(&mut self, chunk: Vec<K>) {
        #[cfg(feature = "stats")]
        self.stats.record_batch_exec(chunk.len() as u32);

        let outcome = F::load(&chunk, &self.context).await;
        tracing::debug!(batch_keys = ?chunk, ?outcome);

        let per_key: Vec<LoadResult<V, F::Error>> = match outcome {
            Ok(results) if results.len() == chunk.len() => {
                results.into_iter().map(|r| r.map_err(LoadError::Batch)).collect()
            }
            Ok(results) => {
                let err = LoadError::ResultCountMismatch {
                    expected: chunk.len(),
                    actual: results.len(),
                };
                tracing::error!(batch_keys = ?chunk, %err, "batch function broke its contract");
                chunk.iter().map(|_| Err(err.clone())).collect()
            }
            Err(e) => chunk.iter().map(|_| Err(LoadError::Batch(e.clone()))).collect(),
        };

        let mut cache_entries = Vec::new();
        for (raw, outcome) in chunk.into_iter().zip(per_key) {
            if self.options.caching() {
                cache_entries.push((self.options.cache_key(&raw), outcome.clone()));
            }
            self.frame_results.push(outcome);
        }
        self.cache.insert_many(cache_entries);
    }

    /// Answers every parked request from its stage-time cache hits plus the
    /// slot-indexed results of this frame's flushes. Every staged slot is
    /// guaranteed an outcome by the time this runs.
    fn resolve_pending(&mut self) {
        for pending in self.pending_requests.drain(..) {
            let PendingLoad { request, positions } = pending;
            let outcomes = positions
                .into_iter()
                .map(|position| match position {
                    Slot::Ready(outcome) => outcome,
                    Slot::Staged(slot) => self
                        .frame_results
                        .get(slot)
                        .cloned()
                        .expect("staged slot resolved without an outcome"),
                })
                .collect::<Vec<_>>();
            request.send_response(outcomes);
        }
    }
}
