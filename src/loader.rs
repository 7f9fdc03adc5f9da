use std::ops::Drop;
use std::{collections::HashMap, fmt::Debug, hash::Hash};

use tokio::sync::{mpsc, oneshot};
use tracing::{span, Instrument, Level};

use crate::{
    batch_function::BatchFunction,
    cache::Cache,
    error::LoadResult,
    loader_op::{LoadRequest, LoaderOp},
    loader_worker::LoaderWorker,
    options::LoaderOptions,
};

/// Batch loads values from some expensive resource, primarily intended for mitigating GraphQL's
/// N+1 problem.
///
/// Users can call [`Loader::load`] and [`Loader::load_many`] to fetch values from the underlying resource or
/// cache. The cache can be cleared with calls to [`Loader::clear`], [`Loader::clear_many`] and
/// [`Loader::clear_all`], and values can be added to the cache out-of-band through the use of
/// [`Loader::prime`], [`Loader::prime_many`] and [`Loader::prime_force`].
///
/// The `Loader` struct acts as an intermediary between the async domain in which `load` calls are
/// invoked and the pseudo-single-threaded domain of the `LoaderWorker`. Callers can invoke the
/// `Loader` from multiple parallel tasks, and the loader will enqueue the requested operations on
/// the request queue for processing by its `LoaderWorker`. The worker processes the requests
/// sequentially and provides results via response oneshot channels back to the Loader. All
/// `load` calls issued within one execution frame of the worker are coalesced into batches
/// according to the loader's [`LoaderOptions`].
pub struct Loader<K, V, E>
where
    K: 'static + Eq + Hash + Debug + Clone + Send,
    V: 'static + Send + Debug + Clone,
    E: 'static + Send + Debug + Clone,
{
    request_tx: mpsc::UnboundedSender<LoaderOp<K, V, E>>,
    load_task_handle: tokio::task::JoinHandle<()>,
}

impl<K, V, E> Drop for Loader<K, V, E>
where
    K: 'static + Eq + Hash + Debug + Clone + Send,
    V: 'static + Send + Debug + Clone,
    E: 'static + Send + Debug + Clone,
{
    fn drop(&mut self) {
        self.load_task_handle.abort();
    }
}

impl<K, V, E> Loader<K, V, E>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
    E: 'static + Send + Debug + Clone,
{
    /// Creates a new Loader for the provided BatchFunction and Context type,
    /// with default options and a fresh in-memory cache.
    ///
    /// Note: the batch function is passed in as a marker for type inference.
    pub fn new<F, ContextT>(batch_fn: F, context: ContextT) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT, Error = E> + Send,
    {
        Self::with_options(batch_fn, context, LoaderOptions::default())
    }

    /// Creates a new Loader with the provided options and a fresh in-memory cache.
    pub fn with_options<F, ContextT>(
        batch_fn: F,
        context: ContextT,
        options: LoaderOptions<K>,
    ) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT, Error = E> + Send,
    {
        Self::with_cache(batch_fn, context, options, HashMap::new())
    }

    /// Creates a new Loader on top of a caller-supplied cache map.
    ///
    /// The cache map does not have to be exclusively owned: wrap any cache in
    /// `Arc<Mutex<_>>` and hand clones to several loaders to share one
    /// memoization scope across them.
    pub fn with_cache<F, ContextT, CacheT>(
        _: F,
        context: ContextT,
        options: LoaderOptions<K>,
        cache: CacheT,
    ) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT, Error = E> + Send,
        CacheT: 'static + Cache<K = K, V = LoadResult<V, E>> + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = LoaderWorker::<K, V, F, CacheT, ContextT>::new(cache, options, rx, context);
        let worker_span = span!(Level::TRACE, "LoaderWorker", kv = std::any::type_name::<(K, V)>());
        Self {
            request_tx: tx,
            load_task_handle: tokio::task::spawn(worker.start().instrument(worker_span)),
        }
    }

    /// Loads a value from the underlying resource.
    ///
    /// If the value is already in the loader cache, it is returned as soon as the request is
    /// processed. Otherwise, the requested key is enqueued for batch loading in the next loader
    /// execution frame.
    ///
    /// Returns the error recorded for the key when its batch failed: the batch function's own
    /// error, or [`LoadError::ResultCountMismatch`](crate::LoadError::ResultCountMismatch) when
    /// the batch function returned a malformed result vector. Failed keys stay rejected until
    /// [`Loader::clear`]ed.
    pub async fn load(&self, key: K) -> LoadResult<V, E> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx.send(LoaderOp::Load(LoadRequest::One(key, response_tx))).unwrap();
        response_rx.await.unwrap()
    }

    /// Loads many values at once.
    ///
    /// The returned outcomes are in input-key order, and a failed key does not
    /// short-circuit the rest: every key gets its own outcome.
    pub async fn load_many(&self, keys: Vec<K>) -> Vec<LoadResult<V, E>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx.send(LoaderOp::Load(LoadRequest::Many(keys, response_tx))).unwrap();
        response_rx.await.unwrap()
    }

    /// Adds a value to the cache.
    ///
    /// No-op when the key already has a cache entry; use [`Loader::prime_force`] to overwrite.
    pub async fn prime(&self, key: K, value: V) {
        self.request_tx.send(LoaderOp::Prime { key, value, force: false }).unwrap();
    }

    /// Adds many values to the cache at once, skipping keys that already have an entry.
    pub async fn prime_many(&self, key_vals: Vec<(K, V)>) {
        self.request_tx.send(LoaderOp::PrimeMany { key_vals, force: false }).unwrap();
    }

    /// Adds a value to the cache, replacing any existing entry for the key.
    pub async fn prime_force(&self, key: K, value: V) {
        self.request_tx.send(LoaderOp::Prime { key, value, force: true }).unwrap();
    }

    /// Removes a value from the cache.
    ///
    /// This key will be reloaded when it is next requested.
    pub async fn clear(&self, key: K) {
        self.request_tx.send(LoaderOp::Clear(key)).unwrap();
    }

    /// Removes multiple values from the cache at once.
    ///
    /// These keys will be reloaded when requested.
    pub async fn clear_many(&self, keys: Vec<K>) {
        self.request_tx.send(LoaderOp::ClearMany(keys)).unwrap();
    }

    /// Empties the cache entirely.
    pub async fn clear_all(&self) {
        self.request_tx.send(LoaderOp::ClearAll).unwrap();
    }
}
