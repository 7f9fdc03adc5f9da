use std::slice;

use tokio::sync::oneshot;

use crate::error::LoadResult;

/// Set of possible requests that can be sent to the [`LoaderWorker`]
///
/// The three categories of commands are Load, Prime, and Clear; each of which has a single and
/// many variant for convenience.
#[derive(Debug)]
pub enum LoaderOp<K, V, E> {
    /// Fetch data from the resource wrapped by this data loader (or the cache).
    Load(LoadRequest<K, V, E>),
    /// Add values to the cache that were fetched from elsewhere. Unless `force`
    /// is set, keys that already have a cache entry are left untouched.
    Prime { key: K, value: V, force: bool },
    PrimeMany { key_vals: Vec<(K, V)>, force: bool },
    /// Remove values from the cache so that they will be reloaded when they are next requested.
    Clear(K),
    ClearMany(Vec<K>),
    ClearAll,
}

#[derive(Debug)]
pub enum LoadRequest<K, V, E> {
    One(K, oneshot::Sender<LoadResult<V, E>>),
    Many(Vec<K>, oneshot::Sender<Vec<LoadResult<V, E>>>),
}

impl<K, V, E> LoadRequest<K, V, E>
where
    V: Send + std::fmt::Debug,
    E: Send + std::fmt::Debug,
{
    pub fn keys(&self) -> &[K] {
        match self {
            LoadRequest::One(ref key, _) => slice::from_ref(key),
            LoadRequest::Many(ref keys, _) => keys,
        }
    }

    pub fn send_response<I>(self, outcomes: I)
    where
        I: IntoIterator<Item = LoadResult<V, E>>,
    {
        match self {
            LoadRequest::One(_, response_tx) => {
                let Some(response) = outcomes.into_iter().next() else {
                    tracing::error!("no outcome produced for single-key request");
                    return;
                };
                if let Err(e) = response_tx.send(response) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
            LoadRequest::Many(_, response_tx) => {
                let response = outcomes.into_iter().collect::<Vec<_>>();
                if let Err(e) = response_tx.send(response) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
        }
    }
}
