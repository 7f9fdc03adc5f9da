use thiserror::Error;

/// Failure of a single load, as observed by the caller that awaited it.
///
/// `E` is the error type of the loader's [`BatchFunction`](crate::BatchFunction).
/// Rejections are cached like any other outcome; a key whose load failed stays
/// rejected until it is [`clear`](crate::Loader::clear)ed and requested again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError<E> {
    /// The batch function reported an error, either for the whole batch or for
    /// this key's position in the result vector.
    #[error("batch function failed: {0:?}")]
    Batch(E),
    /// The batch function returned a result vector whose length does not match
    /// the key slice it was given. Every request in the offending batch is
    /// rejected with this error; nothing is truncated or retried.
    #[error("batch function returned {actual} results for {expected} keys")]
    ResultCountMismatch { expected: usize, actual: usize },
}

/// Outcome of one load. This is also the value type stored in the cache map.
pub type LoadResult<V, E> = Result<V, LoadError<E>>;
