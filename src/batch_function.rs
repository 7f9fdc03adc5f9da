use std::fmt::Debug;

use async_trait::async_trait;

/// A `BatchFunction` defines the method through which some `Loader` may fetch
/// batched data from some resource. The `BatchFunction` receives a slice of keys
/// that have been requested during the `Loader`'s most recent execution frame, and some user
/// defined context struct.
///
/// The returned vector must be positionally aligned with `keys`: one result per
/// key, in the same order. Returning a vector of any other length is a contract
/// violation and rejects every request in the batch with
/// [`LoadError::ResultCountMismatch`](crate::LoadError::ResultCountMismatch).
///
/// Failure comes in two shapes. Returning `Err` at the outer level fails the
/// whole batch and every pending request receives that error. Returning `Err` at a
/// single position fails only the request(s) for that key, and the remaining
/// positions resolve normally. The error type must be `Clone` because one batch
/// error may fan out to many waiting requesters.
///
/// Multiple `BatchFunctions` (and therefore loaders) can share the same context (likely through an
/// `Arc`).
#[async_trait]
pub trait BatchFunction<K, V> {
    type Context;
    type Error: 'static + Clone + Send + Debug;

    async fn load(
        keys: &[K],
        context: &Self::Context,
    ) -> Result<Vec<Result<V, Self::Error>>, Self::Error>;
}
