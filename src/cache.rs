use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::{Arc, Mutex};

/// Storage backing a loader's memoization of load outcomes.
///
/// The default backing store is a plain `HashMap`, but anything satisfying this
/// interface can be plugged in via [`Loader::with_cache`](crate::Loader::with_cache).
/// Lookups return owned values rather than references so that implementations
/// over shared or remote storage are possible; in particular `Arc<Mutex<C>>`
/// implements `Cache` for any `C: Cache`, which is how one cache map can be
/// shared between several loader instances.
pub trait Cache {
    type K;
    type V;

    /// Returns the values associated with the provided keys, in key order.
    fn get(&self, keys: &[Self::K]) -> Vec<Option<Self::V>>;

    fn insert(&mut self, key: Self::K, value: Self::V);
    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I);

    fn remove(&mut self, keys: &[Self::K]);
    fn flush(&mut self);
}

impl<K, V, S: BuildHasher> Cache for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
{
    type K = K;
    type V = V;

    fn get(&self, keys: &[Self::K]) -> Vec<Option<Self::V>> {
        keys.iter().map(|k| self.get(k).cloned()).collect::<Vec<_>>()
    }

    fn insert(&mut self, key: Self::K, value: Self::V) {
        self.insert(key, value);
    }

    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I) {
        for (key, value) in key_vals.into_iter() {
            self.insert(key, value);
        }
    }

    fn remove(&mut self, keys: &[Self::K]) {
        for key in keys.iter() {
            self.remove(key);
        }
    }

    fn flush(&mut self) {
        self.clear();
    }
}

impl<C: Cache> Cache for Arc<Mutex<C>> {
    type K = C::K;
    type V = C::V;

    fn get(&self, keys: &[Self::K]) -> Vec<Option<Self::V>> {
        self.lock().unwrap().get(keys)
    }

    fn insert(&mut self, key: Self::K, value: Self::V) {
        self.lock().unwrap().insert(key, value);
    }

    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I) {
        self.lock().unwrap().insert_many(key_vals);
    }

    fn remove(&mut self, keys: &[Self::K]) {
        self.lock().unwrap().remove(keys);
    }

    fn flush(&mut self) {
        self.lock().unwrap().flush();
    }
}
