//! Platform-specific TTL cache.
//!
//! Wraps mini-moka-wasm's sync (native) and unsync (WASM) caches behind one
//! cloneable handle. Native uses the sync cache (thread-safe).
//! WASM uses the unsync cache wrapped in Arc<Mutex<>> (single-threaded but
//! needs interior mutability).

use std::hash::Hash;
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::*;

    pub type Inner<K, V> = mini_moka_wasm::sync::Cache<K, V>;

    pub fn new_inner<K, V>(max_capacity: u64, ttl: Duration) -> Inner<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        mini_moka_wasm::sync::Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build()
    }

    pub fn get<K, V>(cache: &Inner<K, V>, key: &K) -> Option<V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        cache.get(key)
    }

    pub fn insert<K, V>(cache: &Inner<K, V>, key: K, value: V)
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        cache.insert(key, value);
    }

    pub fn remove<K, V>(cache: &Inner<K, V>, key: &K)
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        cache.invalidate(key);
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm {
    use super::*;
    use std::sync::{Arc, Mutex, PoisonError};

    pub type Inner<K, V> = Arc<Mutex<mini_moka_wasm::unsync::Cache<K, V>>>;

    pub fn new_inner<K, V>(max_capacity: u64, ttl: Duration) -> Inner<K, V>
    where
        K: Hash + Eq + 'static,
        V: Clone + 'static,
    {
        Arc::new(Mutex::new(
            mini_moka_wasm::unsync::Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        ))
    }

    pub fn get<K, V>(cache: &Inner<K, V>, key: &K) -> Option<V>
    where
        K: Hash + Eq + 'static,
        V: Clone + 'static,
    {
        cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert<K, V>(cache: &Inner<K, V>, key: K, value: V)
    where
        K: Hash + Eq + 'static,
        V: Clone + 'static,
    {
        cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    pub fn remove<K, V>(cache: &Inner<K, V>, key: &K)
    where
        K: Hash + Eq + 'static,
        V: Clone + 'static,
    {
        cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .invalidate(key);
    }
}

#[cfg(not(target_arch = "wasm32"))]
use native as imp;

#[cfg(target_arch = "wasm32")]
use wasm as imp;

/// A bounded cache whose entries expire `ttl` after insertion.
///
/// Cloning is cheap and clones share storage.
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: imp::Inner<K, V>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: imp::new_inner(max_capacity, ttl),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        imp::get(&self.inner, key)
    }

    pub fn insert(&self, key: K, value: V) {
        imp::insert(&self.inner, key, value);
    }

    pub fn remove(&self, key: &K) {
        imp::remove(&self.inner, key);
    }
}
