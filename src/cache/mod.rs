//! Key/value cache capability.
//!
//! The cache is advisory: every read goes through [`get_or_compute`], which
//! falls back to the database whenever the backend misses, fails, or holds a
//! value that no longer decodes. Writers call [`invalidate`] after their
//! transaction commits.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub mod keys;
pub mod memory;

pub use memory::{CacheStatistics, InMemoryCache, NoCache};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend failure: {0}")]
    Backend(String),

    #[error("cache value codec error")]
    Codec(#[from] serde_json::Error),
}

/// How long a stored entry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The backend's default lifetime.
    Default,
    After(Duration),
    /// Kept until deleted.
    Never,
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set_raw(&self, key: &str, value: Vec<u8>, expiry: Expiry) -> Result<(), CacheError>;

    /// Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key starting with `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

pub type SharedCache = Arc<dyn Cache>;

pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn Cache,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match cache.get_raw(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    expiry: Expiry,
) -> Result<(), CacheError> {
    let bytes = serde_json::to_vec(value)?;
    cache.set_raw(key, bytes, expiry).await
}

/// Read-through lookup: return the cached value for `key`, or run `compute`,
/// store its result for `ttl` and return it.
pub async fn get_or_compute<T, E, F, Fut>(
    cache: &dyn Cache,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match get_json::<T>(cache, key).await {
        Ok(Some(value)) => {
            tracing::trace!(key, "cache hit");
            return Ok(value);
        }
        Ok(None) => tracing::trace!(key, "cache miss"),
        Err(CacheError::Codec(err)) => {
            tracing::warn!(key, error = %err, "stale cache entry, recomputing");
            if let Err(err) = cache.delete(key).await {
                tracing::warn!(key, error = %err, "cache delete failed");
            }
        }
        Err(err) => tracing::warn!(key, error = %err, "cache read failed"),
    }

    let value = compute().await?;
    if let Err(err) = set_json(cache, key, &value, Expiry::After(ttl)).await {
        tracing::warn!(key, error = %err, "cache write failed");
    }
    Ok(value)
}

/// Delete each key, logging backend failures instead of surfacing them.
pub async fn invalidate(cache: &dyn Cache, keys: &[String]) {
    for key in keys {
        if let Err(err) = cache.delete(key).await {
            tracing::warn!(key = %key, error = %err, "cache invalidation failed");
        }
    }
    tracing::debug!(count = keys.len(), "cache keys invalidated");
}

pub async fn invalidate_prefix(cache: &dyn Cache, prefix: &str) {
    match cache.delete_prefix(prefix).await {
        Ok(removed) => tracing::debug!(prefix, removed, "cache prefix invalidated"),
        Err(err) => tracing::warn!(prefix, error = %err, "cache prefix invalidation failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get_raw(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend("down".into()))
        }
        async fn set_raw(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _expiry: Expiry,
        ) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".into()))
        }
        async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Backend("down".into()))
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
            Err(CacheError::Backend("down".into()))
        }
    }

    async fn counted(calls: &AtomicUsize, value: u32) -> Result<u32, std::convert::Infallible> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test]
    async fn computes_once_then_serves_from_cache() {
        let cache = InMemoryCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        let first = get_or_compute(&cache, "k", ttl, || counted(&calls, 7)).await.unwrap();
        let second = get_or_compute(&cache, "k", ttl, || counted(&calls, 8)).await.unwrap();

        assert_eq!((first, second), (7, 7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_recompute() {
        let cache = InMemoryCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        get_or_compute(&cache, "k", ttl, || counted(&calls, 1)).await.unwrap();
        invalidate(&cache, &["k".to_string()]).await;
        let fresh = get_or_compute(&cache, "k", ttl, || counted(&calls, 2)).await.unwrap();

        assert_eq!(fresh, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn broken_backend_still_returns_computed_value() {
        let calls = AtomicUsize::new(0);
        let value = get_or_compute(&BrokenCache, "k", Duration::from_secs(1), || {
            counted(&calls, 42)
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        invalidate(&BrokenCache, &["k".to_string()]).await;
    }

    #[tokio::test]
    async fn undecodable_entry_is_replaced() {
        let cache = InMemoryCache::new();
        cache.set_raw("k", b"not json".to_vec(), Expiry::Default).await.unwrap();
        let calls = AtomicUsize::new(0);

        let value = get_or_compute(&cache, "k", Duration::from_secs(60), || counted(&calls, 5))
            .await
            .unwrap();

        assert_eq!(value, 5);
        assert_eq!(get_json::<u32>(&cache, "k").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn compute_errors_are_not_cached() {
        let cache = InMemoryCache::new();
        let result: Result<u32, &str> =
            get_or_compute(&cache, "k", Duration::from_secs(60), || async { Err("db down") })
                .await;
        assert_eq!(result, Err("db down"));
        assert!(cache.get_raw("k").await.unwrap().is_none());
    }
}
