use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use super::{Cache, CacheError, Expiry};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

const DEFAULT_SWEEP_EVERY: u64 = 256;

/// Process-local cache backend.
///
/// Expired entries are skipped on read and swept out on every
/// `sweep_every`-th write, so keys that are never read again do not pile up.
#[derive(Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
    default_ttl: Option<Duration>,
    sweep_every: u64,
    writes: Arc<AtomicU64>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self {
            store: Arc::default(),
            default_ttl: None,
            sweep_every: DEFAULT_SWEEP_EVERY,
            writes: Arc::default(),
            hits: Arc::default(),
            misses: Arc::default(),
        }
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_sweep_every(mut self, writes: u64) -> Self {
        self.sweep_every = writes.max(1);
        self
    }

    pub async fn statistics(&self) -> CacheStatistics {
        let store = self.store.read().await;
        CacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: store.values().filter(|e| !e.is_expired()).count(),
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let store = self.store.read().await;
        match store.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value.clone()))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set_raw(&self, key: &str, value: Vec<u8>, expiry: Expiry) -> Result<(), CacheError> {
        let ttl = match expiry {
            Expiry::Default => self.default_ttl,
            Expiry::After(ttl) => Some(ttl),
            Expiry::Never => None,
        };
        let sweep = self.writes.fetch_add(1, Ordering::Relaxed) % self.sweep_every == 0;

        let mut store = self.store.write().await;
        if sweep {
            store.retain(|_, entry| !entry.is_expired());
        }
        store.insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self.store.write().await.remove(key);
        Ok(removed.is_some_and(|entry| !entry.is_expired()))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|key, _| !key.starts_with(prefix));
        Ok(before - store.len())
    }
}

/// Backend that never stores anything; every lookup goes to the database.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    async fn get_raw(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set_raw(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _expiry: Expiry,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
        Ok(0)
    }
}
