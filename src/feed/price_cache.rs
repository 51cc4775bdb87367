/// TTL cache for fetched price series
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::types::{PriceKey, PriceSeries};
use crate::utils::Clock;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Map whose entries lapse a fixed time after insertion, independent of reads.
///
/// Expiry is checked on every read; [`TtlCache::purge_expired`] only reclaims
/// memory. There is no size bound.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

/// Fetch results keyed by ticker and window size
pub type PriceCache = TtlCache<PriceKey, PriceSeries>;

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        TtlCache {
            entries: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Value for `key` if it was inserted less than `ttl` ago
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    /// Insert or overwrite, restarting the entry's lifetime
    pub async fn set(&self, key: K, value: V) {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut entries = self.entries.write().await;
        entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Get cache size, expired entries included until purged
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Periodically purge `cache` so entries nobody asks for again do not linger
pub fn spawn_sweeper<K, V>(cache: Arc<TtlCache<K, V>>, every: Duration) -> JoinHandle<()>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = cache.purge_expired().await;
            if removed > 0 {
                debug!("Cache sweep removed {} expired entries", removed);
            }
        }
    })
}
