//! Keyed in-memory cache with per-entry expiry
//!
//! Owned by whoever polls the feeds (one per watcher), so its lifetime is
//! the service's, and it is dropped with it.

use rand::Rng;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct TtlCache<K, V> {
    /// key -> (value, expires_at)
    entries: Arc<RwLock<HashMap<K, (V, Instant)>>>,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cached value, or `None` when missing or expired. Expired entries are
    /// evicted on the way out.
    pub async fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expires_at)) if Instant::now() < *expires_at => {
                    return Some(value.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }

        self.entries.write().await.remove(key);
        None
    }

    pub async fn insert(&self, key: K, value: V, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(key, (value, Instant::now() + ttl));
    }

    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Random duration in `[min_ms, max_ms]`, so refreshes do not line up
/// against the upstream API
pub fn jittered(min_ms: u64, max_ms: u64) -> Duration {
    let (lo, hi) = if min_ms <= max_ms {
        (min_ms, max_ms)
    } else {
        (max_ms, min_ms)
    };
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}
