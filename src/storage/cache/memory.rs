//! In-process TTL cache

use super::{Cache, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    inserted_at: Instant,
}

/// Bounded TTL cache kept in process memory.
///
/// When full, expired entries are dropped first and then the oldest entry.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_entries,
        }
    }

    /// Remove expired entries
    pub async fn cleanup_expired(&self) {
        let mut cache = self.inner.write().await;
        let ttl = self.ttl;
        cache.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let cache = self.inner.read().await;
        match cache.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Ok(Some(entry.value.clone())),
            Some(_) => {
                debug!(key = %key, "Cache entry expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.max_entries == 0 {
            return Ok(());
        }

        let mut cache = self.inner.write().await;
        if !cache.contains_key(key) && cache.len() >= self.max_entries {
            let ttl = self.ttl;
            cache.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

            if cache.len() >= self.max_entries {
                let oldest = cache
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    debug!(key = %oldest, "Evicting oldest cache entry");
                    cache.remove(&oldest);
                }
            }
        }

        cache.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                inserted_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.write().await.remove(key);
        Ok(())
    }
}
