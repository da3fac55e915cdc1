//! Key/value caches used in front of application storage.
//!
//! Backends store opaque strings. `TypedCache` namespaces keys and
//! serializes values as JSON. `ApplicationCaches` gives every lookup index
//! its own backend so each index has its own capacity and eviction.

mod memory;
#[cfg(feature = "redis")]
mod redis_cache;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

use crate::errors::CacheError;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, CacheError>;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Cache that never holds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

/// A namespaced view over a cache holding JSON-encoded values of one type
pub struct TypedCache<T> {
    cache: Arc<dyn Cache>,
    prefix: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCache<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            prefix: self.prefix,
            _marker: PhantomData,
        }
    }
}

impl<T> TypedCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(cache: Arc<dyn Cache>, prefix: &'static str) -> Self {
        Self {
            cache,
            prefix,
            _marker: PhantomData,
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    pub async fn get(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(&self.key(key)).await? {
            Some(value) => serde_json::from_str(&value)
                .map(Some)
                .map_err(|e| CacheError::SerializationFailed(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_string(value)
            .map_err(|e| CacheError::SerializationFailed(e.to_string()))?;
        self.cache.set(&self.key(key), &value).await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.cache.delete(&self.key(key)).await
    }
}

/// Cache backend configuration and factory
#[derive(Clone, Debug)]
pub enum CacheBackend {
    Memory { ttl: Duration, max_entries: usize },
    #[cfg(feature = "redis")]
    Redis { url: String, ttl: Duration },
    Disabled,
}

/// Create a cache based on configuration
pub fn create_cache(backend: CacheBackend) -> Result<Arc<dyn Cache>> {
    match backend {
        CacheBackend::Memory { ttl, max_entries } => {
            Ok(Arc::new(MemoryCache::new(ttl, max_entries)))
        }
        #[cfg(feature = "redis")]
        CacheBackend::Redis { url, ttl } => Ok(Arc::new(RedisCache::new(&url, ttl)?)),
        CacheBackend::Disabled => Ok(Arc::new(NoopCache)),
    }
}

/// Independent caches, one per application lookup index
#[derive(Clone)]
pub struct ApplicationCaches {
    pub by_id: Arc<dyn Cache>,
    pub by_name: Arc<dyn Cache>,
    pub by_client_id: Arc<dyn Cache>,
}

impl ApplicationCaches {
    /// Build a separate backend for each index from one configuration
    pub fn new(backend: &CacheBackend) -> Result<Self> {
        Ok(Self {
            by_id: create_cache(backend.clone())?,
            by_name: create_cache(backend.clone())?,
            by_client_id: create_cache(backend.clone())?,
        })
    }
}

/// Parse cache backend from configuration strings
#[cfg_attr(not(feature = "redis"), allow(unused_variables))]
pub fn parse_cache_backend(
    backend_name: &str,
    redis_url: Option<&str>,
    ttl: Duration,
    max_entries: usize,
) -> Result<CacheBackend> {
    match backend_name {
        "memory" => Ok(CacheBackend::Memory { ttl, max_entries }),
        #[cfg(feature = "redis")]
        "redis" => {
            let url = redis_url.ok_or_else(|| {
                CacheError::BackendUnavailable("REDIS_URL required for redis cache".to_string())
            })?;
            Ok(CacheBackend::Redis {
                url: url.to_string(),
                ttl,
            })
        }
        "none" => Ok(CacheBackend::Disabled),
        _ => Err(CacheError::BackendUnavailable(format!(
            "Unknown cache backend: {}",
            backend_name
        ))),
    }
}
