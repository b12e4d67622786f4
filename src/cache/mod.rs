// Read-through cache for computed overviews. Process-local store behind a
// backend trait so an external store can slot in later.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

/// Invalidation scopes. Writers drop whole scopes instead of tracking
/// individual keys, so a contract write cannot leave a stale list page
/// behind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheScope {
    /// Contract listings and per-contract overviews.
    Contracts,
    /// Dashboard summary and the statistics report.
    Dashboard,
    /// Period listings grouped by contract.
    Periods,
}

impl CacheScope {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Contracts => "contracts",
            Self::Dashboard => "dashboard",
            Self::Periods => "periods",
        }
    }

    /// Builds a key inside this scope, e.g. `periods:<contract-id>`.
    pub fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix(), suffix)
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Instant::now() > expires_at
        } else {
            false
        }
    }
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
    async fn clear(&self) -> Result<(), CacheError>;
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let store = self.store.read().unwrap();
        if let Some(entry) = store.get(key) {
            if entry.is_expired() {
                drop(store);
                let mut store = self.store.write().unwrap();
                store.remove(key);
                Ok(None)
            } else {
                Ok(Some(entry.value.clone()))
            }
        } else {
            Ok(None)
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut store = self.store.write().unwrap();
        store.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut store = self.store.write().unwrap();
        store.remove(key);
        Ok(())
    }

    /// Removes every key starting with `prefix`.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut store = self.store.write().unwrap();
        store.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let store = self.store.read().unwrap();
        if let Some(entry) = store.get(key) {
            Ok(!entry.is_expired())
        } else {
            Ok(false)
        }
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut store = self.store.write().unwrap();
        store.clear();
        Ok(())
    }

    /// Fetches and deserializes a cached value. An entry that no longer
    /// parses is evicted and reported as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(Some(value)),
                Err(_) => {
                    self.delete(key).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await
    }

    /// Drops everything under the given scopes.
    pub async fn invalidate(&self, scopes: &[CacheScope]) -> Result<(), CacheError> {
        for scope in scopes {
            self.delete_prefix(&format!("{}:", scope.prefix())).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        self.delete_prefix(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.exists(key).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.clear().await
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert!(cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let cache = InMemoryCache::new();
        cache
            .set("k", "v", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn invalidate_clears_only_named_scopes() {
        let cache = InMemoryCache::new();
        cache
            .set(&CacheScope::Dashboard.key("summary"), "a", None)
            .await
            .unwrap();
        cache
            .set(&CacheScope::Periods.key("c1"), "b", None)
            .await
            .unwrap();
        cache
            .set(&CacheScope::Contracts.key("list:1:20"), "c", None)
            .await
            .unwrap();

        cache
            .invalidate(&[CacheScope::Dashboard, CacheScope::Periods])
            .await
            .unwrap();

        assert!(!cache.exists(&CacheScope::Dashboard.key("summary")).await.unwrap());
        assert!(!cache.exists(&CacheScope::Periods.key("c1")).await.unwrap());
        assert!(cache.exists(&CacheScope::Contracts.key("list:1:20")).await.unwrap());
    }

    #[tokio::test]
    async fn json_helpers_round_trip_and_evict_garbage() {
        let cache = InMemoryCache::new();
        cache.set_json("pair", &(1u32, "x"), None).await.unwrap();
        let back: Option<(u32, String)> = cache.get_json("pair").await.unwrap();
        assert_eq!(back, Some((1, "x".to_string())));

        cache.set("broken", "not json", None).await.unwrap();
        let miss: Option<(u32, String)> = cache.get_json("broken").await.unwrap();
        assert!(miss.is_none());
        assert!(!cache.exists("broken").await.unwrap());
    }
}
