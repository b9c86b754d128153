//! In-memory cache implementation using moka
//!
//! Provides a fast, thread-safe in-memory cache with TTL support and
//! glob-style pattern deletion.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Default TTL for cache entries
const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Cache entry wrapper storing serialized JSON, so any serializable type
/// can live in one cache instance.
#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// In-memory cache using moka.
///
/// Entries expire on the cache-wide TTL; the per-call TTL parameter is
/// accepted for interface compatibility with the Redis driver but entries
/// never outlive the cache-wide setting.
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    /// Create a new memory cache with default settings
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a new memory cache with custom capacity and TTL
    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(default_ttl)
            .support_invalidation_closures()
            .build();

        Self { cache, default_ttl }
    }

    /// Get the default TTL for this cache
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get the current number of entries in the cache
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Glob-style matching supporting `*` (any sequence) and `?` (any
    /// single character).
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        fn matches(pattern: &[char], key: &[char]) -> bool {
            match (pattern.first(), key.first()) {
                (None, None) => true,
                (Some('*'), _) => {
                    // `*` consumes zero or more characters
                    matches(&pattern[1..], key)
                        || (!key.is_empty() && matches(pattern, &key[1..]))
                }
                (Some('?'), Some(_)) => matches(&pattern[1..], &key[1..]),
                (Some(p), Some(k)) if p == k => matches(&pattern[1..], &key[1..]),
                _ => false,
            }
        }

        let pattern: Vec<char> = pattern.chars().collect();
        let key: Vec<char> = key.chars().collect();
        matches(&pattern, &key)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        _ttl: Duration,
    ) -> Result<()> {
        let entry = CacheEntry::new(value)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let pattern = pattern.to_string();
        self.cache
            .invalidate_entries_if(move |key, _| Self::pattern_matches(&pattern, key))
            .map_err(|e| anyhow::anyhow!("Failed to invalidate entries: {}", e))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();

        cache
            .set("key", &42i64, Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<i64> = cache.get("key").await.unwrap();
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let cache = MemoryCache::new();
        let value: Option<String> = cache.get("missing").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new();

        cache
            .set("key", &"value".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        cache.delete("key").await.unwrap();

        let value: Option<String> = cache.get("key").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);

        cache.set("diaries:1", &1i64, ttl).await.unwrap();
        cache.set("diaries:2", &2i64, ttl).await.unwrap();
        cache.set("tags:all", &3i64, ttl).await.unwrap();

        cache.delete_pattern("diaries:*").await.unwrap();
        // moka invalidation closures apply lazily; reads observe the result
        let one: Option<i64> = cache.get("diaries:1").await.unwrap();
        let two: Option<i64> = cache.get("diaries:2").await.unwrap();
        let tags: Option<i64> = cache.get("tags:all").await.unwrap();

        assert!(one.is_none());
        assert!(two.is_none());
        assert_eq!(tags, Some(3));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);

        cache.set("a", &1i64, ttl).await.unwrap();
        cache.set("b", &2i64, ttl).await.unwrap();
        cache.clear().await.unwrap();

        let a: Option<i64> = cache.get("a").await.unwrap();
        let b: Option<i64> = cache.get("b").await.unwrap();
        assert!(a.is_none() && b.is_none());
    }

    #[tokio::test]
    async fn test_complex_values_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Payload {
            items: Vec<String>,
            total: i64,
        }

        let cache = MemoryCache::new();
        let payload = Payload {
            items: vec!["a".to_string(), "b".to_string()],
            total: 2,
        };

        cache
            .set("payload", &payload, Duration::from_secs(60))
            .await
            .unwrap();

        let loaded: Option<Payload> = cache.get("payload").await.unwrap();
        assert_eq!(loaded, Some(payload));
    }

    #[test]
    fn test_pattern_matching() {
        assert!(MemoryCache::pattern_matches("diaries:*", "diaries:123"));
        assert!(MemoryCache::pattern_matches("diaries:*", "diaries:"));
        assert!(MemoryCache::pattern_matches("*", "anything"));
        assert!(MemoryCache::pattern_matches("user:?:profile", "user:1:profile"));
        assert!(!MemoryCache::pattern_matches("user:?:profile", "user:12:profile"));
        assert!(!MemoryCache::pattern_matches("diaries:*", "tags:1"));
        assert!(MemoryCache::pattern_matches("exact", "exact"));
        assert!(!MemoryCache::pattern_matches("exact", "exactly"));
    }
}
