//! Query result caching.
//!
//! Values are stored as JSON with a per-entry deadline. The cache owns an
//! ordered key index so a whole key family can be dropped by prefix.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::CacheConfig;

/// A cached value and its deadline.
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process TTL cache.
pub struct QueryCache {
    /// Entries by key.
    entries: DashMap<String, CacheEntry>,
    /// Sorted keys for prefix removal.
    index: RwLock<BTreeSet<String>>,
    /// TTL used when none is given.
    default_ttl: Duration,
    /// Upper bound on live entries.
    max_entries: usize,
}

impl QueryCache {
    /// Create a cache from configuration.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            index: RwLock::new(BTreeSet::new()),
            default_ttl: Duration::from_secs(config.default_ttl_secs),
            max_entries: config.max_entries,
        }
    }

    /// Get a value if present and not expired.
    ///
    /// Values that no longer deserialize as `T` are treated as misses.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let value = {
            let entry = self.entries.get(key)?;
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        };

        let Some(value) = value else {
            self.remove(key);
            return None;
        };

        serde_json::from_value(value).ok()
    }

    /// Store a value for `ttl`, or the default TTL.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Skipping cache write for unserializable value");
                return;
            }
        };

        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.make_room();
        }

        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        self.index.write().insert(key.to_string());
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    /// Remove one key.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
        self.index.write().remove(key);
    }

    /// Remove every key starting with `prefix`. Returns how many were removed.
    pub fn remove_by_prefix(&self, prefix: &str) -> usize {
        let doomed: Vec<String> = {
            let mut index = self.index.write();
            let keys: Vec<String> = index
                .range(prefix.to_string()..)
                .take_while(|key| key.starts_with(prefix))
                .cloned()
                .collect();
            for key in &keys {
                index.remove(key);
            }
            keys
        };

        for key in &doomed {
            self.entries.remove(key);
        }
        doomed.len()
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.clear();
        self.index.write().clear();
    }

    /// Purge expired entries; if still full, evict the entry closest to expiry.
    fn make_room(&self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }

        if self.entries.len() < self.max_entries {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            tracing::debug!(key = %key, "Evicting cache entry");
            self.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_entries: usize) -> QueryCache {
        QueryCache::new(&CacheConfig {
            default_ttl_secs: 300,
            max_entries,
        })
    }

    #[test]
    fn test_set_get_remove() {
        let cache = cache(10);
        assert!(cache.get::<String>("course:1").is_none());

        cache.set("course:1", &"Rust".to_string(), None);
        assert_eq!(cache.get::<String>("course:1").as_deref(), Some("Rust"));

        cache.remove("course:1");
        assert!(cache.get::<String>("course:1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_miss() {
        let cache = cache(10);
        cache.set("k", &1_i64, Some(Duration::ZERO));
        assert!(cache.get::<i64>("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_remove_by_prefix() {
        let cache = cache(10);
        cache.set("courses:page:1:10:", &1_i64, None);
        cache.set("courses:page:2:10:", &2_i64, None);
        cache.set("course:1", &3_i64, None);
        cache.set("coursesx", &4_i64, None);

        assert_eq!(cache.remove_by_prefix("courses:"), 2);
        assert!(cache.get::<i64>("courses:page:1:10:").is_none());
        assert_eq!(cache.get::<i64>("course:1"), Some(3));
        assert_eq!(cache.get::<i64>("coursesx"), Some(4));
    }

    #[test]
    fn test_bounded_size() {
        let cache = cache(2);
        cache.set("a", &1_i64, Some(Duration::from_secs(10)));
        cache.set("b", &2_i64, Some(Duration::from_secs(20)));
        cache.set("c", &3_i64, Some(Duration::from_secs(30)));

        assert_eq!(cache.len(), 2);
        assert!(cache.get::<i64>("a").is_none());
        assert_eq!(cache.get::<i64>("c"), Some(3));

        // Overwriting an existing key never evicts.
        cache.set("c", &4_i64, None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get::<i64>("b"), Some(2));
    }

    #[test]
    fn test_type_mismatch_is_a_miss() {
        let cache = cache(10);
        cache.set("k", &"text".to_string(), None);
        assert!(cache.get::<i64>("k").is_none());
    }
}
