//! Time-bounded cache for the active rule set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::rule::DiscountRule;

/// The single well-known key the rule engine caches under.
pub const ACTIVE_RULES_KEY: &str = "active_rules";

/// How long a fetched rule set stays fresh.
pub const ACTIVE_RULES_TTL: Duration = Duration::from_secs(60 * 60);

/// Key/value cache of rule sets with per-key expiry.
///
/// Values are replaced wholesale; readers always see a complete set.
#[async_trait]
pub trait RuleCache: Send + Sync {
    /// Returns the rules under `key`, or None if absent or expired.
    async fn get(&self, key: &str) -> Option<Arc<[DiscountRule]>>;

    /// Stores `rules` under `key`, expiring `ttl` from now.
    async fn set(&self, key: &str, rules: Arc<[DiscountRule]>, ttl: Duration);
}

#[derive(Debug, Clone)]
struct CachedRules {
    rules: Arc<[DiscountRule]>,
    expires_at: Instant,
}

/// In-process rule cache.
///
/// Cheap to clone; clones share the same entries. Expiry runs on the tokio
/// clock, so tests can drive it with a paused runtime.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleCache {
    entries: Arc<RwLock<HashMap<String, CachedRules>>>,
}

impl InMemoryRuleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the entry under `key`, fresh or not.
    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Removes expired entries and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl RuleCache for InMemoryRuleCache {
    async fn get(&self, key: &str) -> Option<Arc<[DiscountRule]>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.rules.clone())
    }

    async fn set(&self, key: &str, rules: Arc<[DiscountRule]>, ttl: Duration) {
        let entry = CachedRules {
            rules,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rules(names: &[&str]) -> Arc<[DiscountRule]> {
        let now = Utc::now();
        names
            .iter()
            .map(|name| DiscountRule::percentage(*name, 5.0, now, now))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let cache = InMemoryRuleCache::new();
        cache.set("k", rules(&["a"]), Duration::from_secs(10)).await;

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("k").await.unwrap().len(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn set_resets_expiry_from_the_call() {
        let cache = InMemoryRuleCache::new();
        cache.set("k", rules(&["a"]), Duration::from_secs(10)).await;

        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", rules(&["b"]), Duration::from_secs(10)).await;

        tokio::time::advance(Duration::from_secs(8)).await;
        let fresh = cache.get("k").await.unwrap();
        assert_eq!(fresh[0].name, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_independently() {
        let cache = InMemoryRuleCache::new();
        cache.set("short", rules(&["a"]), Duration::from_secs(5)).await;
        cache.set("long", rules(&["b"]), Duration::from_secs(50)).await;

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.get("short").await.is_none());
        assert!(cache.get("long").await.is_some());

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn missing_key_and_invalidate() {
        let cache = InMemoryRuleCache::new();
        assert!(cache.get(ACTIVE_RULES_KEY).await.is_none());

        cache.set(ACTIVE_RULES_KEY, rules(&[]), ACTIVE_RULES_TTL).await;
        assert!(cache.get(ACTIVE_RULES_KEY).await.is_some());

        cache.invalidate(ACTIVE_RULES_KEY).await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let cache = InMemoryRuleCache::new();
        let handle = cache.clone();

        handle.set("k", rules(&["a", "b"]), ACTIVE_RULES_TTL).await;
        assert_eq!(cache.get("k").await.unwrap().len(), 2);
    }
}
