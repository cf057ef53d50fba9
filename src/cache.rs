//! Response cache for `/trends`, layered over a pluggable key/value store.
//!
//! - Key: sorted, de-duplicated channel set + limit, so ordering never splits entries.
//! - Fresh window → served as HIT; stale window → served as STALE while one
//!   background refresh runs; past both → MISS.
//! - Best-effort: a failing store degrades to MISS / no-op, never to an error.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ingest::types::{Platform, TrendItem};

/// External key/value collaborator (also backs settings and summary caching).
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    /// `ttl: None` keeps the value until overwritten.
    async fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;
}

/// In-process store with lazy expiry.
#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: Mutex<HashMap<String, (Option<Instant>, Value)>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Option<Instant>, Value)>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut map = self.lock();
        let expired = matches!(map.get(key), Some((Some(exp), _)) if *exp <= Instant::now());
        if expired {
            map.remove(key);
            return Ok(None);
        }
        Ok(map.get(key).map(|(_, v)| v.clone()))
    }

    async fn put(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expires = ttl.map(|t| Instant::now() + t);
        self.lock().insert(key.to_string(), (expires, value));
        Ok(())
    }
}

/// Stored wrapper around the raw serialized response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedPayload {
    stored_at_ms: i64,
    body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Fresh(String),
    Stale(String),
    Miss,
}

impl CacheLookup {
    pub fn label(&self) -> &'static str {
        match self {
            CacheLookup::Fresh(_) => "HIT",
            CacheLookup::Stale(_) => "STALE",
            CacheLookup::Miss => "MISS",
        }
    }
}

fn sorted_keys(channels: &[Platform]) -> String {
    let mut keys: Vec<&str> = channels.iter().map(|p| p.key()).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.join(",")
}

pub fn trends_key(channels: &[Platform], limit: usize) -> String {
    format!("trends?channels={}&limit={}", sorted_keys(channels), limit)
}

/// Key of the latest item snapshot for a channel set (read by `/search`).
pub fn snapshot_key(channels: &[Platform]) -> String {
    format!("snapshot:{}", sorted_keys(channels))
}

pub struct ResponseCache {
    store: Arc<dyn KvStore>,
    fresh_ttl: Duration,
    stale_ttl: Duration,
    revalidating: Mutex<HashSet<String>>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KvStore>, fresh_ttl: Duration, stale_ttl: Duration) -> Self {
        Self {
            store,
            fresh_ttl,
            stale_ttl,
            revalidating: Mutex::new(HashSet::new()),
        }
    }

    pub async fn lookup(&self, key: &str) -> CacheLookup {
        let raw = match self.store.get(key).await {
            Ok(Some(v)) => v,
            Ok(None) => return self.count(CacheLookup::Miss),
            Err(e) => {
                tracing::warn!(target: "cache", error = ?e, key, "cache read failed; treating as miss");
                return self.count(CacheLookup::Miss);
            }
        };
        let entry: CachedPayload = match serde_json::from_value(raw) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(target: "cache", error = %e, key, "unreadable cache entry");
                return self.count(CacheLookup::Miss);
            }
        };

        let age_ms = (chrono::Utc::now().timestamp_millis() - entry.stored_at_ms).max(0) as u128;
        let res = if age_ms < self.fresh_ttl.as_millis() {
            CacheLookup::Fresh(entry.body)
        } else if age_ms < (self.fresh_ttl + self.stale_ttl).as_millis() {
            CacheLookup::Stale(entry.body)
        } else {
            CacheLookup::Miss
        };
        self.count(res)
    }

    fn count(&self, res: CacheLookup) -> CacheLookup {
        match res {
            CacheLookup::Fresh(_) => counter!("trends_cache_hits_total").increment(1),
            CacheLookup::Stale(_) => counter!("trends_cache_stale_total").increment(1),
            CacheLookup::Miss => counter!("trends_cache_misses_total").increment(1),
        }
        res
    }

    /// Last writer wins. Failures are logged and swallowed.
    pub async fn store(&self, key: &str, body: String) {
        let entry = CachedPayload {
            stored_at_ms: chrono::Utc::now().timestamp_millis(),
            body,
        };
        let value = match serde_json::to_value(&entry) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "cache", error = %e, key, "cache entry not serializable");
                return;
            }
        };
        if let Err(e) = self
            .store
            .put(key, value, Some(self.fresh_ttl + self.stale_ttl))
            .await
        {
            tracing::warn!(target: "cache", error = ?e, key, "cache write failed");
        }
    }

    /// Record the items behind a `/trends` response for `/search`. A snapshot taken
    /// with a larger limit is kept until it expires, so a narrow request never
    /// shrinks what search can see.
    pub async fn store_snapshot(&self, channels: &[Platform], limit: usize, items: &[TrendItem]) {
        let key = snapshot_key(channels);
        if let Ok(Some(existing)) = self.store.get(&key).await {
            let kept = existing.get("limit").and_then(Value::as_u64).unwrap_or(0);
            if kept > limit as u64 {
                tracing::debug!(target: "cache", key, kept, limit, "wider snapshot kept");
                return;
            }
        }
        let value = serde_json::json!({ "limit": limit, "items": items });
        if let Err(e) = self
            .store
            .put(&key, value, Some(self.fresh_ttl + self.stale_ttl))
            .await
        {
            tracing::warn!(target: "cache", error = ?e, key, "snapshot write failed");
        }
    }

    pub async fn load_snapshot(&self, channels: &[Platform]) -> Option<Vec<TrendItem>> {
        let key = snapshot_key(channels);
        match self.store.get(&key).await {
            Ok(Some(v)) => v
                .get("items")
                .cloned()
                .and_then(|items| serde_json::from_value(items).ok()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(target: "cache", error = ?e, key, "snapshot read failed");
                None
            }
        }
    }

    /// Claim the right to refresh `key`. `false` if a refresh is already running.
    pub fn begin_revalidate(&self, key: &str) -> bool {
        let mut set = match self.revalidating.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        set.insert(key.to_string())
    }

    pub fn end_revalidate(&self, key: &str) {
        let mut set = match self.revalidating.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        set.remove(key);
    }
}
