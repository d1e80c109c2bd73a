//! Three-level read-through cache: scoped (per user) → general → durable.
//!
//! The two fast levels live in one moka cache under different key prefixes;
//! the durable level is a [`DurableCache`] whose expiry is authoritative. A
//! hit at a slower level backfills the faster ones with the remaining TTL.
//! Every failure of the durable level is logged and treated as a miss.

use chrono::NaiveDateTime;
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::store::DurableCache;

pub mod key;

pub use key::{CacheEntry, CacheKey, CacheTag, CacheType};

/// Upper bound for fast entries regardless of the logical TTL.
const FAST_TIER_MAX_TTL: Duration = Duration::from_secs(7200);

#[derive(Debug)]
struct FastEntry {
    payload: serde_json::Value,
    expires_at: NaiveDateTime,
    tags: Vec<String>,
}

#[derive(Debug, Default)]
struct Counters {
    scoped_hits: AtomicU64,
    general_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub fast_entries: u64,
    pub durable_entries: u64,
    pub expired_entries: u64,
    pub valid_entries: u64,
    /// Share of durable entries still live, in percent.
    pub cache_hit_rate: f64,
    pub cache_health: String,
    pub scoped_hits: u64,
    pub general_hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
}

pub struct CacheTier {
    fast: Cache<String, Arc<FastEntry>>,
    durable: Arc<dyn DurableCache>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

fn scoped_key(key: &str, user_id: u64) -> String {
    format!("{key}:user:{user_id}")
}

fn general_key(key: &str) -> String {
    format!("report:{key}")
}

impl CacheTier {
    pub fn new(durable: Arc<dyn DurableCache>, clock: Arc<dyn Clock>, max_capacity: u64) -> Self {
        Self {
            fast: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(FAST_TIER_MAX_TTL)
                .build(),
            durable,
            clock,
            counters: Counters::default(),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey, scope: Option<u64>) -> Option<T> {
        let raw = self.get_raw(&key.render(), scope).await?;
        match serde_json::from_value(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, key = %key.render(), "Cached payload has unexpected shape");
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T, scope: Option<u64>) -> bool {
        let payload = match serde_json::to_value(value) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, key = %key.render(), "Failed to serialize cache payload");
                return false;
            }
        };
        let tags = key.tags().iter().map(ToString::to_string).collect();
        self.put_raw(&key.render(), payload, key.cache_type(), tags, scope)
            .await
    }

    /// Serve from the cache, or compute, store and return.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &CacheKey,
        scope: Option<u64>,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.get(key, scope).await {
            return Ok(hit);
        }
        let value = compute().await?;
        self.put(key, &value, scope).await;
        Ok(value)
    }

    /// Read `key` walking scoped → general → durable.
    pub async fn get_raw(&self, key: &str, scope: Option<u64>) -> Option<serde_json::Value> {
        let now = self.clock.now();

        if let Some(user_id) = scope {
            let scoped = scoped_key(key, user_id);
            if let Some(payload) = self.fast_lookup(&scoped, now).await {
                debug!(key = %scoped, "Scoped cache hit");
                self.counters.scoped_hits.fetch_add(1, Ordering::Relaxed);
                return Some(payload);
            }
        }

        let general = general_key(key);
        if let Some(entry) = self.fast.get(&general).await {
            if entry.expires_at > now {
                debug!(key = %general, "General cache hit");
                self.counters.general_hits.fetch_add(1, Ordering::Relaxed);
                if let Some(user_id) = scope {
                    self.fast.insert(scoped_key(key, user_id), entry.clone()).await;
                }
                return Some(entry.payload.clone());
            }
            self.fast.invalidate(&general).await;
        }

        let entry = match self.durable.load(key).await {
            Ok(Some(entry)) if entry.is_live(now) => entry,
            Ok(_) => {
                debug!(key, "Cache miss");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                warn!(error = %e, key, "Durable cache read failed; treating as miss");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        debug!(key, "Durable cache hit");
        self.counters.durable_hits.fetch_add(1, Ordering::Relaxed);
        let fast = Arc::new(FastEntry {
            payload: entry.payload.clone(),
            expires_at: entry.expires_at,
            tags: entry.tags.clone(),
        });
        self.fast.insert(general, fast.clone()).await;
        if let Some(user_id) = scope {
            self.fast.insert(scoped_key(key, user_id), fast).await;
        }
        Some(entry.payload)
    }

    async fn fast_lookup(&self, key: &str, now: NaiveDateTime) -> Option<serde_json::Value> {
        let entry = self.fast.get(key).await?;
        if entry.expires_at > now {
            Some(entry.payload.clone())
        } else {
            self.fast.invalidate(key).await;
            None
        }
    }

    /// Write every level. Returns false when the durable write failed; the
    /// fast levels are populated either way.
    pub async fn put_raw(
        &self,
        key: &str,
        payload: serde_json::Value,
        cache_type: CacheType,
        tags: Vec<String>,
        scope: Option<u64>,
    ) -> bool {
        let expires_at = self.clock.now() + cache_type.ttl();
        let fast = Arc::new(FastEntry {
            payload: payload.clone(),
            expires_at,
            tags: tags.clone(),
        });
        self.fast.insert(general_key(key), fast.clone()).await;
        if let Some(user_id) = scope {
            self.fast.insert(scoped_key(key, user_id), fast).await;
        }

        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            expires_at,
            cache_type,
            tags,
        };
        match self.durable.store(&entry).await {
            Ok(()) => {
                debug!(key, ttl_secs = cache_type.ttl_secs(), "Cached entry");
                true
            }
            Err(e) => {
                warn!(error = %e, key, "Failed to persist cache entry");
                false
            }
        }
    }

    /// Coarse invalidation: drop every entry whose key contains `pattern`.
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        let stale: Vec<Arc<String>> = self
            .fast
            .iter()
            .filter(|(k, _)| k.contains(pattern))
            .map(|(k, _)| k)
            .collect();
        let mut count = stale.len() as u64;
        for key in stale {
            self.fast.invalidate(key.as_str()).await;
        }

        match self.durable.delete_matching(pattern).await {
            Ok(n) => count += n,
            Err(e) => warn!(error = %e, pattern, "Durable cache invalidation failed"),
        }
        info!(pattern, invalidated = count, "Invalidated cache entries by pattern");
        count
    }

    /// Drop every entry that depends on `tag`.
    pub async fn invalidate_tag(&self, tag: &CacheTag) -> u64 {
        let tag = tag.to_string();
        let stale: Vec<Arc<String>> = self
            .fast
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|t| *t == tag))
            .map(|(k, _)| k)
            .collect();
        let mut count = stale.len() as u64;
        for key in stale {
            self.fast.invalidate(key.as_str()).await;
        }

        match self.durable.delete_tagged(&tag).await {
            Ok(n) => count += n,
            Err(e) => warn!(error = %e, tag = %tag, "Durable cache invalidation failed"),
        }
        debug!(tag = %tag, invalidated = count, "Invalidated cache entries by tag");
        count
    }

    pub async fn stats(&self) -> CacheStats {
        self.fast.run_pending_tasks().await;
        let durable = match self.durable.stats(self.clock.now()).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Failed to read durable cache stats");
                crate::store::DurableCacheStats {
                    total_entries: 0,
                    expired_entries: 0,
                }
            }
        };
        let valid = durable.total_entries.saturating_sub(durable.expired_entries);
        let hit_rate = if durable.total_entries > 0 {
            valid as f64 / durable.total_entries as f64 * 100.0
        } else {
            0.0
        };
        CacheStats {
            fast_entries: self.fast.entry_count(),
            durable_entries: durable.total_entries,
            expired_entries: durable.expired_entries,
            valid_entries: valid,
            cache_hit_rate: crate::utils::stats::round2(hit_rate),
            cache_health: (if hit_rate > 80.0 { "GOOD" } else { "NEEDS_ATTENTION" }).to_string(),
            scoped_hits: self.counters.scoped_hits.load(Ordering::Relaxed),
            general_hits: self.counters.general_hits.load(Ordering::Relaxed),
            durable_hits: self.counters.durable_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    /// Remove expired rows from the durable level.
    pub async fn purge_expired(&self) -> u64 {
        match self.durable.purge_expired(self.clock.now()).await {
            Ok(n) => {
                info!(purged = n, "Cleaned up expired cache entries");
                n
            }
            Err(e) => {
                warn!(error = %e, "Failed to clean up expired cache entries");
                0
            }
        }
    }

    /// Drop the fast levels only; the durable level is left intact.
    pub fn clear_fast(&self) {
        self.fast.invalidate_all();
    }
}
