//! Key/value cache: a single `moka` cache whose entries carry their own TTL
//! (success / no-data / rate-limited), plus a glob-free substring matcher and
//! hit/miss statistics.
//!
//! `get_or_compute` is built on `moka::future::Cache::try_get_with`, which
//! coalesces concurrent misses on the same key onto a single `init` future —
//! this gives single-flight de-duplication without hand-rolling a per-key
//! mutex map.

use crate::models::Outcome;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cached value, distinguishing "we asked and got nothing" from "key
/// absent".
#[derive(Debug, Clone)]
pub enum CachedValue {
    Value(Value),
    NullSentinel,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub value: CachedValue,
    pub stored_at: Instant,
    pub expires_at: Instant,
    ttl: Duration,
    /// Set when this entry was written from a classified transport failure.
    /// The triggering fetch still propagates the error; later cache hits
    /// against the same entry return the stored null-sentinel, not an error.
    transport_error: Option<String>,
}

struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Debug, Default)]
struct Stats {
    hits: AtomicU64,
    misses: AtomicU64,
}

pub struct CacheStats {
    pub keys: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub approx_bytes: u64,
}

/// The default hard cap on key count. Oldest-first eviction beyond this is
/// delegated to `moka`'s own size-based eviction policy.
pub const DEFAULT_MAX_ENTRIES: u64 = 1000;

/// How often the background sweep purges expired entries, independent of
/// whether anything is still reading them.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

pub struct Cache {
    inner: MokaCache<String, Entry>,
    stats: Arc<Stats>,
}

impl Cache {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryExpiry)
            .build();
        let cache = Self {
            inner,
            stats: Arc::new(Stats::default()),
        };
        cache.spawn_sweep();
        cache
    }

    /// `moka` already prunes expired entries lazily on access, which covers
    /// hot keys, but a key nobody reads again would otherwise sit expired
    /// forever. This sweeps every 10 minutes regardless of access pattern.
    /// Skipped when constructed outside a tokio runtime (e.g. a plain
    /// `#[test]`), since there's nothing to spawn the task onto.
    fn spawn_sweep(&self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let inner = self.inner.clone();
            handle.spawn(async move {
                let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
                loop {
                    ticker.tick().await;
                    inner.run_pending_tasks().await;
                }
            });
        }
    }

    /// Returns the cached value, or `None` if absent/expired. A
    /// `CachedValue::NullSentinel` hit still counts as a hit and surfaces as
    /// `Some(None)` to the caller so "we asked and got nothing" can be told
    /// apart from "we never asked".
    pub async fn get(&self, key: &str) -> Option<Option<Value>> {
        match self.inner.get(key).await {
            Some(entry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(match entry.value {
                    CachedValue::Value(v) => Some(v),
                    CachedValue::NullSentinel => None,
                })
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Exposes `stored_at` for freshness diagnostics (`dataFreshness`).
    pub async fn get_entry(&self, key: &str) -> Option<Entry> {
        self.inner.get(key).await
    }

    pub async fn set(&self, key: impl Into<String>, value: CachedValue, ttl: Duration) {
        assert!(ttl > Duration::ZERO, "cache TTL must be non-zero");
        let now = Instant::now();
        self.inner
            .insert(
                key.into(),
                Entry {
                    value,
                    stored_at: now,
                    expires_at: now + ttl,
                    ttl,
                    transport_error: None,
                },
            )
            .await;
    }

    pub async fn delete(&self, key: &str) -> bool {
        let had = self.inner.contains_key(key);
        self.inner.invalidate(key).await;
        had
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub async fn flush(&self) {
        self.inner.invalidate_all();
        // `invalidate_all` is lazy; run pending tasks so `keys()` reflects it
        // immediately for callers/tests that flush-then-list.
        self.inner.run_pending_tasks().await;
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.iter().map(|(k, _)| (*k).clone()).collect()
    }

    /// `*` matches any substring.
    pub fn keys_matching(&self, pattern: &str) -> Vec<String> {
        if pattern == "*" {
            return self.keys();
        }
        let needle = pattern.trim_matches('*');
        self.keys()
            .into_iter()
            .filter(|k| k.contains(needle))
            .collect()
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks().await;
        let hits = self.stats.hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let keys = self.inner.entry_count();
        CacheStats {
            keys,
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            // Rough estimate: moka tracks entry count, not byte size directly.
            approx_bytes: self.inner.weighted_size(),
        }
    }

    /// Returns cached on hit; on miss invokes `compute`, stores the result
    /// under `ttl`, and returns it. Concurrent callers racing on the same
    /// `key` during a miss coalesce onto one `compute` invocation (see the
    /// module doc comment). `compute` returning an error does **not**
    /// populate the cache — callers that want to cache a typed failure must
    /// call `set` explicitly.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> anyhow::Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<Value>>,
    {
        let stats = self.stats.clone();
        // try_get_with only runs `init` on an actual miss; this flag (rather
        // than comparing timestamps) is how the caller tells hit from miss,
        // since moka's return value doesn't distinguish them.
        let computed = Arc::new(AtomicBool::new(false));
        let computed_flag = computed.clone();
        let result = self
            .inner
            .try_get_with(key.to_string(), async move {
                computed_flag.store(true, Ordering::Relaxed);
                let value = compute().await?;
                let now = Instant::now();
                Ok::<Entry, anyhow::Error>(Entry {
                    value: CachedValue::Value(value),
                    stored_at: now,
                    expires_at: now + ttl,
                    ttl,
                    transport_error: None,
                })
            })
            .await;

        if computed.load(Ordering::Relaxed) {
            stats.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.hits.fetch_add(1, Ordering::Relaxed);
        }

        match result {
            Ok(entry) => match entry.value {
                CachedValue::Value(v) => Ok(v),
                CachedValue::NullSentinel => Ok(Value::Null),
            },
            Err(e) => Err(anyhow::anyhow!(e)),
        }
    }

    /// Resolves `key` against a classified outcome rather than a plain
    /// value: on miss, runs `fetch`, picks the TTL matching how the result
    /// classifies, and caches under that TTL. `TransportError` is cached
    /// (with `ttl_transport_error`) the same as the other classes, but the
    /// call that triggered the fetch still observes it as an `Err` — later
    /// hits against the same entry return the stored null-sentinel instead.
    /// Concurrent misses on the same key coalesce onto one `fetch` call and
    /// share its outcome, error included.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl_success: Duration,
        ttl_nodata: Duration,
        ttl_rate_limited: Duration,
        ttl_transport_error: Duration,
        ttl_transport_timeout: Duration,
        fetch: F,
    ) -> anyhow::Result<Option<Value>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Outcome>,
    {
        let stats = self.stats.clone();
        let computed = Arc::new(AtomicBool::new(false));
        let computed_flag = computed.clone();
        let result = self
            .inner
            .try_get_with(key.to_string(), async move {
                computed_flag.store(true, Ordering::Relaxed);
                let (value, ttl, transport_error) = match fetch().await {
                    Outcome::Success(v) => (CachedValue::Value(v), ttl_success, None),
                    Outcome::NoData => (CachedValue::NullSentinel, ttl_nodata, None),
                    Outcome::RateLimited => (CachedValue::NullSentinel, ttl_rate_limited, None),
                    Outcome::TransportError(e) => {
                        (CachedValue::NullSentinel, ttl_transport_error, Some(e.to_string()))
                    }
                    Outcome::TransportTimeout(e) => {
                        (CachedValue::NullSentinel, ttl_transport_timeout, Some(e.to_string()))
                    }
                };
                let now = Instant::now();
                Ok::<Entry, anyhow::Error>(Entry {
                    value,
                    stored_at: now,
                    expires_at: now + ttl,
                    ttl,
                    transport_error,
                })
            })
            .await;

        if computed.load(Ordering::Relaxed) {
            stats.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.hits.fetch_add(1, Ordering::Relaxed);
        }

        match result {
            Ok(entry) => {
                if let Some(msg) = entry.transport_error {
                    return Err(anyhow::anyhow!(msg));
                }
                Ok(match entry.value {
                    CachedValue::Value(v) => Some(v),
                    CachedValue::NullSentinel => None,
                })
            }
            Err(e) => Err(anyhow::anyhow!(e)),
        }
    }

    /// Dumps live, unexpired entries to `path` as JSON, each tagged with its
    /// remaining TTL rather than an absolute expiry (since `Instant` doesn't
    /// survive a process restart). Off by default; wired up behind a config
    /// flag in `main.rs` for callers who want cache contents to survive a
    /// restart.
    pub async fn persist_snapshot(&self, path: &Path) -> anyhow::Result<usize> {
        self.inner.run_pending_tasks().await;
        let now = Instant::now();
        let entries: Vec<SnapshotEntry> = self
            .inner
            .iter()
            .filter_map(|(k, v)| {
                let remaining = v.expires_at.checked_duration_since(now)?;
                if remaining.is_zero() {
                    return None;
                }
                let value = match &v.value {
                    CachedValue::Value(val) => Some(val.clone()),
                    CachedValue::NullSentinel => None,
                };
                Some(SnapshotEntry {
                    key: (*k).clone(),
                    value,
                    remaining_ttl_secs: remaining.as_secs().max(1),
                })
            })
            .collect();
        let count = entries.len();
        let json = serde_json::to_vec_pretty(&entries)?;
        tokio::fs::write(path, json).await?;
        Ok(count)
    }

    /// Reloads a snapshot written by `persist_snapshot`, re-inserting each
    /// entry under its recorded remaining TTL. Returns the number restored.
    pub async fn load_snapshot(&self, path: &Path) -> anyhow::Result<usize> {
        let bytes = tokio::fs::read(path).await?;
        let entries: Vec<SnapshotEntry> = serde_json::from_slice(&bytes)?;
        let count = entries.len();
        for entry in entries {
            let cached = match entry.value {
                Some(v) => CachedValue::Value(v),
                None => CachedValue::NullSentinel,
            };
            self.set(entry.key, cached, Duration::from_secs(entry.remaining_ttl_secs)).await;
        }
        Ok(count)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    key: String,
    value: Option<Value>,
    remaining_ttl_secs: u64,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = Cache::new();
        cache
            .set(
                "k",
                CachedValue::Value(Value::String("v".into())),
                Duration::from_secs(60),
            )
            .await;
        assert_eq!(cache.get("k").await, Some(Some(Value::String("v".into()))));
    }

    #[tokio::test]
    async fn null_sentinel_distinguishes_asked_from_absent() {
        let cache = Cache::new();
        assert_eq!(cache.get("missing").await, None);
        cache
            .set("asked", CachedValue::NullSentinel, Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("asked").await, Some(None));
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = Cache::new();
        cache
            .set(
                "k",
                CachedValue::Value(Value::Bool(true)),
                Duration::from_millis(10),
            )
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn get_or_compute_coalesces_concurrent_misses() {
        let cache = Arc::new(Cache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("shared-key", Duration::from_secs(60), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Value::String("computed".into()))
                    })
                    .await
            }));
        }

        let results: Vec<_> = futures_util::future::join_all(handles).await;
        for r in results {
            assert_eq!(r.unwrap().unwrap(), Value::String("computed".into()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_compute_failure_does_not_populate_cache() {
        let cache = Cache::new();
        let result = cache
            .get_or_compute("k", Duration::from_secs(60), || async {
                anyhow::bail!("boom")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn get_or_fetch_caches_success_under_success_ttl() {
        let cache = Cache::new();
        let result = cache
            .get_or_fetch(
                "k",
                Duration::from_secs(60),
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(1),
                || async { Outcome::Success(Value::String("ok".into())) },
            )
            .await
            .unwrap();
        assert_eq!(result, Some(Value::String("ok".into())));
        assert_eq!(cache.get("k").await, Some(Some(Value::String("ok".into()))));
    }

    #[tokio::test]
    async fn get_or_fetch_no_data_caches_null_sentinel() {
        let cache = Cache::new();
        let result = cache
            .get_or_fetch(
                "k",
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                || async { Outcome::NoData },
            )
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(cache.get("k").await, Some(None));
    }

    #[tokio::test]
    async fn get_or_fetch_transport_error_caches_but_still_propagates() {
        let cache = Cache::new();
        let outcome = cache
            .get_or_fetch(
                "k",
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                || async { Outcome::TransportError(anyhow::anyhow!("timeout")) },
            )
            .await;
        assert!(outcome.is_err());
        // the failure is cached as a null-sentinel; a later hit returns null
        // without re-raising.
        assert_eq!(cache.get("k").await, Some(None));
    }

    #[tokio::test]
    async fn get_or_fetch_hit_skips_the_fetch_closure() {
        let cache = Cache::new();
        cache
            .set(
                "k",
                CachedValue::Value(Value::String("cached".into())),
                Duration::from_secs(60),
            )
            .await;
        let called = Arc::new(AtomicUsize::new(0));
        let called2 = called.clone();
        let result = cache
            .get_or_fetch(
                "k",
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                move || async move {
                    called2.fetch_add(1, Ordering::SeqCst);
                    Outcome::Success(Value::String("new".into()))
                },
            )
            .await
            .unwrap();
        assert_eq!(result, Some(Value::String("cached".into())));
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keys_matching_substring() {
        let cache = Cache::new();
        cache
            .set(
                "alpha_vantage:OVERVIEW:AAPL",
                CachedValue::Value(Value::Null),
                Duration::from_secs(60),
            )
            .await;
        cache
            .set(
                "fred:series:GDPC1",
                CachedValue::Value(Value::Null),
                Duration::from_secs(60),
            )
            .await;
        let matches = cache.keys_matching("*AAPL*");
        assert_eq!(matches, vec!["alpha_vantage:OVERVIEW:AAPL".to_string()]);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_live_entry_was_removed() {
        let cache = Cache::new();
        assert!(!cache.delete("nope").await);
        cache
            .set("k", CachedValue::Value(Value::Null), Duration::from_secs(60))
            .await;
        assert!(cache.delete("k").await);
        assert!(!cache.delete("k").await);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_a_file() {
        let dir = std::env::temp_dir().join(format!("market-intel-cache-test-{:p}", &()));
        let cache = Cache::new();
        cache
            .set("k", CachedValue::Value(Value::String("v".into())), Duration::from_secs(60))
            .await;
        cache.set("asked", CachedValue::NullSentinel, Duration::from_secs(60)).await;

        let written = cache.persist_snapshot(&dir).await.unwrap();
        assert_eq!(written, 2);

        let restored = Cache::new();
        let loaded = restored.load_snapshot(&dir).await.unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(restored.get("k").await, Some(Some(Value::String("v".into()))));
        assert_eq!(restored.get("asked").await, Some(None));

        let _ = std::fs::remove_file(&dir);
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache = Cache::new();
        cache
            .set("k", CachedValue::Value(Value::Null), Duration::from_secs(60))
            .await;
        cache.get("k").await;
        cache.get("missing").await;
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn a_single_miss_on_get_or_fetch_counts_exactly_once() {
        let cache = Cache::new();
        cache
            .get_or_fetch(
                "k",
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(60),
                || async { Outcome::Success(Value::String("v".into())) },
            )
            .await
            .unwrap();
        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn concurrent_misses_on_get_or_fetch_count_one_miss_and_the_rest_as_hits() {
        let cache = Arc::new(Cache::new());
        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(
                        "shared",
                        Duration::from_secs(60),
                        Duration::from_secs(60),
                        Duration::from_secs(60),
                        Duration::from_secs(60),
                        Duration::from_secs(60),
                        || async {
                            tokio::time::sleep(Duration::from_millis(15)).await;
                            Outcome::Success(Value::String("v".into()))
                        },
                    )
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 4);
    }
}
