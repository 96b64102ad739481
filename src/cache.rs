// src/cache.rs
//
// MatchCache: an adaptive-eviction cache sitting in front of `PathTrie`
// matching (§4.3). Concurrent reads are served from a sharded map
// (`dashmap`); per-entry access statistics live behind their own lock so
// the weight recomputation needed for eviction never blocks readers on
// the hot path. Grounded on the concurrent-read/occasional-write shape
// of `jizhuozhi-hermes`'s routing cache (dashmap + short-held locks).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::http::Method;
use crate::router::RouteMatch;

/// Weights for the eviction score: recency, frequency, and recorded
/// response time, combined as a single scalar — lower score evicts
/// first. Defaults mirror the distribution named in the spec (recency
/// 0.30 / frequency 0.50 / response-time 0.20).
#[derive(Debug, Clone, Copy)]
pub struct EvictionWeights {
    pub recency: f64,
    pub frequency: f64,
    pub response_time: f64,
}

impl Default for EvictionWeights {
    fn default() -> Self {
        Self {
            recency: 0.30,
            frequency: 0.50,
            response_time: 0.20,
        }
    }
}

struct AccessStat {
    last_access: Instant,
    hit_count: u64,
    avg_response_nanos: f64,
}

impl AccessStat {
    fn new() -> Self {
        Self {
            last_access: Instant::now(),
            hit_count: 1,
            avg_response_nanos: 0.0,
        }
    }

    fn record_hit(&mut self, response_time: Duration) {
        self.last_access = Instant::now();
        self.hit_count += 1;
        let nanos = response_time.as_nanos() as f64;
        // Exponential moving average, smoothing factor 0.2.
        self.avg_response_nanos = self.avg_response_nanos * 0.8 + nanos * 0.2;
    }

    /// Lower is more evictable. Recency decays over a 60s horizon;
    /// frequency and response time are log-scaled so no single very hot
    /// or very slow entry dominates the score.
    fn weight(&self, now: Instant, weights: &EvictionWeights) -> f64 {
        let age = now.duration_since(self.last_access).as_secs_f64();
        let recency_score = (-age / 60.0).exp();
        let frequency_score = (self.hit_count as f64).ln_1p();
        let response_score = 1.0 / (1.0 + self.avg_response_nanos / 1_000_000.0);

        weights.recency * recency_score + weights.frequency * frequency_score + weights.response_time * response_score
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    method: Method,
    path: String,
}

struct CachedEntry {
    params: std::collections::HashMap<String, String>,
    handler: crate::router::Handler,
    middleware: Vec<Arc<dyn crate::middleware::Middleware>>,
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: u64,
}

/// Concurrent, size-bounded cache from `(method, path)` to a resolved
/// route match. Disabled by default; the server calls `enable` with a
/// capacity before serving.
pub struct MatchCache {
    entries: DashMap<CacheKey, CachedEntry>,
    stats: Mutex<std::collections::HashMap<CacheKey, AccessStat>>,
    weights: EvictionWeights,
    max_size: AtomicU64,
    enabled: std::sync::atomic::AtomicBool,

    hit_count: AtomicU64,
    miss_count: AtomicU64,
    eviction_count: AtomicU64,
}

impl MatchCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stats: Mutex::new(std::collections::HashMap::new()),
            weights: EvictionWeights::default(),
            max_size: AtomicU64::new(0),
            enabled: std::sync::atomic::AtomicBool::new(false),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
        }
    }

    pub fn enable(&self, max_size: u64) {
        self.max_size.store(max_size, Ordering::SeqCst);
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.stats.lock().clear();
    }

    pub fn get(&self, method: Method, path: &str) -> Option<RouteMatch> {
        if !self.is_enabled() {
            return None;
        }
        let key = CacheKey { method, path: path.to_string() };
        let start = Instant::now();
        let hit = self.entries.get(&key);
        match hit {
            Some(entry) => {
                let elapsed = start.elapsed();
                self.stats
                    .lock()
                    .entry(key)
                    .or_insert_with(AccessStat::new)
                    .record_hit(elapsed);
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Some(RouteMatch {
                    handler: entry.handler.clone(),
                    middleware: entry.middleware.clone(),
                    params: entry.params.clone(),
                })
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, method: Method, path: &str, result: &RouteMatch) {
        if !self.is_enabled() {
            return;
        }
        let key = CacheKey { method, path: path.to_string() };

        let max = self.max_size.load(Ordering::SeqCst);
        if max > 0 && self.entries.len() as u64 >= max && !self.entries.contains_key(&key) {
            self.evict_one();
        }

        self.entries.insert(
            key.clone(),
            CachedEntry {
                params: result.params.clone(),
                handler: result.handler.clone(),
                middleware: result.middleware.clone(),
            },
        );
        self.stats.lock().entry(key).or_insert_with(AccessStat::new);
    }

    pub fn delete(&self, method: Method, path: &str) {
        let key = CacheKey { method, path: path.to_string() };
        self.entries.remove(&key);
        self.stats.lock().remove(&key);
    }

    /// Evict the single lowest-weighted entry, synchronously, to make
    /// room for an incoming insert (§4.3 "synchronous single-victim
    /// eviction on overflow").
    fn evict_one(&self) {
        let now = Instant::now();
        let victim = {
            let stats = self.stats.lock();
            stats
                .iter()
                .min_by(|(_, a), (_, b)| {
                    a.weight(now, &self.weights)
                        .partial_cmp(&b.weight(now, &self.weights))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(k, _)| k.clone())
        };
        if let Some(key) = victim {
            self.entries.remove(&key);
            self.stats.lock().remove(&key);
            self.eviction_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Evict every entry whose weight falls below `threshold`. Intended
    /// to run periodically off the hot path ("background batch
    /// eviction"), not on every insert.
    pub fn evict_batch(&self, threshold: f64) -> u64 {
        let now = Instant::now();
        let victims: Vec<CacheKey> = {
            let stats = self.stats.lock();
            stats
                .iter()
                .filter(|(_, stat)| stat.weight(now, &self.weights) < threshold)
                .map(|(k, _)| k.clone())
                .collect()
        };
        let count = victims.len() as u64;
        for key in victims {
            self.entries.remove(&key);
            self.stats.lock().remove(&key);
        }
        self.eviction_count.fetch_add(count, Ordering::Relaxed);
        count
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            size: self.entries.len() as u64,
        }
    }
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use std::collections::HashMap;

    fn dummy_match() -> RouteMatch {
        RouteMatch {
            handler: Arc::new(|ctx: &mut Context| ctx.status = 200),
            middleware: Vec::new(),
            params: HashMap::new(),
        }
    }

    #[test]
    fn disabled_by_default() {
        let cache = MatchCache::new();
        cache.set(Method::Get, "/a", &dummy_match());
        assert!(cache.get(Method::Get, "/a").is_none());
    }

    #[test]
    fn enabled_roundtrip_tracks_hits_and_misses() {
        let cache = MatchCache::new();
        cache.enable(10);
        cache.set(Method::Get, "/a", &dummy_match());

        assert!(cache.get(Method::Get, "/a").is_some());
        assert!(cache.get(Method::Get, "/missing").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn overflow_evicts_one_entry() {
        let cache = MatchCache::new();
        cache.enable(2);
        cache.set(Method::Get, "/a", &dummy_match());
        cache.set(Method::Get, "/b", &dummy_match());
        cache.set(Method::Get, "/c", &dummy_match());

        assert_eq!(cache.stats().size, 2);
        assert!(cache.stats().evictions >= 1);
    }

    #[test]
    fn disable_clears_entries() {
        let cache = MatchCache::new();
        cache.enable(10);
        cache.set(Method::Get, "/a", &dummy_match());
        cache.disable();
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn delete_removes_single_entry() {
        let cache = MatchCache::new();
        cache.enable(10);
        cache.set(Method::Get, "/a", &dummy_match());
        cache.set(Method::Get, "/b", &dummy_match());
        cache.delete(Method::Get, "/a");
        assert!(cache.get(Method::Get, "/a").is_none());
        assert!(cache.get(Method::Get, "/b").is_some());
    }
}
