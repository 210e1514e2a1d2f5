use crate::error::{AppError, Result};
use crate::models::CacheConfig;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Floor on the sweep period; `interval` rejects a zero period
pub const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Cache key: endpoint name plus its normalized parameter set
///
/// Parameters live in a sorted map so that insertion order never matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    endpoint: &'static str,
    params: BTreeMap<&'static str, String>,
}

impl CacheKey {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter; empty values are left out, as they are on the wire
    pub fn param(mut self, name: &'static str, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.params.insert(name, value);
        }
        self
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            write!(f, "{}{}={}", if i == 0 { '?' } else { '&' }, k, v)?;
        }
        Ok(())
    }
}

/// How a lookup treats a still-valid entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Serve a valid entry when there is one
    #[default]
    PreferCached,
    /// Always go to the service (joining an in-flight request if any)
    Revalidate,
}

/// Cache entry for tracking individual cached responses
#[derive(Clone, Debug)]
struct CacheEntry<V> {
    payload: V,
    captured_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.captured_at) < self.ttl
    }
}

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V>>>;

struct InFlight<V> {
    id: u64,
    future: SharedFetch<V>,
}

/// Counters exposed for status output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evictions: u64,
    pub entries: usize,
    pub in_flight: usize,
}

struct Inner<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    in_flight: HashMap<CacheKey, InFlight<V>>,
    next_fetch_id: u64,
    stats: CacheStats,
}

impl<V: Clone> Inner<V> {
    fn valid_payload(&self, key: &CacheKey, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_valid(now))
            .map(|entry| entry.payload.clone())
    }

    /// Insert, making room first: expired entries go, then the oldest captures
    fn insert_bounded(&mut self, key: CacheKey, entry: CacheEntry<V>, max_entries: usize) {
        if max_entries == 0 {
            return;
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= max_entries {
            let now = Instant::now();
            let before = self.entries.len();
            self.entries.retain(|_, e| e.is_valid(now));
            self.stats.evictions += (before - self.entries.len()) as u64;
        }

        while !self.entries.contains_key(&key) && self.entries.len() >= max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.captured_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    self.stats.evictions += 1;
                    debug!(key = %oldest, "Evicted oldest cache entry");
                }
                None => break,
            }
        }

        self.entries.insert(key, entry);
    }
}

/// Time-bounded memoization of data service responses with request coalescing
///
/// Concurrent lookups for a key that is already being fetched join that
/// fetch instead of issuing their own. Each fetch runs on its own tokio
/// task, so it completes and lands in the cache even if every caller
/// waiting on it has gone away.
pub struct ResponseCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
    config: CacheConfig,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config,
        }
    }
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        info!(
            enabled = config.enabled,
            ttl_secs = config.ttl.as_secs(),
            max_entries = config.max_entries,
            "Initializing response cache"
        );
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                next_fetch_id: 0,
                stats: CacheStats::default(),
            })),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Valid entry for `key`, if any
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.config.enabled {
            return None;
        }
        self.inner.lock().valid_payload(key, Instant::now())
    }

    /// Store `payload` under `key`, replacing whatever was there
    pub fn put(&self, key: CacheKey, payload: V, ttl: Duration) {
        if !self.config.enabled {
            return;
        }
        let entry = CacheEntry {
            payload,
            captured_at: Instant::now(),
            ttl,
        };
        self.inner
            .lock()
            .insert_bounded(key, entry, self.config.max_entries);
    }

    /// Serve from cache, join an identical in-flight request, or fetch
    ///
    /// Failed fetches are not stored; an older entry stays in place until a
    /// later fetch succeeds.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, policy: CachePolicy, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let shared = {
            let mut inner = self.inner.lock();

            let cached = if self.config.enabled && policy == CachePolicy::PreferCached {
                inner.valid_payload(&key, Instant::now())
            } else {
                None
            };

            if let Some(payload) = cached {
                inner.stats.hits += 1;
                debug!(key = %key, "Cache hit");
                return Ok(payload);
            }

            if let Some(in_flight) = inner.in_flight.get(&key) {
                let future = in_flight.future.clone();
                inner.stats.coalesced += 1;
                debug!(key = %key, "Joining in-flight request");
                future
            } else {
                inner.stats.misses += 1;
                let id = inner.next_fetch_id;
                inner.next_fetch_id += 1;
                debug!(key = %key, policy = ?policy, "Cache miss, fetching");

                let cache = self.clone();
                let task_key = key.clone();
                let request = fetch();
                let handle = tokio::spawn(async move {
                    let result = request.await;
                    cache.complete(&task_key, id, &result);
                    result
                });

                let future = async move {
                    handle
                        .await
                        .unwrap_or_else(|e| Err(AppError::Other(format!("Fetch task failed: {}", e))))
                }
                .boxed()
                .shared();

                inner.in_flight.insert(
                    key,
                    InFlight {
                        id,
                        future: future.clone(),
                    },
                );
                future
            }
        };

        shared.await
    }

    /// Called from the fetch task once the service answered
    fn complete(&self, key: &CacheKey, id: u64, result: &Result<V>) {
        let mut inner = self.inner.lock();

        if inner.in_flight.get(key).is_some_and(|f| f.id == id) {
            inner.in_flight.remove(key);
        }

        match result {
            Ok(payload) if self.config.enabled => {
                let entry = CacheEntry {
                    payload: payload.clone(),
                    captured_at: Instant::now(),
                    ttl: self.config.ttl,
                };
                inner.insert_bounded(key.clone(), entry, self.config.max_entries);
            }
            Ok(_) => {}
            Err(e) => {
                debug!(key = %key, error = %e, "Fetch failed, nothing cached");
            }
        }
    }

    /// Remove expired entries; returns how many were dropped
    pub fn sweep_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.is_valid(now));
        let removed = before - inner.entries.len();
        inner.stats.evictions += removed as u64;
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            in_flight: inner.in_flight.len(),
            ..inner.stats
        }
    }

    /// Periodically sweep expired entries for the lifetime of a long session;
    /// the period is at least [`MIN_SWEEP_PERIOD`]
    pub fn spawn_sweep_task(&self, every: Duration) -> JoinHandle<()> {
        let every = every.max(MIN_SWEEP_PERIOD);
        let cache = self.clone();
        tokio::spawn(async move {
            info!(every_secs = every.as_secs(), "Starting cache sweep task");
            let mut ticker = tokio::time::interval(every);
            // First tick fires immediately; nothing to sweep yet
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep_expired();
                if removed > 0 {
                    debug!(removed, remaining = cache.stats().entries, "Swept expired cache entries");
                }
            }
        })
    }
}
