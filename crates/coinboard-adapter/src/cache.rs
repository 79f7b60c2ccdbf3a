/*
[INPUT]:  (url, currency) requests from the presentation layer
[OUTPUT]: Shared Arc<Snapshot> values, fetched at most once per key per validity window
[POS]:    Cache layer - owns the fetch -> extract -> normalize pipeline
[UPDATE]: When changing expiry policy, single-flight behavior or store semantics
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::http::{CoinboardError, Fetcher, Result};
use crate::normalize::ListingSchema;
use crate::payload::PayloadLocator;
use crate::types::Snapshot;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub url: String,
    pub currency: String,
}

impl CacheKey {
    pub fn new(url: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            currency: currency.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub snapshot: Arc<Snapshot>,
    pub stored_at: Instant,
}

/// Backing storage for cached snapshots.
///
/// Only successful pipeline runs are ever written.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, key: &CacheKey) -> Option<CachedSnapshot>;
    fn save(&self, key: CacheKey, entry: CachedSnapshot);
    fn remove(&self, key: &CacheKey);
    fn clear(&self);
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<CacheKey, CachedSnapshot>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemoryStore {
    fn load(&self, key: &CacheKey) -> Option<CachedSnapshot> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn save(&self, key: CacheKey, entry: CachedSnapshot) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    fn remove(&self, key: &CacheKey) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// How long a stored snapshot is served without re-fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// `None` keeps snapshots for the life of the cache.
    pub ttl: Option<Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Some(DEFAULT_TTL),
        }
    }
}

impl CachePolicy {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }

    pub fn forever() -> Self {
        Self { ttl: None }
    }

    pub fn is_fresh(&self, entry: &CachedSnapshot) -> bool {
        match self.ttl {
            Some(ttl) => entry.stored_at.elapsed() < ttl,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

/// Per-key coordination of pipeline runs.
#[derive(Debug, Default)]
struct Flight {
    /// Held for a whole run; holds the failure of the latest completed run.
    gate: tokio::sync::Mutex<Option<Arc<CoinboardError>>>,
    /// Completed runs.
    runs: AtomicU64,
    /// Bumped by `invalidate_key`.
    epoch: AtomicU64,
}

/// Memoizes normalized snapshots per `(url, currency)`.
///
/// Concurrent misses for one key run the pipeline once. Callers that queued
/// behind a run receive its outcome: the stored snapshot on success, the same
/// error ([`CoinboardError::Shared`]) on failure.
pub struct SnapshotCache {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn SnapshotStore>,
    locator: PayloadLocator,
    schema: ListingSchema,
    policy: CachePolicy,
    flights: Mutex<HashMap<CacheKey, Arc<Flight>>>,
    /// Bumped by `invalidate`.
    epoch: AtomicU64,
    counters: CacheCounters,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("locator", &self.locator)
            .field("schema", &self.schema)
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl SnapshotCache {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            store: Arc::new(InMemoryStore::new()),
            locator: PayloadLocator::default(),
            schema: ListingSchema::default(),
            policy: CachePolicy::default(),
            flights: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            counters: CacheCounters::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_locator(mut self, locator: PayloadLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_schema(mut self, schema: ListingSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Return the cached snapshot for the key, running the pipeline on a miss.
    pub async fn get_snapshot(&self, url: &str, currency: &str) -> Result<Arc<Snapshot>> {
        let key = CacheKey::new(url, currency);
        if let Some(snapshot) = self.fresh(&key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(url, currency, "snapshot cache hit");
            return Ok(snapshot);
        }

        let flight = self.flight(&key);
        let joined = flight.runs.load(Ordering::Acquire);
        let mut last_failure = flight.gate.lock().await;

        if let Some(snapshot) = self.fresh(&key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(url, currency, "snapshot filled by concurrent caller");
            return Ok(snapshot);
        }

        if flight.runs.load(Ordering::Acquire) != joined {
            if let Some(err) = last_failure.as_ref() {
                debug!(url, currency, "concurrent run failed; sharing its error");
                return Err(CoinboardError::Shared(Arc::clone(err)));
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.run_locked(&key, &flight, &mut last_failure).await
    }

    /// Re-run the pipeline for one key even if its entry is still fresh.
    ///
    /// On failure the previous snapshot stays in the store.
    pub async fn refresh(&self, url: &str, currency: &str) -> Result<Arc<Snapshot>> {
        let key = CacheKey::new(url, currency);
        let flight = self.flight(&key);
        let mut last_failure = flight.gate.lock().await;
        self.run_locked(&key, &flight, &mut last_failure).await
    }

    /// Stored snapshot for the key regardless of age.
    pub fn last_good(&self, url: &str, currency: &str) -> Option<Arc<Snapshot>> {
        self.store
            .load(&CacheKey::new(url, currency))
            .map(|entry| entry.snapshot)
    }

    /// Drop every stored snapshot. Runs still in flight finish but do not store
    /// their result.
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.store.clear();
        info!("snapshot cache invalidated");
    }

    pub fn invalidate_key(&self, url: &str, currency: &str) {
        let key = CacheKey::new(url, currency);
        self.flight(&key).epoch.fetch_add(1, Ordering::AcqRel);
        self.store.remove(&key);
        debug!(url, currency, "snapshot cache entry invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    fn fresh(&self, key: &CacheKey) -> Option<Arc<Snapshot>> {
        self.store
            .load(key)
            .filter(|entry| self.policy.is_fresh(entry))
            .map(|entry| entry.snapshot)
    }

    fn flight(&self, key: &CacheKey) -> Arc<Flight> {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone()
    }

    fn epochs(&self, flight: &Flight) -> (u64, u64) {
        (
            self.epoch.load(Ordering::Acquire),
            flight.epoch.load(Ordering::Acquire),
        )
    }

    /// Run the pipeline while holding the flight gate and publish the outcome
    /// to callers queued on it.
    async fn run_locked(
        &self,
        key: &CacheKey,
        flight: &Flight,
        last_failure: &mut Option<Arc<CoinboardError>>,
    ) -> Result<Arc<Snapshot>> {
        let result = match self.run_pipeline(key, flight).await {
            Ok(snapshot) => {
                *last_failure = None;
                Ok(snapshot)
            }
            Err(err) => {
                let shared = Arc::new(err);
                *last_failure = Some(Arc::clone(&shared));
                Err(CoinboardError::Shared(shared))
            }
        };
        flight.runs.fetch_add(1, Ordering::Release);
        result
    }

    async fn run_pipeline(&self, key: &CacheKey, flight: &Flight) -> Result<Arc<Snapshot>> {
        let started = Instant::now();
        let epochs = self.epochs(flight);
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);

        match self.build_snapshot(key).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                if self.epochs(flight) == epochs {
                    self.store.save(
                        key.clone(),
                        CachedSnapshot {
                            snapshot: Arc::clone(&snapshot),
                            stored_at: Instant::now(),
                        },
                    );
                    // invalidated between the check and the save
                    if self.epochs(flight) != epochs {
                        self.store.remove(key);
                    }
                } else {
                    debug!(
                        url = %key.url,
                        currency = %key.currency,
                        "cache invalidated during fetch; snapshot not stored"
                    );
                }
                info!(
                    url = %key.url,
                    currency = %key.currency,
                    rows = snapshot.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "snapshot refreshed"
                );
                Ok(snapshot)
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    url = %key.url,
                    currency = %key.currency,
                    stage = %err.stage(),
                    error = %err,
                    has_previous = self.store.load(key).is_some(),
                    "snapshot pipeline failed; store left unchanged"
                );
                Err(err)
            }
        }
    }

    async fn build_snapshot(&self, key: &CacheKey) -> Result<Snapshot> {
        let doc = self.fetcher.fetch(&key.url).await?;
        let payload = self.locator.extract(&doc)?;
        drop(doc);

        let (snapshot, report) = self.schema.normalize(&payload, &key.currency, &key.url)?;
        if report.skipped() > 0 {
            warn!(
                listed = report.listed,
                kept = report.kept,
                invalid = report.skipped_invalid,
                duplicate = report.skipped_duplicate,
                truncated = report.truncated,
                "some listings were not kept"
            );
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ErrorKind;
    use crate::types::RawDocument;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    const URL: &str = "https://coinmarketcap.com/";

    fn listings_page(symbols: &[&str]) -> String {
        let data = symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| {
                serde_json::json!({
                    "id": i + 1,
                    "slug": symbol.to_lowercase(),
                    "symbol": symbol,
                    "quote": { "USD": { "price": (i + 1) as f64 * 10.0 } }
                })
            })
            .collect::<Vec<_>>();
        let state = serde_json::json!({
            "props": {
                "initialState": { "cryptocurrency": { "listingLatest": { "data": data } } }
            }
        });
        format!(
            "<html><body>\
             <script id=\"__NEXT_DATA__\" type=\"application/json\">{state}</script>\
             </body></html>"
        )
    }

    /// Replays scripted responses in order, repeating the last one.
    struct ScriptedFetcher {
        responses: Mutex<Vec<std::result::Result<String, u16>>>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<std::result::Result<String, u16>>) -> Arc<Self> {
            Self::slow(responses, Duration::ZERO)
        }

        fn slow(responses: Vec<std::result::Result<String, u16>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                delay,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<RawDocument> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let next = {
                let mut responses = self.responses.lock().unwrap();
                if responses.len() > 1 {
                    responses.remove(0)
                } else {
                    responses[0].clone()
                }
            };
            match next {
                Ok(body) => Ok(RawDocument::new(url, 200, body)),
                Err(status) => Err(CoinboardError::HttpStatus {
                    url: url.to_string(),
                    status,
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_second_call_is_cache_hit() {
        let fetcher = ScriptedFetcher::new(vec![Ok(listings_page(&["BTC", "ETH"]))]);
        let cache = SnapshotCache::new(fetcher.clone());

        let first = cache.get_snapshot(URL, "USD").await.expect("first");
        let second = cache.get_snapshot(URL, "USD").await.expect("second");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                fetches: 1,
                failures: 0
            }
        );
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let fetcher = ScriptedFetcher::new(vec![Ok(listings_page(&["BTC"]))]);
        let cache = SnapshotCache::new(fetcher.clone());

        cache.get_snapshot(URL, "USD").await.expect("usd");
        cache
            .get_snapshot("https://coinmarketcap.com/?page=1", "USD")
            .await
            .expect("other url");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot() {
        let fetcher = ScriptedFetcher::new(vec![Ok(listings_page(&["BTC"])), Err(500)]);
        let cache = SnapshotCache::new(fetcher.clone())
            .with_policy(CachePolicy::with_ttl(Duration::ZERO));

        let first = cache.get_snapshot(URL, "USD").await.expect("first");
        let err = cache.get_snapshot(URL, "USD").await.expect_err("500");

        assert_eq!(err.kind(), ErrorKind::Network);
        let kept = cache.last_good(URL, "USD").expect("previous snapshot kept");
        assert!(Arc::ptr_eq(&first, &kept));
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_missing_payload_is_not_cached() {
        let page = "<html><body>maintenance</body></html>".to_string();
        let fetcher = ScriptedFetcher::new(vec![Ok(page)]);
        let cache = SnapshotCache::new(fetcher.clone());

        let err = cache.get_snapshot(URL, "USD").await.expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::MissingPayload);
        assert!(cache.last_good(URL, "USD").is_none());

        // a later, non-overlapping call tries again
        cache.get_snapshot(URL, "USD").await.expect_err("still missing");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_refetches() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(listings_page(&["BTC"])),
            Ok(listings_page(&["BTC", "ETH"])),
        ]);
        let cache = SnapshotCache::new(fetcher.clone())
            .with_policy(CachePolicy::with_ttl(Duration::ZERO));

        let first = cache.get_snapshot(URL, "USD").await.expect("first");
        let second = cache.get_snapshot(URL, "USD").await.expect("second");
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_and_invalidate() {
        let fetcher = ScriptedFetcher::new(vec![Ok(listings_page(&["BTC"]))]);
        let cache = SnapshotCache::new(fetcher.clone()).with_policy(CachePolicy::forever());

        let first = cache.get_snapshot(URL, "USD").await.expect("first");
        let refreshed = cache.refresh(URL, "USD").await.expect("refresh");
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert_eq!(fetcher.calls(), 2);

        cache.invalidate();
        assert!(cache.last_good(URL, "USD").is_none());
        cache.get_snapshot(URL, "USD").await.expect("after invalidate");
        assert_eq!(fetcher.calls(), 3);

        cache.invalidate_key(URL, "USD");
        assert!(cache.last_good(URL, "USD").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let fetcher = ScriptedFetcher::slow(
            vec![Ok(listings_page(&["BTC", "ETH", "SOL"]))],
            Duration::from_millis(50),
        );
        let cache = Arc::new(SnapshotCache::new(fetcher.clone()));

        let handles = (0..10)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_snapshot(URL, "USD").await })
            })
            .collect::<Vec<_>>();

        let mut snapshots = Vec::new();
        for handle in handles {
            snapshots.push(handle.await.expect("join").expect("snapshot"));
        }

        assert_eq!(fetcher.calls(), 1);
        assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_failure() {
        let fetcher = ScriptedFetcher::slow(vec![Err(500)], Duration::from_millis(50));
        let cache = Arc::new(SnapshotCache::new(fetcher.clone()));

        let handles = (0..10)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_snapshot(URL, "USD").await })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            let err = handle.await.expect("join").expect_err("500");
            assert_eq!(err.kind(), ErrorKind::Network);
            assert!(matches!(err.root(), CoinboardError::HttpStatus { status: 500, .. }));
        }

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(cache.stats().failures, 1);
        assert!(cache.last_good(URL, "USD").is_none());
    }

    #[tokio::test]
    async fn test_invalidate_during_fetch_keeps_single_flight() {
        let fetcher =
            ScriptedFetcher::slow(vec![Ok(listings_page(&["BTC"]))], Duration::from_millis(200));
        let cache = Arc::new(SnapshotCache::new(fetcher.clone()));

        let first = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_snapshot(URL, "USD").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.invalidate();
        let second = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_snapshot(URL, "USD").await })
        };

        let first = first.await.expect("join").expect("first");
        let second = second.await.expect("join").expect("second");

        assert_eq!(fetcher.max_in_flight(), 1);
        assert_eq!(fetcher.calls(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
        let stored = cache.last_good(URL, "USD").expect("second run stored");
        assert!(Arc::ptr_eq(&stored, &second));
    }

    #[tokio::test]
    async fn test_invalidate_during_fetch_discards_result() {
        let fetcher =
            ScriptedFetcher::slow(vec![Ok(listings_page(&["BTC"]))], Duration::from_millis(100));
        let cache = Arc::new(SnapshotCache::new(fetcher.clone()));

        let pending = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_snapshot(URL, "USD").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.invalidate_key(URL, "USD");

        let snapshot = pending.await.expect("join").expect("caller still gets its result");
        assert_eq!(snapshot.len(), 1);
        assert!(cache.last_good(URL, "USD").is_none());
    }
}
