//! Caching facade over a [`DataService`]
//!
//! Every request goes through one [`ResponseCache`], keyed by endpoint and
//! normalized parameters, so that identical requests from different views
//! collide and coalesce.

use crate::error::{Error, Result};
use crate::models::{Bar, CacheConfig, Candidate, KlineRequest, Summary};
use crate::services::data_service::{kline_params, DataService};
use crate::services::response_cache::{CacheKey, CachePolicy, CacheStats, ResponseCache};
use crate::services::search::{normalize_query, rank_candidates};
use std::sync::Arc;
use tracing::debug;

/// Cached response body, shared between every reader
#[derive(Debug, Clone)]
pub enum Payload {
    Candidates(Arc<Vec<Candidate>>),
    Summary(Arc<Summary>),
    Bars(Arc<Vec<Bar>>),
}

pub type SharedMarketClient = Arc<MarketClient>;

pub struct MarketClient {
    service: Arc<dyn DataService>,
    cache: ResponseCache<Payload>,
}

impl MarketClient {
    pub fn new(service: Arc<dyn DataService>, config: CacheConfig) -> Self {
        Self {
            service,
            cache: ResponseCache::new(config),
        }
    }

    pub fn cache(&self) -> &ResponseCache<Payload> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn search_key(query: &str) -> CacheKey {
        CacheKey::new("search").param("q", query)
    }

    pub fn summary_key(symbol: &str) -> CacheKey {
        CacheKey::new("summary").param("symbol", symbol)
    }

    pub fn kline_key(request: &KlineRequest) -> CacheKey {
        kline_params(request)
            .into_iter()
            .fold(CacheKey::new("kline"), |key, (name, value)| key.param(name, value))
    }

    /// Ranked candidates for raw search text; blank text yields no candidates
    /// without touching the service
    pub async fn search(&self, raw: &str) -> Result<Arc<Vec<Candidate>>> {
        let query = normalize_query(raw);
        if query.is_empty() {
            return Ok(Arc::new(Vec::new()));
        }

        let service = Arc::clone(&self.service);
        let key = Self::search_key(&query);
        let payload = self
            .cache
            .get_or_fetch(key, CachePolicy::PreferCached, move || async move {
                let raw_items = service.search(&query).await?;
                let total = raw_items.len();
                let items: Vec<Candidate> = raw_items
                    .into_iter()
                    .filter(|c| !c.symbol.trim().is_empty())
                    .collect();
                debug!(query = %query, total, kept = items.len(), "Search results received");
                Ok(Payload::Candidates(Arc::new(rank_candidates(items))))
            })
            .await?;

        match payload {
            Payload::Candidates(items) => Ok(items),
            other => Err(mismatch("search", &other)),
        }
    }

    pub async fn summary(&self, symbol: &str, policy: CachePolicy) -> Result<Arc<Summary>> {
        let service = Arc::clone(&self.service);
        let owned = symbol.to_string();
        let payload = self
            .cache
            .get_or_fetch(Self::summary_key(symbol), policy, move || async move {
                let summary = service.summary(&owned).await?;
                Ok(Payload::Summary(Arc::new(summary)))
            })
            .await?;

        match payload {
            Payload::Summary(summary) => Ok(summary),
            other => Err(mismatch("summary", &other)),
        }
    }

    pub async fn kline(&self, request: &KlineRequest, policy: CachePolicy) -> Result<Arc<Vec<Bar>>> {
        let service = Arc::clone(&self.service);
        let owned = request.clone();
        let payload = self
            .cache
            .get_or_fetch(Self::kline_key(request), policy, move || async move {
                let response = service.kline(&owned).await?;
                Ok(Payload::Bars(Arc::new(response.bars)))
            })
            .await?;

        match payload {
            Payload::Bars(bars) => Ok(bars),
            other => Err(mismatch("kline", &other)),
        }
    }
}

fn mismatch(endpoint: &str, payload: &Payload) -> Error {
    Error::Other(format!("Cached payload for {} has the wrong shape: {:?}", endpoint, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Range, Timeframe};
    use crate::services::data_service::testing::FakeDataService;
    use std::time::Duration;

    fn config() -> CacheConfig {
        CacheConfig {
            enabled: true,
            ttl: Duration::from_secs(300),
            max_entries: 64,
        }
    }

    fn alibaba_results() -> Vec<Candidate> {
        vec![
            Candidate::new("89988.HK", "ALIBABA-R", "89988", "HK"),
            Candidate::new("", "BROKEN", "", "HK"),
            Candidate::new("9988.HK", "ALIBABA-SW", "09988", "HK"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_normalizes_ranks_and_caches() {
        let fake = Arc::new(FakeDataService::new().with_search("9988", alibaba_results()));
        let client = MarketClient::new(fake.clone(), config());

        let items = client.search("  9988 ").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].symbol, "9988.HK");
        assert_eq!(items[1].symbol, "89988.HK");

        let again = client.search("9988").await.unwrap();
        assert!(Arc::ptr_eq(&items, &again));
        assert_eq!(fake.searches(), 1);
    }

    #[tokio::test]
    async fn test_blank_search_skips_service() {
        let fake = Arc::new(FakeDataService::new());
        let client = MarketClient::new(fake.clone(), config());
        assert!(client.search("   ").await.unwrap().is_empty());
        assert_eq!(fake.searches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_summaries_share_one_call() {
        let fake = Arc::new(
            FakeDataService::new()
                .with_latency(Duration::from_millis(300))
                .with_summary("0700.HK", Summary { price: Some(320.0), ..Summary::default() }),
        );
        let client = MarketClient::new(fake.clone(), config());

        let (a, b) = tokio::join!(
            client.summary("0700.HK", CachePolicy::PreferCached),
            client.summary("0700.HK", CachePolicy::PreferCached),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(fake.summaries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kline_keys_include_range() {
        let fake = Arc::new(FakeDataService::new().with_bars("0700.HK", vec![Bar::new(0, 1.0, 1.0, 1.0, 1.0, 1.0)]));
        let client = MarketClient::new(fake.clone(), config());

        let day = KlineRequest::new("0700.HK", Timeframe::Minute1, Range::Day1);
        let week = KlineRequest::new("0700.HK", Timeframe::Minute1, Range::Day5);
        client.kline(&day, CachePolicy::PreferCached).await.unwrap();
        client.kline(&day, CachePolicy::PreferCached).await.unwrap();
        client.kline(&week, CachePolicy::PreferCached).await.unwrap();
        assert_eq!(fake.klines(), 2);

        client.kline(&day, CachePolicy::Revalidate).await.unwrap();
        assert_eq!(fake.klines(), 3);
    }

    #[test]
    fn test_kline_key_custom_bounds() {
        let req = KlineRequest::new("X", Timeframe::Day1, Range::Custom { start: 1, end: 2 });
        assert_eq!(MarketClient::kline_key(&req).to_string(), "kline?end=2&start=1&symbol=X&tf=1d");
    }

    #[tokio::test]
    async fn test_service_errors_propagate() {
        let fake = Arc::new(FakeDataService::new());
        let client = MarketClient::new(fake.clone(), config());
        let err = client.summary("NOPE", CachePolicy::PreferCached).await;
        assert_eq!(err.unwrap_err(), Error::NotFound("NOPE".to_string()));
    }
}
