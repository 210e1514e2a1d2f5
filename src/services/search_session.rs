use crate::error::Result;
use crate::models::Candidate;
use crate::services::market_client::SharedMarketClient;
use crate::services::search::normalize_query;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Latest published search outcome
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Generation of the submission that produced this outcome
    pub generation: u64,
    /// Normalized query
    pub query: String,
    pub items: Arc<Vec<Candidate>>,
    /// View-scoped error text; on failure `items` keeps the last good list
    pub error: Option<String>,
}

/// Search-as-you-type with debounce and stale-response suppression
///
/// Every submission bumps a generation counter. A result is published only
/// if its generation is still the latest when it arrives, so a slow answer
/// to an old query can never overwrite a newer one.
pub struct SearchSession {
    client: SharedMarketClient,
    debounce: Duration,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    results: Arc<watch::Sender<SearchResults>>,
}

impl SearchSession {
    pub fn new(client: SharedMarketClient, debounce: Duration) -> Self {
        let (tx, _) = watch::channel(SearchResults::default());
        Self {
            client,
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            results: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.results.subscribe()
    }

    pub fn latest(&self) -> SearchResults {
        self.results.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Queue a search for `raw` after the debounce window, superseding any
    /// queued or in-flight one; returns the submission's generation
    pub fn submit(&self, raw: &str) -> u64 {
        let generation = self.supersede();
        let query = normalize_query(raw);

        if query.is_empty() {
            self.results.send_replace(SearchResults {
                generation,
                ..SearchResults::default()
            });
            return generation;
        }

        let client = Arc::clone(&self.client);
        let current = Arc::clone(&self.generation);
        let results = Arc::clone(&self.results);
        let debounce = self.debounce;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            let outcome = client.search(&query).await;

            if current.load(Ordering::SeqCst) != generation {
                debug!(query = %query, generation, "Discarding stale search response");
                return;
            }
            let previous = Arc::clone(&results.borrow().items);
            results.send_replace(outcome_to_results(generation, query, outcome, previous));
        });

        *self.pending.lock() = Some(handle);
        generation
    }

    /// Search right away and return the best match, bypassing the debounce
    pub async fn direct_select(&self, raw: &str) -> Result<Option<Candidate>> {
        let generation = self.supersede();
        let query = normalize_query(raw);
        if query.is_empty() {
            return Ok(None);
        }

        let outcome = self.client.search(&query).await;
        let best = match &outcome {
            Ok(items) => items.first().cloned(),
            Err(_) => None,
        };
        let error = outcome.as_ref().err().cloned();

        if self.generation.load(Ordering::SeqCst) == generation {
            let previous = Arc::clone(&self.results.borrow().items);
            self.results
                .send_replace(outcome_to_results(generation, query, outcome, previous));
        }

        match error {
            Some(e) => Err(e),
            None => Ok(best),
        }
    }

    /// Drop whatever is queued and publish nothing for it
    pub fn cancel(&self) {
        self.supersede();
    }

    fn supersede(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
        generation
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }
}

/// A failed search keeps `previous` on screen and only reports the error
fn outcome_to_results(
    generation: u64,
    query: String,
    outcome: Result<Arc<Vec<Candidate>>>,
    previous: Arc<Vec<Candidate>>,
) -> SearchResults {
    match outcome {
        Ok(items) => SearchResults {
            generation,
            query,
            items,
            error: None,
        },
        Err(e) => {
            warn!(query = %query, error = %e, "Search failed");
            SearchResults {
                generation,
                query,
                items: previous,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CacheConfig;
    use crate::services::data_service::testing::FakeDataService;
    use crate::services::market_client::MarketClient;

    const DEBOUNCE: Duration = Duration::from_millis(250);

    fn session(fake: Arc<FakeDataService>) -> SearchSession {
        let client = Arc::new(MarketClient::new(fake, CacheConfig::default()));
        SearchSession::new(client, DEBOUNCE)
    }

    fn tencent() -> Vec<Candidate> {
        vec![Candidate::new("0700.HK", "TENCENT", "00700", "HK")]
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_collapse_into_one_query() {
        let fake = Arc::new(FakeDataService::new().with_search("TENCENT", tencent()));
        let session = session(fake.clone());
        let mut rx = session.subscribe();

        for partial in ["t", "te", "ten", "tenc", "tencent"] {
            session.submit(partial);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        rx.changed().await.unwrap();

        let latest = rx.borrow().clone();
        assert_eq!(latest.query, "TENCENT");
        assert_eq!(latest.items.len(), 1);
        assert_eq!(latest.generation, 5);
        assert_eq!(fake.searches(), 1);
        assert_eq!(*fake.queries.lock(), vec!["TENCENT".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let fake = Arc::new(
            FakeDataService::new()
                .with_latency(Duration::from_millis(1000))
                .with_search("ALI", vec![Candidate::new("9988.HK", "ALIBABA-SW", "09988", "HK")])
                .with_search("TENCENT", tencent()),
        );
        let session = session(fake.clone());

        session.submit("ali");
        // past the debounce: the ALI request is in flight
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fake.searches(), 1);

        let latest_generation = session.submit("tencent");
        tokio::time::sleep(Duration::from_millis(3000)).await;

        let latest = session.latest();
        assert_eq!(latest.generation, latest_generation);
        assert_eq!(latest.query, "TENCENT");
        assert_eq!(latest.items[0].symbol, "0700.HK");
        assert_eq!(fake.searches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_query_clears_immediately() {
        let fake = Arc::new(FakeDataService::new().with_search("TENCENT", tencent()));
        let session = session(fake.clone());

        session.submit("tencent");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(session.latest().items.len(), 1);

        session.submit("   ");
        let latest = session.latest();
        assert!(latest.items.is_empty());
        assert_eq!(latest.query, "");
        assert_eq!(fake.searches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_select_returns_best_match() {
        let fake = Arc::new(FakeDataService::new().with_search(
            "9988",
            vec![
                Candidate::new("89988.HK", "ALIBABA-R", "89988", "HK"),
                Candidate::new("9988.HK", "ALIBABA-SW", "09988", "HK"),
            ],
        ));
        let session = session(fake.clone());

        session.submit("99");
        let best = session.direct_select(" 9988").await.unwrap();
        assert_eq!(best.map(|c| c.symbol), Some("9988.HK".to_string()));

        // the queued "99" search was superseded
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fake.searches(), 1);
        assert_eq!(session.latest().query, "9988");
    }

    #[tokio::test]
    async fn test_search_error_is_published() {
        let fake = Arc::new(FakeDataService::new());
        fake.fail_search.store(true, Ordering::SeqCst);
        let session = session(fake);

        assert!(session.direct_select("x").await.is_err());
        assert!(session.latest().error.unwrap().contains("503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_search_keeps_prior_results() {
        let fake = Arc::new(FakeDataService::new().with_search("TENCENT", tencent()));
        let session = session(fake.clone());

        session.submit("tencent");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(session.latest().items.len(), 1);

        fake.fail_search.store(true, Ordering::SeqCst);
        session.submit("tencen");
        tokio::time::sleep(Duration::from_millis(300)).await;

        let latest = session.latest();
        assert_eq!(latest.query, "TENCEN");
        assert!(latest.error.unwrap().contains("503"));
        assert_eq!(latest.items.len(), 1);
        assert_eq!(latest.items[0].symbol, "0700.HK");

        assert!(session.direct_select("tenc").await.is_err());
        let latest = session.latest();
        assert!(latest.error.is_some());
        assert_eq!(latest.items[0].symbol, "0700.HK");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_direct_select_does_not_overwrite_newer_query() {
        let fake = Arc::new(
            FakeDataService::new()
                .with_latency(Duration::from_millis(1000))
                .with_search("ALI", vec![Candidate::new("9988.HK", "ALIBABA-SW", "09988", "HK")])
                .with_search("TENCENT", tencent()),
        );
        let session = session(fake.clone());

        let (selected, newer) = tokio::join!(session.direct_select("ali"), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            session.submit("tencent")
        });

        // the ALI answer still reaches the caller but is not published
        assert_eq!(selected.unwrap().map(|c| c.symbol), Some("9988.HK".to_string()));
        let latest = session.latest();
        assert_ne!(latest.query, "ALI");
        assert!(latest.items.is_empty());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let latest = session.latest();
        assert_eq!(latest.generation, newer);
        assert_eq!(latest.query, "TENCENT");
        assert_eq!(latest.items[0].symbol, "0700.HK");
        assert_eq!(fake.searches(), 2);
    }
}
