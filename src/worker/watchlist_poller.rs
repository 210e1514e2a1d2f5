use crate::error::Result;
use crate::models::{Bar, KlineRequest, Range, Summary, Timeframe};
use crate::services::market_client::SharedMarketClient;
use crate::services::response_cache::CachePolicy;
use crate::services::watchlist::SharedWatchlist;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Per-symbol live data of the watchlist cards
#[derive(Debug, Clone, Default)]
pub struct WatchData {
    pub summaries: HashMap<String, Arc<Summary>>,
    /// Intraday bars of expanded cards
    pub bars: HashMap<String, Arc<Vec<Bar>>>,
    pub errors: HashMap<String, String>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub ticks: u64,
}

pub type SharedWatchData = Arc<RwLock<WatchData>>;

/// Window shown on an expanded card
pub fn card_request(symbol: &str) -> KlineRequest {
    KlineRequest::new(symbol, Timeframe::finest(), Range::shortest())
}

/// Refresh one card: summary always, intraday bars when `with_bars`
pub async fn refresh_symbol(
    client: &SharedMarketClient,
    data: &SharedWatchData,
    symbol: &str,
    with_bars: bool,
    policy: CachePolicy,
) -> Result<()> {
    let request = card_request(symbol);
    let (summary, bars) = tokio::join!(client.summary(symbol, policy), async {
        if with_bars {
            Some(client.kline(&request, policy).await)
        } else {
            None
        }
    });

    let mut data = data.write().await;
    let mut outcome = Ok(());
    match summary {
        Ok(s) => {
            data.summaries.insert(symbol.to_string(), s);
            data.errors.remove(symbol);
        }
        Err(e) => {
            data.errors.insert(symbol.to_string(), e.to_string());
            outcome = Err(e);
        }
    }
    match bars {
        Some(Ok(b)) => {
            data.bars.insert(symbol.to_string(), b);
        }
        Some(Err(e)) => {
            data.errors.insert(symbol.to_string(), e.to_string());
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }
        None => {}
    }
    outcome
}

/// One batch over the whole watchlist; returns how many symbols failed
///
/// Data of symbols no longer listed is dropped.
pub async fn refresh_all(
    client: &SharedMarketClient,
    watchlist: &SharedWatchlist,
    data: &SharedWatchData,
    policy: CachePolicy,
) -> usize {
    let symbols = watchlist.symbols();
    let expanded: HashSet<String> = watchlist.expanded_symbols().into_iter().collect();

    let results = join_all(symbols.iter().map(|symbol| {
        refresh_symbol(client, data, symbol, expanded.contains(symbol), policy)
    }))
    .await;

    let failed = results.iter().filter(|r| r.is_err()).count();

    let listed: HashSet<&String> = symbols.iter().collect();
    let mut data = data.write().await;
    data.summaries.retain(|s, _| listed.contains(s));
    data.bars.retain(|s, _| listed.contains(s) && expanded.contains(s));
    data.errors.retain(|s, _| listed.contains(s));
    data.refreshed_at = Some(Utc::now());
    failed
}

/// One timer for the whole watchlist
///
/// Each firing refreshes every listed symbol in parallel. The list is read
/// at every firing, so additions are picked up without a restart; restart
/// after a change to refresh right away instead of at the next firing.
pub struct WatchlistPoller {
    client: SharedMarketClient,
    watchlist: SharedWatchlist,
    data: SharedWatchData,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl WatchlistPoller {
    pub fn new(
        client: SharedMarketClient,
        watchlist: SharedWatchlist,
        data: SharedWatchData,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            watchlist,
            data,
            interval,
            handle: None,
        }
    }

    /// (Re)start the timer; an empty watchlist leaves it stopped
    pub fn restart(&mut self) -> bool {
        self.stop();
        if self.watchlist.is_empty() {
            debug!("Watchlist is empty, poller stays idle");
            return false;
        }
        self.handle = Some(tokio::spawn(run(
            Arc::clone(&self.client),
            Arc::clone(&self.watchlist),
            Arc::clone(&self.data),
            self.interval,
        )));
        true
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for WatchlistPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[instrument(skip(client, watchlist, data))]
async fn run(client: SharedMarketClient, watchlist: SharedWatchlist, data: SharedWatchData, every: Duration) {
    info!(interval_secs = every.as_secs(), symbols = watchlist.len(), "Starting watchlist poller");

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut iteration = 0u64;
    loop {
        ticker.tick().await;
        iteration += 1;

        let failed = refresh_all(&client, &watchlist, &data, CachePolicy::Revalidate).await;
        data.write().await.ticks += 1;
        if failed > 0 {
            warn!(iteration, failed, "Watchlist poll: some symbols failed to refresh");
        } else {
            debug!(iteration, symbols = watchlist.len(), "Watchlist poll completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CacheConfig, Candidate};
    use crate::services::data_service::testing::FakeDataService;
    use crate::services::market_client::MarketClient;
    use crate::services::storage::MemoryStore;
    use crate::services::watchlist::Watchlist;
    use std::sync::atomic::Ordering;

    fn summary(price: f64) -> Summary {
        Summary {
            price: Some(price),
            ..Summary::default()
        }
    }

    fn fake() -> Arc<FakeDataService> {
        Arc::new(
            FakeDataService::new()
                .with_summary("A", summary(1.0))
                .with_summary("B", summary(2.0))
                .with_summary("C", summary(3.0))
                .with_bars("B", vec![Bar::new(0, 2.0, 2.0, 2.0, 2.0, 5.0)]),
        )
    }

    fn setup(fake: Arc<FakeDataService>, symbols: &[&str]) -> (SharedMarketClient, SharedWatchlist, SharedWatchData) {
        let client = Arc::new(MarketClient::new(fake, CacheConfig::default()));
        let watchlist = Arc::new(Watchlist::load(Arc::new(MemoryStore::new())));
        for s in symbols {
            watchlist.add(Candidate::new(s, s, "", "HK"));
        }
        (client, watchlist, Arc::new(RwLock::new(WatchData::default())))
    }

    #[tokio::test]
    async fn test_refresh_all_fetches_bars_for_expanded_only() {
        let fake = fake();
        let (client, watchlist, data) = setup(fake.clone(), &["A", "B", "C"]);
        watchlist.toggle_expanded("B").unwrap();

        let failed = refresh_all(&client, &watchlist, &data, CachePolicy::PreferCached).await;
        assert_eq!(failed, 0);
        assert_eq!(fake.summaries(), 3);
        assert_eq!(fake.klines(), 1);

        let data = data.read().await;
        assert_eq!(data.summaries.len(), 3);
        assert_eq!(data.bars.keys().collect::<Vec<_>>(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_removed_symbols_are_pruned() {
        let (client, watchlist, data) = setup(fake(), &["A", "B"]);
        refresh_all(&client, &watchlist, &data, CachePolicy::PreferCached).await;
        watchlist.remove("A");
        refresh_all(&client, &watchlist, &data, CachePolicy::PreferCached).await;

        let data = data.read().await;
        assert!(!data.summaries.contains_key("A"));
        assert!(data.summaries.contains_key("B"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_timer_refreshes_every_symbol() {
        let fake = fake();
        let (client, watchlist, data) = setup(fake.clone(), &["A", "B", "C"]);
        let mut poller = WatchlistPoller::new(client, watchlist, data.clone(), Duration::from_secs(15));

        assert!(poller.restart());
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(fake.summaries(), 6);
        assert_eq!(data.read().await.ticks, 2);

        poller.stop();
        assert!(!poller.is_running());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fake.summaries(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_per_symbol() {
        let fake = fake();
        let (client, watchlist, data) = setup(fake.clone(), &["A", "MISSING"]);
        let mut poller = WatchlistPoller::new(client, watchlist, data.clone(), Duration::from_secs(15));
        poller.restart();

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(poller.is_running());
        let data = data.read().await;
        assert_eq!(data.ticks, 2);
        assert!(data.summaries.contains_key("A"));
        assert!(data.errors.contains_key("MISSING"));
    }

    #[tokio::test]
    async fn test_empty_watchlist_stays_idle() {
        let (client, watchlist, data) = setup(fake(), &[]);
        let mut poller = WatchlistPoller::new(client, watchlist, data, Duration::from_secs(15));
        assert!(!poller.restart());
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_refresh_symbol_records_error() {
        let fake = fake();
        fake.fail_summary.store(true, Ordering::SeqCst);
        let (client, _, data) = setup(fake, &[]);
        assert!(refresh_symbol(&client, &data, "A", false, CachePolicy::PreferCached).await.is_err());
        assert!(data.read().await.errors["A"].contains("502"));
    }
}
