use crate::error::Result;
use crate::models::{Bar, KlineRequest, Summary};
use crate::services::market_client::SharedMarketClient;
use crate::services::response_cache::CachePolicy;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Live data of one view's selected instrument
#[derive(Debug, Clone, Default)]
pub struct LiveData {
    /// Symbol the data below belongs to; writes for any other symbol are dropped
    pub symbol: Option<String>,
    pub summary: Option<Arc<Summary>>,
    pub bars: Arc<Vec<Bar>>,
    pub summary_error: Option<String>,
    pub kline_error: Option<String>,
    /// Failure of the most recent poll tick, cleared by the next good one
    pub last_tick_error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub ticks: u64,
}

impl LiveData {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            ..Self::default()
        }
    }
}

pub type SharedLiveData = Arc<RwLock<LiveData>>;

/// Fetch summary and kline for `target` concurrently and store both outcomes
///
/// A failed half keeps the previous value and records its error; the first
/// error is returned.
pub async fn refresh_target(
    client: &SharedMarketClient,
    target: &KlineRequest,
    live: &SharedLiveData,
    policy: CachePolicy,
) -> Result<()> {
    let (summary, bars) = tokio::join!(
        client.summary(&target.symbol, policy),
        client.kline(target, policy),
    );

    let mut data = live.write().await;
    if data.symbol.as_deref() != Some(target.symbol.as_str()) {
        debug!(symbol = %target.symbol, "Selection changed during refresh, dropping result");
        return Ok(());
    }

    let mut first_error = None;
    match summary {
        Ok(s) => {
            data.summary = Some(s);
            data.summary_error = None;
        }
        Err(e) => {
            data.summary_error = Some(e.to_string());
            first_error = Some(e);
        }
    }
    match bars {
        Ok(b) => {
            data.bars = b;
            data.kline_error = None;
        }
        Err(e) => {
            data.kline_error = Some(e.to_string());
            first_error.get_or_insert(e);
        }
    }
    data.refreshed_at = Some(Utc::now());

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct PollTask {
    target: KlineRequest,
    handle: JoinHandle<()>,
}

/// The single repeating refresh task of one view
///
/// Only the finest timeframe is polled. Scheduling a new target always
/// aborts the previous task first, so two timers never write into the same
/// view.
pub struct PollScheduler {
    client: SharedMarketClient,
    live: SharedLiveData,
    interval: Duration,
    task: Option<PollTask>,
}

impl PollScheduler {
    pub fn new(client: SharedMarketClient, live: SharedLiveData, interval: Duration) -> Self {
        Self {
            client,
            live,
            interval,
            task: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Replace the current task; returns whether a new one was started
    pub fn schedule(&mut self, target: KlineRequest) -> bool {
        self.cancel();

        if !target.timeframe.is_finest() {
            debug!(symbol = %target.symbol, tf = %target.timeframe, "Timeframe is not polled");
            return false;
        }

        let handle = tokio::spawn(run(
            Arc::clone(&self.client),
            Arc::clone(&self.live),
            target.clone(),
            self.interval,
        ));
        self.task = Some(PollTask { target, handle });
        true
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            debug!(symbol = %task.target.symbol, tf = %task.target.timeframe, "Cancelling poll task");
            task.handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.handle.is_finished())
    }

    pub fn target(&self) -> Option<&KlineRequest> {
        self.task.as_ref().map(|t| &t.target)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[instrument(skip(client, live, target), fields(symbol = %target.symbol))]
async fn run(client: SharedMarketClient, live: SharedLiveData, target: KlineRequest, every: Duration) {
    info!(
        tf = %target.timeframe,
        range = %target.range,
        interval_secs = every.as_secs(),
        "Starting poll task"
    );

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The selection was just loaded; the first immediate tick is redundant
    ticker.tick().await;

    let mut iteration = 0u64;
    loop {
        ticker.tick().await;
        iteration += 1;

        let outcome = refresh_target(&client, &target, &live, CachePolicy::Revalidate).await;

        let mut data = live.write().await;
        if data.symbol.as_deref() != Some(target.symbol.as_str()) {
            continue;
        }
        data.ticks += 1;
        match outcome {
            Ok(()) => {
                data.last_tick_error = None;
                debug!(iteration, "Poll tick completed");
            }
            Err(e) => {
                // Transient; the schedule carries on
                warn!(iteration, error = %e, "Poll tick failed");
                data.last_tick_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CacheConfig, Range, Timeframe};
    use crate::services::data_service::testing::FakeDataService;
    use crate::services::market_client::MarketClient;
    use std::sync::atomic::Ordering;

    const INTERVAL: Duration = Duration::from_secs(15);

    fn summary(price: f64) -> Summary {
        Summary {
            price: Some(price),
            ..Summary::default()
        }
    }

    fn setup(fake: Arc<FakeDataService>, symbol: &str) -> (SharedMarketClient, SharedLiveData, PollScheduler) {
        let client = Arc::new(MarketClient::new(fake, CacheConfig::default()));
        let live = Arc::new(RwLock::new(LiveData::for_symbol(symbol)));
        let scheduler = PollScheduler::new(client.clone(), live.clone(), INTERVAL);
        (client, live, scheduler)
    }

    fn minute(symbol: &str) -> KlineRequest {
        KlineRequest::new(symbol, Timeframe::Minute1, Range::Day1)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_revalidate_every_interval() {
        let fake = Arc::new(
            FakeDataService::new()
                .with_summary("0700.HK", summary(320.0))
                .with_bars("0700.HK", vec![Bar::new(0, 1.0, 1.0, 1.0, 1.0, 10.0)]),
        );
        let (_, live, mut scheduler) = setup(fake.clone(), "0700.HK");

        assert!(scheduler.schedule(minute("0700.HK")));
        assert!(scheduler.is_active());

        tokio::time::sleep(Duration::from_secs(46)).await;
        assert_eq!(fake.summaries(), 3);
        assert_eq!(fake.klines(), 3);

        let data = live.read().await;
        assert_eq!(data.ticks, 3);
        assert_eq!(data.summary.as_ref().and_then(|s| s.price), Some(320.0));
        assert_eq!(data.bars.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reselect_cancels_prior_task() {
        let fake = Arc::new(
            FakeDataService::new()
                .with_summary("0700.HK", summary(320.0))
                .with_summary("9988.HK", summary(80.0)),
        );
        let (_, live, mut scheduler) = setup(fake.clone(), "0700.HK");

        scheduler.schedule(minute("0700.HK"));
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(fake.summaries(), 1);

        *live.write().await = LiveData::for_symbol("9988.HK");
        scheduler.schedule(minute("9988.HK"));
        assert_eq!(scheduler.target().map(|t| t.symbol.as_str()), Some("9988.HK"));

        tokio::time::sleep(Duration::from_secs(31)).await;
        // only the new task ticked: two more summary calls, not four
        assert_eq!(fake.summaries(), 3);
        let data = live.read().await;
        assert_eq!(data.ticks, 2);
        assert_eq!(data.summary.as_ref().and_then(|s| s.price), Some(80.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_keeps_schedule_and_data() {
        let fake = Arc::new(FakeDataService::new().with_summary("0700.HK", summary(320.0)));
        let (client, live, mut scheduler) = setup(fake.clone(), "0700.HK");

        refresh_target(&client, &minute("0700.HK"), &live, CachePolicy::PreferCached)
            .await
            .unwrap();
        scheduler.schedule(minute("0700.HK"));

        fake.fail_summary.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(16)).await;
        {
            let data = live.read().await;
            assert!(data.last_tick_error.as_deref().unwrap_or_default().contains("502"));
            assert!(data.summary_error.is_some());
            assert_eq!(data.summary.as_ref().and_then(|s| s.price), Some(320.0));
        }
        assert!(scheduler.is_active());

        fake.fail_summary.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(15)).await;
        let data = live.read().await;
        assert_eq!(data.ticks, 2);
        assert!(data.last_tick_error.is_none());
        assert!(data.summary_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_coarse_timeframe_is_not_polled() {
        let fake = Arc::new(FakeDataService::new());
        let (_, _, mut scheduler) = setup(fake.clone(), "0700.HK");

        scheduler.schedule(minute("0700.HK"));
        assert!(!scheduler.schedule(KlineRequest::new("0700.HK", Timeframe::Day1, Range::Month6)));
        assert!(!scheduler.is_active());
        assert!(scheduler.target().is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fake.summaries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let fake = Arc::new(FakeDataService::new());
        let (_, _, mut scheduler) = setup(fake.clone(), "0700.HK");
        scheduler.schedule(minute("0700.HK"));
        drop(scheduler);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fake.summaries(), 0);
    }

    #[tokio::test]
    async fn test_refresh_for_other_symbol_is_dropped() {
        let fake = Arc::new(FakeDataService::new().with_summary("0700.HK", summary(320.0)));
        let (client, live, _) = setup(fake, "9988.HK");

        refresh_target(&client, &minute("0700.HK"), &live, CachePolicy::PreferCached)
            .await
            .unwrap();
        assert!(live.read().await.summary.is_none());
    }
}
