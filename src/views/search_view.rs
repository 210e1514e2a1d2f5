use super::AppContext;
use crate::error::Result;
use crate::models::{Candidate, ChartMode, KlineRequest, Range, Timeframe};
use crate::services::chart::{build_chart, ChartSeries};
use crate::services::response_cache::CachePolicy;
use crate::services::search_session::{SearchResults, SearchSession};
use crate::services::view_state::{SelectOptions, ViewKind, ViewStateStore};
use crate::services::{SharedMarketClient, SharedWatchlist};
use crate::worker::{refresh_target, LiveData, PollScheduler, SharedLiveData};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

/// Search box, candidate list and the detail panel of one instrument
pub struct SearchView {
    client: SharedMarketClient,
    watchlist: SharedWatchlist,
    session: SearchSession,
    state: ViewStateStore,
    live: SharedLiveData,
    poller: PollScheduler,
    clear_on_select: bool,
}

impl SearchView {
    pub fn new(ctx: &AppContext) -> Self {
        let state = ViewStateStore::hydrate(ViewKind::Search, Arc::clone(&ctx.store));
        let live = Arc::new(RwLock::new(match state.selected() {
            Some(c) => LiveData::for_symbol(&c.symbol),
            None => LiveData::default(),
        }));
        Self {
            client: Arc::clone(&ctx.client),
            watchlist: Arc::clone(&ctx.watchlist),
            session: SearchSession::new(Arc::clone(&ctx.client), ctx.config.search_debounce),
            poller: PollScheduler::new(Arc::clone(&ctx.client), Arc::clone(&live), ctx.config.poll_interval),
            state,
            live,
            clear_on_select: ctx.config.clear_on_select,
        }
    }

    pub fn state(&self) -> &ViewStateStore {
        &self.state
    }

    pub fn live(&self) -> SharedLiveData {
        Arc::clone(&self.live)
    }

    pub fn poller(&self) -> &PollScheduler {
        &self.poller
    }

    /// Load the restored selection, if any, and start polling it
    pub async fn open(&mut self) -> Result<()> {
        if self.state.selected().is_none() {
            return Ok(());
        }
        self.reload().await
    }

    /// Search-as-you-type; the box text is persisted
    pub fn submit_query(&mut self, raw: &str) -> u64 {
        self.state.set_query(raw);
        self.session.submit(raw)
    }

    pub fn results(&self) -> SearchResults {
        self.session.latest()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<SearchResults> {
        self.session.subscribe()
    }

    /// Pick the best match for `raw` right away
    pub async fn direct_select(&mut self, raw: &str) -> Result<Option<Candidate>> {
        self.state.set_query(raw);
        let best = self.session.direct_select(raw).await?;
        if let Some(candidate) = &best {
            self.select(candidate.clone()).await?;
        }
        Ok(best)
    }

    /// Fresh selection: default window, reload, poll
    pub async fn select(&mut self, candidate: Candidate) -> Result<()> {
        info!(symbol = %candidate.symbol, "Search view: selecting instrument");
        let symbol = candidate.symbol.clone();
        self.state.select_instrument(candidate, SelectOptions::default());

        {
            let mut live = self.live.write().await;
            if self.clear_on_select {
                *live = LiveData::for_symbol(&symbol);
            } else {
                live.symbol = Some(symbol);
            }
        }
        self.reload().await
    }

    pub async fn set_timeframe(&mut self, timeframe: Timeframe) -> Result<()> {
        self.state.set_timeframe(timeframe);
        self.reload().await
    }

    pub async fn set_range(&mut self, range: Range) -> Result<()> {
        self.state.set_range(range);
        self.reload().await
    }

    pub fn toggle_chart_mode(&mut self) -> ChartMode {
        self.state.toggle_chart_mode()
    }

    /// Back to the mode derived from the current window
    pub fn clear_mode_lock(&mut self) -> ChartMode {
        self.state.clear_mode_lock();
        self.state.chart_mode()
    }

    /// Revalidate summary and bars of the current selection
    pub async fn refresh_now(&self) -> Result<()> {
        match self.request() {
            Some(request) => refresh_target(&self.client, &request, &self.live, CachePolicy::Revalidate).await,
            None => Ok(()),
        }
    }

    /// Drop selection, results and live data; back to defaults
    pub async fn clear_all(&mut self) {
        self.poller.cancel();
        self.session.submit("");
        self.state.clear();
        *self.live.write().await = LiveData::default();
    }

    pub async fn chart(&self) -> Option<ChartSeries> {
        self.state.selected()?;
        let live = self.live.read().await;
        let reference = live.summary.as_ref().and_then(|s| s.reference_price());
        Some(build_chart(&live.bars, self.state.chart_mode(), reference))
    }

    pub fn add_to_watchlist(&self, candidate: Candidate) -> bool {
        self.watchlist.add(candidate)
    }

    fn request(&self) -> Option<KlineRequest> {
        self.state
            .selected()
            .map(|c| KlineRequest::new(&c.symbol, self.state.timeframe(), self.state.range()))
    }

    /// The prior poll task is cancelled before the new window is fetched
    async fn reload(&mut self) -> Result<()> {
        let Some(request) = self.request() else {
            self.poller.cancel();
            return Ok(());
        };
        debug!(symbol = %request.symbol, tf = %request.timeframe, range = %request.range, "Search view: loading");
        self.poller.schedule(request.clone());
        refresh_target(&self.client, &request, &self.live, CachePolicy::PreferCached).await
    }
}
