use super::AppContext;
use crate::error::{AppError, Result};
use crate::models::{Bar, Candidate, ChartMode, Summary};
use crate::services::chart::{build_chart, ChartSeries};
use crate::services::response_cache::CachePolicy;
use crate::services::storage::{load_object, merge_write, SharedStore};
use crate::services::view_state::ViewKind;
use crate::services::{SharedMarketClient, SharedWatchlist};
use crate::worker::{refresh_all, refresh_symbol, SharedWatchData, WatchData, WatchlistPoller};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

const QUERY_FIELD: &str = "q";

/// One watchlist entry with whatever live data it has
#[derive(Debug, Clone)]
pub struct WatchCard {
    pub candidate: Candidate,
    pub summary: Option<Arc<Summary>>,
    pub bars: Option<Arc<Vec<Bar>>>,
    pub expanded: bool,
    pub error: Option<String>,
}

pub struct WatchlistView {
    client: SharedMarketClient,
    watchlist: SharedWatchlist,
    store: SharedStore,
    /// Add box text, persisted under the watchlist view namespace
    query: String,
    data: SharedWatchData,
    poller: WatchlistPoller,
}

impl WatchlistView {
    pub fn new(ctx: &AppContext) -> Self {
        let data = Arc::new(RwLock::new(WatchData::default()));
        let query = load_object(ctx.store.as_ref(), ViewKind::Watchlist.namespace())
            .and_then(|snapshot| snapshot.get(QUERY_FIELD)?.as_str().map(str::to_string))
            .unwrap_or_default();
        Self {
            client: Arc::clone(&ctx.client),
            watchlist: Arc::clone(&ctx.watchlist),
            store: Arc::clone(&ctx.store),
            query,
            poller: WatchlistPoller::new(
                Arc::clone(&ctx.client),
                Arc::clone(&ctx.watchlist),
                Arc::clone(&data),
                ctx.config.poll_interval,
            ),
            data,
        }
    }

    pub fn watchlist(&self) -> &SharedWatchlist {
        &self.watchlist
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, raw: &str) {
        self.query = raw.to_string();
        let mut partial = Map::new();
        partial.insert(QUERY_FIELD.to_string(), Value::String(self.query.clone()));
        merge_write(self.store.as_ref(), ViewKind::Watchlist.namespace(), partial);
    }

    pub fn data(&self) -> SharedWatchData {
        Arc::clone(&self.data)
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Initial load of every card, then start the shared timer
    pub async fn open(&mut self) -> usize {
        let failed = refresh_all(&self.client, &self.watchlist, &self.data, CachePolicy::PreferCached).await;
        self.poller.restart();
        failed
    }

    /// Add the best search match for `raw`; `Ok(None)` when it was already listed
    pub async fn add_best_match(&mut self, raw: &str) -> Result<Option<Candidate>> {
        self.set_query(raw);
        let items = self.client.search(raw).await?;
        let best = items
            .first()
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No instrument matches '{}'", raw.trim())))?;

        if !self.add(best.clone()).await {
            return Ok(None);
        }
        self.set_query("");
        Ok(Some(best))
    }

    pub async fn add(&mut self, candidate: Candidate) -> bool {
        let symbol = candidate.symbol.clone();
        if !self.watchlist.add(candidate) {
            return false;
        }
        if let Err(e) = refresh_symbol(&self.client, &self.data, &symbol, false, CachePolicy::PreferCached).await {
            warn!(symbol = %symbol, error = %e, "Watchlist: initial summary failed");
        }
        self.poller.restart();
        true
    }

    pub async fn remove(&mut self, symbol: &str) -> bool {
        if !self.watchlist.remove(symbol) {
            return false;
        }
        {
            let mut data = self.data.write().await;
            data.summaries.remove(symbol);
            data.bars.remove(symbol);
            data.errors.remove(symbol);
        }
        self.poller.restart();
        true
    }

    pub fn move_item(&self, from: usize, to: usize) -> Result<()> {
        self.watchlist.move_item(from, to)
    }

    /// Flip a card; expanding fetches its intraday bars right away
    pub async fn toggle_expanded(&mut self, symbol: &str) -> Result<bool> {
        let expanded = self.watchlist.toggle_expanded(symbol)?;
        if expanded {
            info!(symbol, "Watchlist: expanding card");
            if let Err(e) = refresh_symbol(&self.client, &self.data, symbol, true, CachePolicy::PreferCached).await {
                warn!(symbol, error = %e, "Watchlist: loading card bars failed");
            }
        } else {
            self.data.write().await.bars.remove(symbol);
        }
        Ok(expanded)
    }

    pub async fn refresh_one(&self, symbol: &str) -> Result<()> {
        if !self.watchlist.contains(symbol) {
            return Err(AppError::NotFound(format!("{} is not on the watchlist", symbol)));
        }
        let with_bars = self.watchlist.is_expanded(symbol);
        refresh_symbol(&self.client, &self.data, symbol, with_bars, CachePolicy::Revalidate).await
    }

    pub async fn cards(&self) -> Vec<WatchCard> {
        let data = self.data.read().await;
        self.watchlist
            .items()
            .into_iter()
            .map(|candidate| {
                let symbol = candidate.symbol.as_str();
                let expanded = self.watchlist.is_expanded(symbol);
                WatchCard {
                    summary: data.summaries.get(symbol).cloned(),
                    bars: if expanded { data.bars.get(symbol).cloned() } else { None },
                    error: data.errors.get(symbol).cloned(),
                    expanded,
                    candidate,
                }
            })
            .collect()
    }

    /// Intraday line chart of an expanded card
    pub async fn card_chart(&self, symbol: &str) -> Option<ChartSeries> {
        if !self.watchlist.is_expanded(symbol) {
            return None;
        }
        let data = self.data.read().await;
        let bars = data.bars.get(symbol)?;
        let reference = data.summaries.get(symbol).and_then(|s| s.reference_price());
        Some(build_chart(bars, ChartMode::Line, reference))
    }

    pub fn stop_polling(&mut self) {
        self.poller.stop();
    }
}
