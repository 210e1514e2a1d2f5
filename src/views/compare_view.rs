use super::AppContext;
use crate::error::{AppError, Result};
use crate::models::{Bar, Candidate, ChartMode, KlineRequest, Range, Summary, Timeframe, YAxis};
use crate::services::chart::{
    build_compare_chart, performance_rates, CompareChart, InstrumentBars, PerformanceRate, RateOrder, RebaseBasis,
};
use crate::services::response_cache::CachePolicy;
use crate::services::storage::{load_object, merge_write, SharedStore};
use crate::services::view_state::{ViewKind, ViewState, ViewStateStore};
use crate::services::{SharedMarketClient, SharedWatchlist};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Range shown when switching to daily bars
pub const DEFAULT_DAILY_RANGE: Range = Range::Month3;

const INSTRUMENTS_FIELD: &str = "instruments";
const Y_AXIS_FIELD: &str = "yAxis";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareKind {
    /// `1m` bars over the last day
    Minute,
    /// `1d` bars over a named or custom range
    Daily,
}

/// Several instruments overlaid on one axis
pub struct CompareView {
    client: SharedMarketClient,
    watchlist: SharedWatchlist,
    store: SharedStore,
    state: ViewStateStore,
    instruments: Vec<Candidate>,
    y_axis: YAxis,
    bars: HashMap<String, Arc<Vec<Bar>>>,
    summaries: HashMap<String, Arc<Summary>>,
    errors: HashMap<String, String>,
}

impl CompareView {
    pub fn new(ctx: &AppContext) -> Self {
        let defaults = ViewState {
            timeframe: Timeframe::Day1,
            range: DEFAULT_DAILY_RANGE,
            chart_mode: ChartMode::Line,
            ..ViewState::default()
        };
        let state = ViewStateStore::hydrate_with(ViewKind::Compare, Arc::clone(&ctx.store), defaults);

        let snapshot = load_object(ctx.store.as_ref(), ViewKind::Compare.namespace()).unwrap_or_default();
        let instruments: Vec<Candidate> = snapshot
            .get(INSTRUMENTS_FIELD)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let y_axis = snapshot
            .get(Y_AXIS_FIELD)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let instruments = instruments
            .into_iter()
            .filter(|c| !c.symbol.trim().is_empty() && seen.insert(c.symbol.clone()))
            .collect();

        Self {
            client: Arc::clone(&ctx.client),
            watchlist: Arc::clone(&ctx.watchlist),
            store: Arc::clone(&ctx.store),
            state,
            instruments,
            y_axis,
            bars: HashMap::new(),
            summaries: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn instruments(&self) -> &[Candidate] {
        &self.instruments
    }

    pub fn kind(&self) -> CompareKind {
        if self.state.timeframe().is_intraday() {
            CompareKind::Minute
        } else {
            CompareKind::Daily
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.state.timeframe()
    }

    pub fn range(&self) -> Range {
        self.state.range()
    }

    pub fn y_axis(&self) -> YAxis {
        self.y_axis
    }

    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    pub fn summary(&self, symbol: &str) -> Option<&Arc<Summary>> {
        self.summaries.get(symbol)
    }

    /// Append unless already compared; returns whether it was added
    pub fn add(&mut self, candidate: Candidate) -> bool {
        if candidate.symbol.trim().is_empty() || self.instruments.iter().any(|c| c.symbol == candidate.symbol) {
            return false;
        }
        self.instruments.push(candidate);
        self.persist_instruments();
        true
    }

    pub async fn add_best_match(&mut self, raw: &str) -> Result<Option<Candidate>> {
        let items = self.client.search(raw).await?;
        let best = items
            .first()
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No instrument matches '{}'", raw.trim())))?;
        Ok(self.add(best.clone()).then_some(best))
    }

    /// Compare everything on the watchlist; returns how many were new
    pub fn add_watchlist(&mut self) -> usize {
        self.watchlist
            .items()
            .into_iter()
            .filter(|c| self.add(c.clone()))
            .count()
    }

    pub fn remove(&mut self, symbol: &str) -> bool {
        let before = self.instruments.len();
        self.instruments.retain(|c| c.symbol != symbol);
        if self.instruments.len() == before {
            return false;
        }
        self.bars.remove(symbol);
        self.summaries.remove(symbol);
        self.errors.remove(symbol);
        self.persist_instruments();
        true
    }

    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.instruments.len();
        if from >= len || to >= len {
            return Err(AppError::InvalidInput(format!(
                "Cannot move instrument {} to {}: comparing {}",
                from, to, len
            )));
        }
        let moved = self.instruments.remove(from);
        self.instruments.insert(to, moved);
        self.persist_instruments();
        Ok(())
    }

    /// Intraday overlay, measured in percent from the session open
    pub fn set_minute_mode(&mut self) {
        self.state.set_timeframe(Timeframe::Minute1);
        self.state.set_range(Range::Day1);
        self.set_y_axis(YAxis::Percentage);
    }

    /// Daily overlay in price terms
    pub fn set_daily_mode(&mut self, range: Range) {
        self.state.set_timeframe(Timeframe::Day1);
        self.state.set_range(range);
        self.set_y_axis(YAxis::Price);
    }

    /// Change the span of a daily overlay
    pub fn set_range(&mut self, range: Range) -> Result<()> {
        if self.kind() == CompareKind::Minute {
            return Err(AppError::InvalidInput(
                "Minute comparison always covers one day".to_string(),
            ));
        }
        self.state.set_range(range);
        Ok(())
    }

    /// Daily overlay between explicit epoch-second bounds
    pub fn set_custom_range(&mut self, start: i64, end: i64) -> Result<()> {
        let range = Range::custom(start, end).map_err(AppError::InvalidInput)?;
        if self.kind() == CompareKind::Minute {
            self.state.set_timeframe(Timeframe::Day1);
        }
        self.state.set_range(range);
        Ok(())
    }

    pub fn set_y_axis(&mut self, axis: YAxis) {
        self.y_axis = axis;
        let mut partial = Map::new();
        partial.insert(Y_AXIS_FIELD.to_string(), json_or_null(&axis));
        merge_write(self.store.as_ref(), ViewKind::Compare.namespace(), partial);
    }

    pub fn toggle_y_axis(&mut self) -> YAxis {
        let next = match self.y_axis {
            YAxis::Price => YAxis::Percentage,
            YAxis::Percentage => YAxis::Price,
        };
        self.set_y_axis(next);
        next
    }

    /// Fetch bars and summaries of every instrument concurrently; returns
    /// how many instruments failed
    pub async fn load(&mut self) -> usize {
        let timeframe = self.timeframe();
        let range = self.range();
        info!(
            instruments = self.instruments.len(),
            tf = %timeframe,
            range = %range,
            "Compare view: loading"
        );

        let client = &self.client;
        let outcomes = join_all(self.instruments.iter().map(|c| async move {
            let request = KlineRequest::new(&c.symbol, timeframe, range);
            let (bars, summary) = tokio::join!(
                client.kline(&request, CachePolicy::PreferCached),
                client.summary(&c.symbol, CachePolicy::PreferCached),
            );
            (c.symbol.clone(), bars, summary)
        }))
        .await;

        let listed: HashSet<&str> = self.instruments.iter().map(|c| c.symbol.as_str()).collect();
        self.bars.retain(|symbol, _| listed.contains(symbol.as_str()));
        self.summaries.retain(|symbol, _| listed.contains(symbol.as_str()));
        self.errors.retain(|symbol, _| listed.contains(symbol.as_str()));

        // A failed instrument keeps the bars it last loaded
        let mut failed = 0;
        for (symbol, bars, summary) in outcomes {
            match bars {
                Ok(bars) => {
                    self.errors.remove(&symbol);
                    self.bars.insert(symbol.clone(), bars);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Compare view: kline failed");
                    self.errors.insert(symbol.clone(), e.to_string());
                    failed += 1;
                }
            }
            match summary {
                Ok(summary) => {
                    self.summaries.insert(symbol, summary);
                }
                // Summaries only decorate the legend
                Err(e) => debug!(symbol = %symbol, error = %e, "Compare view: summary failed"),
            }
        }
        failed
    }

    pub fn chart(&self) -> CompareChart {
        build_compare_chart(
            &self.loaded(),
            self.y_axis,
            RebaseBasis::for_timeframe(self.timeframe()),
        )
    }

    /// Performance from the first open to the bar at `cursor` (latest when `None`)
    pub fn rates(&self, cursor: Option<usize>, order: RateOrder) -> Vec<PerformanceRate> {
        performance_rates(&self.loaded(), cursor, order)
    }

    fn loaded(&self) -> Vec<InstrumentBars> {
        self.instruments
            .iter()
            .map(|c| InstrumentBars {
                symbol: c.symbol.clone(),
                bars: self.bars.get(&c.symbol).cloned().unwrap_or_default(),
            })
            .collect()
    }

    fn persist_instruments(&self) {
        let mut partial = Map::new();
        partial.insert(INSTRUMENTS_FIELD.to_string(), json_or_null(&self.instruments));
        merge_write(self.store.as_ref(), ViewKind::Compare.namespace(), partial);
    }
}

fn json_or_null<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
