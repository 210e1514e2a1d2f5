//! Per-view selection and presentation state
//!
//! One [`ViewStateStore`] per view, each persisted under its own namespace
//! key. The chart mode follows the presentation window (line for the finest
//! timeframe over the shortest range, candlesticks otherwise) until the user
//! picks a mode by hand; that choice is locked in until a fresh instrument is
//! selected or the lock is cleared.

use crate::constants::{NS_COMPARE_VIEW, NS_SEARCH_VIEW, NS_WATCHLIST_VIEW};
use crate::models::{Candidate, ChartMode, Range, Timeframe};
use crate::services::storage::{load_object, merge_write, SharedStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Search,
    Watchlist,
    Compare,
}

impl ViewKind {
    pub fn namespace(&self) -> &'static str {
        match self {
            ViewKind::Search => NS_SEARCH_VIEW,
            ViewKind::Watchlist => NS_WATCHLIST_VIEW,
            ViewKind::Compare => NS_COMPARE_VIEW,
        }
    }
}

/// Persisted snapshot of one view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub selected: Option<Candidate>,
    #[serde(rename = "tf")]
    pub timeframe: Timeframe,
    pub range: Range,
    pub chart_mode: ChartMode,
    #[serde(rename = "modeLock")]
    pub mode_locked: bool,
    /// Search box text
    #[serde(rename = "q")]
    pub query: String,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            selected: None,
            timeframe: Timeframe::finest(),
            range: Range::shortest(),
            chart_mode: ChartMode::Line,
            mode_locked: false,
            query: String::new(),
        }
    }
}

impl ViewState {
    /// Rebuild from a stored snapshot, field by field; anything missing or
    /// malformed takes its default
    fn from_snapshot(snapshot: &Map<String, Value>, defaults: ViewState) -> Self {
        let timeframe = field(snapshot, "tf").unwrap_or(defaults.timeframe);
        let range = field(snapshot, "range").unwrap_or(defaults.range);
        let chart_mode =
            field(snapshot, "chartMode").unwrap_or_else(|| ChartMode::derive(timeframe, range));

        Self {
            selected: field::<Option<Candidate>>(snapshot, "selected")
                .flatten()
                .filter(|c| !c.symbol.trim().is_empty()),
            timeframe,
            range,
            chart_mode,
            mode_locked: field(snapshot, "modeLock").unwrap_or(defaults.mode_locked),
            query: field(snapshot, "q").unwrap_or(defaults.query),
        }
    }
}

fn field<T: DeserializeOwned>(snapshot: &Map<String, Value>, name: &str) -> Option<T> {
    let value = snapshot.get(name)?;
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(field = name, error = %e, "Ignoring malformed state field");
            None
        }
    }
}

/// How [`ViewStateStore::select_instrument`] treats the presentation window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOptions {
    /// Force finest timeframe, shortest range, line mode and clear the lock
    pub reset_defaults: bool,
}

impl SelectOptions {
    /// Selection restored from persisted state; the window is left alone
    pub fn restore() -> Self {
        Self {
            reset_defaults: false,
        }
    }
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            reset_defaults: true,
        }
    }
}

pub struct ViewStateStore {
    kind: ViewKind,
    store: SharedStore,
    state: ViewState,
}

impl ViewStateStore {
    /// Hydrate from the last snapshot under the view's namespace
    pub fn hydrate(kind: ViewKind, store: SharedStore) -> Self {
        Self::hydrate_with(kind, store, ViewState::default())
    }

    /// Like [`hydrate`](Self::hydrate), with view-specific fallbacks
    pub fn hydrate_with(kind: ViewKind, store: SharedStore, defaults: ViewState) -> Self {
        let state = match load_object(store.as_ref(), kind.namespace()) {
            Some(snapshot) => ViewState::from_snapshot(&snapshot, defaults),
            None => defaults,
        };
        debug!(view = ?kind, state = ?state, "Hydrated view state");
        Self { kind, store, state }
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn selected(&self) -> Option<&Candidate> {
        self.state.selected.as_ref()
    }

    pub fn timeframe(&self) -> Timeframe {
        self.state.timeframe
    }

    pub fn range(&self) -> Range {
        self.state.range
    }

    pub fn chart_mode(&self) -> ChartMode {
        self.state.chart_mode
    }

    pub fn is_mode_locked(&self) -> bool {
        self.state.mode_locked
    }

    pub fn query(&self) -> &str {
        &self.state.query
    }

    pub fn select_instrument(&mut self, candidate: Candidate, options: SelectOptions) {
        debug!(view = ?self.kind, symbol = %candidate.symbol, reset = options.reset_defaults, "Selecting instrument");
        self.state.selected = Some(candidate);

        if options.reset_defaults {
            self.state.timeframe = Timeframe::finest();
            self.state.range = Range::shortest();
            self.state.chart_mode = ChartMode::Line;
            self.state.mode_locked = false;
            self.persist(&["selected", "tf", "range", "chartMode", "modeLock"]);
        } else {
            self.persist(&["selected"]);
        }
    }

    /// User-driven timeframe change; a locked mode is kept
    pub fn set_timeframe(&mut self, timeframe: Timeframe) {
        self.state.timeframe = timeframe;
        self.rederive_mode();
        self.persist(&["tf", "chartMode", "modeLock"]);
    }

    /// User-driven range change; a locked mode is kept
    pub fn set_range(&mut self, range: Range) {
        self.state.range = range;
        self.rederive_mode();
        self.persist(&["range", "chartMode", "modeLock"]);
    }

    pub fn toggle_chart_mode(&mut self) -> ChartMode {
        self.state.chart_mode = self.state.chart_mode.toggled();
        self.state.mode_locked = true;
        self.persist(&["chartMode", "modeLock"]);
        self.state.chart_mode
    }

    /// Drop a manual mode choice and return to the derived mode
    pub fn clear_mode_lock(&mut self) {
        self.state.mode_locked = false;
        self.rederive_mode();
        self.persist(&["chartMode", "modeLock"]);
    }

    pub fn set_query(&mut self, query: &str) {
        self.state.query = query.to_string();
        self.persist(&["q"]);
    }

    /// Back to hard defaults, selection and query included
    pub fn clear(&mut self) {
        self.state = ViewState::default();
        self.persist(&["q", "selected", "tf", "range", "chartMode", "modeLock"]);
    }

    fn rederive_mode(&mut self) {
        if !self.state.mode_locked {
            self.state.chart_mode = ChartMode::derive(self.state.timeframe, self.state.range);
        }
    }

    /// Merge-write the named fields of the current state
    fn persist(&self, fields: &[&str]) {
        let full = match serde_json::to_value(&self.state) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return,
            Err(e) => {
                warn!(view = ?self.kind, error = %e, "Failed to serialize view state");
                return;
            }
        };
        let partial: Map<String, Value> = full
            .into_iter()
            .filter(|(k, _)| fields.contains(&k.as_str()))
            .collect();
        merge_write(self.store.as_ref(), self.kind.namespace(), partial);
    }
}
