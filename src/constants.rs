//! Shared constants
//!
//! Persistence namespaces, ranking weights and the default knobs used by
//! [`ClientConfig`](crate::models::ClientConfig).
//!
//! ## Persistence namespaces
//!
//! Every key carries a `vN` suffix. Bump it when the stored shape changes
//! incompatibly; old snapshots are then simply ignored and hydration falls
//! back to defaults.

/// Search view snapshot (selection, timeframe, range, chart mode, query)
pub const NS_SEARCH_VIEW: &str = "quotedesk.search_page.v1";

/// Watchlist view snapshot (presentation state of the detail chart)
pub const NS_WATCHLIST_VIEW: &str = "quotedesk.watch_page.v1";

/// Compare view snapshot (instrument set, axis mode, range)
pub const NS_COMPARE_VIEW: &str = "quotedesk.compare_page.v1";

/// Global app shell state (active tab)
pub const NS_APP: &str = "quotedesk.app.v1";

/// Global watchlist (ordered candidate list)
pub const NS_WATCHLIST: &str = "quotedesk.watchlist.v1";

/// Suffix appended to [`NS_WATCHLIST`] for the expanded-card map
pub const WATCHLIST_EXPANDED_SUFFIX: &str = ":expanded";

/// Field stamped on every merge write (epoch milliseconds)
pub const SNAPSHOT_TIMESTAMP_FIELD: &str = "_ts";

/// Ranking
///
/// | Rule                                   | Adjustment |
/// |----------------------------------------|------------|
/// | not on the home market                 | = 1000     |
/// | no `-R` / `-WR` marker (plain listing) | -50        |
/// | `-SW` marker                           | +5         |
/// | `-R` marker                            | +20        |
/// | `-WR` marker                           | +30        |
/// | listing code starts with `0`           | -10        |
/// | listing code starts with `8`           | +10        |
/// | numeric code tie-break                 | + n / 1e5  |
pub mod ranking {
    pub const HOME_MARKET: &str = "HK";
    pub const HOME_SYMBOL_SUFFIX: &str = ".HK";
    pub const FOREIGN_SCORE: f64 = 1000.0;

    pub const RESTRICTED_MARKER: &str = "-R";
    pub const WHEN_ISSUED_RESTRICTED_MARKER: &str = "-WR";
    pub const DUAL_CLASS_MARKER: &str = "-SW";

    pub const PLAIN_BONUS: f64 = -50.0;
    pub const DUAL_CLASS_PENALTY: f64 = 5.0;
    pub const RESTRICTED_PENALTY: f64 = 20.0;
    pub const WHEN_ISSUED_RESTRICTED_PENALTY: f64 = 30.0;
    pub const MAIN_BOARD_BONUS: f64 = -10.0;
    pub const GROWTH_BOARD_PENALTY: f64 = 10.0;
    pub const CODE_TIE_BREAK_DIVISOR: f64 = 100_000.0;
}

/// Default data service base URL
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Response cache defaults (5 minutes, generous entry bound)
pub const DEFAULT_CACHE_ENABLED: bool = true;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 512;

/// Live refresh cadence for the finest timeframe
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Drop prior summary/bars when a new instrument is selected
pub const DEFAULT_CLEAR_ON_SELECT: bool = true;

/// Keystroke debounce for search-as-you-type
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 250;

/// HTTP timeout for the data service
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 25;

/// Default location of the persisted state document
pub const DEFAULT_STATE_FILE: &str = "quotedesk_state.json";

/// Label prefix on the previous-close reference line
pub const REFERENCE_LINE_LABEL: &str = "Prev close";
