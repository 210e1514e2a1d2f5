pub mod chart;
pub mod data_service;
pub mod market_client;
pub mod response_cache;
pub mod search;
pub mod search_session;
pub mod storage;
pub mod view_state;
pub mod watchlist;

pub use chart::{build_chart, build_compare_chart, performance_rates, rebase, ChartSeries, CompareChart, RebaseBasis};
pub use data_service::{DataService, HttpDataService};
pub use market_client::{MarketClient, SharedMarketClient};
pub use response_cache::{CacheKey, CachePolicy, CacheStats, ResponseCache};
pub use search::{normalize_query, rank_candidates, rank_score};
pub use search_session::{SearchResults, SearchSession};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use view_state::{SelectOptions, ViewKind, ViewState, ViewStateStore};
pub use watchlist::{SharedWatchlist, Watchlist};
