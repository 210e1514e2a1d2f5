mod candidate;
mod client_config;
mod mode;
mod ohlcv;
mod summary;
mod timeframe;

pub use candidate::Candidate;
pub use client_config::{CacheConfig, ClientConfig};
pub use mode::{ChartMode, YAxis};
pub use ohlcv::{Bar, KlineResponse};
pub use summary::Summary;
pub use timeframe::{Range, Timeframe};

use serde::{Deserialize, Serialize};

/// Response body of the search endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<Candidate>,
}

/// Parameters of one kline request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KlineRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub range: Range,
}

impl KlineRequest {
    pub fn new(symbol: &str, timeframe: Timeframe, range: Range) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            range,
        }
    }
}

/// Top-level tabs of the app shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Search,
    #[serde(alias = "watch")]
    Watchlist,
    Compare,
}

impl Default for Tab {
    fn default() -> Self {
        Tab::Search
    }
}

impl Tab {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "search" => Ok(Tab::Search),
            "watchlist" | "watch" => Ok(Tab::Watchlist),
            "compare" => Ok(Tab::Compare),
            _ => Err(format!("Invalid tab: '{}'. Valid values: search, watchlist, compare", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Search => "search",
            Tab::Watchlist => "watchlist",
            Tab::Compare => "compare",
        }
    }
}
