//! The three views and the state they share
//!
//! Every view owns its view state store, its live data and its poll task.
//! The market client (and so the response cache) and the watchlist are
//! shared through [`AppContext`].

mod compare_view;
mod search_view;
mod watchlist_view;

pub use compare_view::{CompareKind, CompareView, DEFAULT_DAILY_RANGE};
pub use search_view::SearchView;
pub use watchlist_view::{WatchCard, WatchlistView};

use crate::constants::NS_APP;
use crate::error::Result;
use crate::models::{ClientConfig, Tab};
use crate::services::storage::{get_value, set_value};
use crate::services::{
    DataService, FileStore, HttpDataService, MarketClient, SharedMarketClient, SharedStore,
    SharedWatchlist, Watchlist,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Everything a view needs from the outside
#[derive(Clone)]
pub struct AppContext {
    pub config: ClientConfig,
    pub client: SharedMarketClient,
    pub store: SharedStore,
    pub watchlist: SharedWatchlist,
}

impl AppContext {
    /// HTTP data service and file-backed state, as configured
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let service = HttpDataService::new(&config.api_base, config.http_timeout)?;
        let store = FileStore::open(&config.state_file);
        info!(
            api_base = %config.api_base,
            state_file = %config.state_file.display(),
            "Initialized app context"
        );
        Ok(Self::with_parts(config, Arc::new(service), Arc::new(store)))
    }

    pub fn with_parts(config: ClientConfig, service: Arc<dyn DataService>, store: SharedStore) -> Self {
        let client = Arc::new(MarketClient::new(service, config.cache));
        let watchlist = Arc::new(Watchlist::load(Arc::clone(&store)));
        Self {
            config,
            client,
            store,
            watchlist,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AppSnapshot {
    #[serde(default)]
    tab: Tab,
}

/// Tab the app was last left on
pub fn load_tab(store: &SharedStore) -> Tab {
    get_value::<AppSnapshot>(store.as_ref(), NS_APP)
        .unwrap_or_default()
        .tab
}

pub fn save_tab(store: &SharedStore, tab: Tab) {
    set_value(store.as_ref(), NS_APP, &AppSnapshot { tab });
}
