pub mod poll_scheduler;
pub mod watchlist_poller;

pub use poll_scheduler::{refresh_target, LiveData, PollScheduler, SharedLiveData};
pub use watchlist_poller::{refresh_all, refresh_symbol, SharedWatchData, WatchData, WatchlistPoller};
