use clap::{Parser, Subcommand};

use crate::commands;
use crate::models::{ChartMode, Range, Timeframe};

#[derive(Parser)]
#[command(name = "quotedesk")]
#[command(about = "Instrument search, watchlist and comparison client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search instruments by name or code, best match first
    Search {
        query: String,
    },
    /// Select the best match and print its summary and chart
    Show {
        query: String,
        /// Bar timeframe (1m, 5m, 60m, 1d, 1wk, ...)
        #[arg(long, value_parser = Timeframe::from_str)]
        tf: Option<Timeframe>,
        /// History range (1d, 5d, 1mo, ... or START..END in epoch seconds)
        #[arg(long, value_parser = Range::from_str)]
        range: Option<Range>,
        /// Chart mode (line or candle); sticks until a new instrument is selected
        #[arg(long, value_parser = ChartMode::from_str)]
        mode: Option<ChartMode>,
        /// Drop a manual chart mode and follow the window again
        #[arg(long, conflicts_with = "mode")]
        auto_mode: bool,
        /// Print the chart description as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the watchlist
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },
    /// Overlay several instruments
    Compare {
        /// Queries to add to the comparison (best match each)
        queries: Vec<String>,
        /// Daily bars instead of one day of minute bars
        #[arg(long)]
        daily: bool,
        /// Range for daily bars
        #[arg(long, value_parser = Range::from_str)]
        range: Option<Range>,
        /// Percent change instead of price
        #[arg(long)]
        percent: bool,
        /// Sort performance by rate instead of input order
        #[arg(long)]
        by_rate: bool,
        /// Include every watchlist instrument
        #[arg(long)]
        with_watchlist: bool,
        /// Remove these symbols from the comparison
        #[arg(long)]
        remove: Vec<String>,
        /// Print the overlay description as JSON
        #[arg(long)]
        json: bool,
    },
    /// Select the best match and follow it live
    Poll {
        query: String,
        /// Stop after this many poll ticks
        #[arg(long, default_value_t = 3)]
        ticks: u64,
    },
    /// Show or set the active tab
    Tab {
        /// search, watchlist or compare
        name: Option<String>,
    },
    /// Show configuration and persisted state
    Status,
}

#[derive(Subcommand)]
pub enum WatchAction {
    /// Add the best match for a query
    Add { query: String },
    /// Remove a symbol
    Remove { symbol: String },
    /// Move the entry at FROM to TO (zero-based)
    Move { from: usize, to: usize },
    /// List entries with live summaries
    List,
    /// Expand or collapse a card
    Expand { symbol: String },
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { query } => {
            commands::search::run(query);
        }
        Commands::Show {
            query,
            tf,
            range,
            mode,
            auto_mode,
            json,
        } => {
            commands::show::run(query, tf, range, mode, auto_mode, json);
        }
        Commands::Watch { action } => {
            commands::watch::run(action);
        }
        Commands::Compare {
            queries,
            daily,
            range,
            percent,
            by_rate,
            with_watchlist,
            remove,
            json,
        } => {
            commands::compare::run(commands::compare::CompareArgs {
                queries,
                daily,
                range,
                percent,
                by_rate,
                with_watchlist,
                remove,
                json,
            });
        }
        Commands::Poll { query, ticks } => {
            commands::poll::run(query, ticks);
        }
        Commands::Tab { name } => {
            commands::tab::run(name);
        }
        Commands::Status => {
            commands::status::run();
        }
    }
}
