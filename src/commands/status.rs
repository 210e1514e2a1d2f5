use super::{block_on, fail, RULE};
use crate::error::Result;
use crate::services::view_state::{ViewKind, ViewStateStore};
use crate::views::{load_tab, AppContext, CompareView};

pub fn run() {
    println!("📊 Quotedesk Status\n");

    if let Err(e) = block_on(|ctx| async move { show_status(&ctx) }) {
        fail("Error", e);
    }
}

fn show_status(ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    println!("🌐 API base:       {}", config.api_base);
    println!("   HTTP timeout:   {:?}", config.http_timeout);
    println!(
        "   Cache:          {} (ttl {:?}, max {} entries)",
        if config.cache.enabled { "enabled" } else { "disabled" },
        config.cache.ttl,
        config.cache.max_entries
    );
    println!("   Poll interval:  {:?}", config.poll_interval);
    println!("   Debounce:       {:?}", config.search_debounce);
    println!("   Clear on select: {}", config.clear_on_select);
    println!("💾 State file:     {}", config.state_file.display());

    let stats = ctx.client.cache_stats();
    println!(
        "   Cache stats:    {} entries, {} hits, {} misses",
        stats.entries, stats.hits, stats.misses
    );

    println!("\n{}\n", RULE);
    println!("📑 Active tab: {}", load_tab(&ctx.store).as_str());

    let search = ViewStateStore::hydrate(ViewKind::Search, ctx.store.clone());
    let selected = search
        .selected()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "(none)".to_string());
    println!(
        "🔍 Search:  {}  [{} / {}, {}{}]",
        selected,
        search.timeframe(),
        search.range(),
        search.chart_mode().as_str(),
        if search.is_mode_locked() { ", locked" } else { "" }
    );

    let compare = CompareView::new(ctx);
    let symbols: Vec<&str> = compare.instruments().iter().map(|c| c.symbol.as_str()).collect();
    println!(
        "📊 Compare: {}  [{} / {}, {:?}]",
        if symbols.is_empty() { "(none)".to_string() } else { symbols.join(", ") },
        compare.timeframe(),
        compare.range(),
        compare.y_axis()
    );

    println!("\n{}\n", RULE);
    let items = ctx.watchlist.items();
    if items.is_empty() {
        println!("📋 Watchlist is empty");
    } else {
        println!("📋 Watchlist ({} entries)", items.len());
        for (i, c) in items.iter().enumerate() {
            let marker = if ctx.watchlist.is_expanded(&c.symbol) { "▾" } else { "▸" };
            println!("   {:>2} {} {}", i, marker, c);
        }
    }

    Ok(())
}
