use super::{block_on, fail, print_summary, RULE};
use crate::cli::WatchAction;
use crate::error::{AppError, Result};
use crate::models::Tab;
use crate::utils::{fmt_num, fmt_pct};
use crate::views::{save_tab, AppContext, WatchCard, WatchlistView};

pub fn run(action: WatchAction) {
    let result = block_on(|ctx| async move {
        save_tab(&ctx.store, Tab::Watchlist);
        match action {
            WatchAction::Add { query } => add(&ctx, &query).await,
            WatchAction::Remove { symbol } => remove(&ctx, &symbol).await,
            WatchAction::Move { from, to } => move_item(&ctx, from, to),
            WatchAction::List => list(&ctx).await,
            WatchAction::Expand { symbol } => expand(&ctx, &symbol).await,
        }
    });

    if let Err(e) = result {
        fail("Watchlist command failed", e);
    }
}

async fn add(ctx: &AppContext, query: &str) -> Result<()> {
    let mut view = WatchlistView::new(ctx);
    match view.add_best_match(query).await? {
        Some(candidate) => println!("✅ Added {}", candidate),
        None => println!("⚠️  Best match for '{}' is already on the watchlist", query.trim()),
    }
    view.stop_polling();
    Ok(())
}

async fn remove(ctx: &AppContext, symbol: &str) -> Result<()> {
    let mut view = WatchlistView::new(ctx);
    if view.remove(symbol).await {
        println!("✅ Removed {}", symbol);
        Ok(())
    } else {
        Err(AppError::NotFound(format!("{} is not on the watchlist", symbol)))
    }
}

fn move_item(ctx: &AppContext, from: usize, to: usize) -> Result<()> {
    let view = WatchlistView::new(ctx);
    view.move_item(from, to)?;
    println!("✅ Moved entry {} to {}", from, to);
    for (i, c) in view.watchlist().items().iter().enumerate() {
        println!("{:>3}  {}", i, c);
    }
    Ok(())
}

async fn expand(ctx: &AppContext, symbol: &str) -> Result<()> {
    let mut view = WatchlistView::new(ctx);
    if view.toggle_expanded(symbol).await? {
        println!("🔽 Expanded {}", symbol);
        if let Some(chart) = view.card_chart(symbol).await {
            println!("   {} intraday bars", chart.categories.len());
        }
    } else {
        println!("🔼 Collapsed {}", symbol);
    }
    Ok(())
}

async fn list(ctx: &AppContext) -> Result<()> {
    let mut view = WatchlistView::new(ctx);
    if view.watchlist().is_empty() {
        println!("⚠️  Watchlist is empty. Add one with 'quotedesk watch add <query>'.");
        return Ok(());
    }

    let failed = view.open().await;
    view.stop_polling();

    println!("📋 Watchlist ({} entries)\n", view.watchlist().len());
    println!("{:>3}  {:<14} {:<24} {:>10} {:>9}", "#", "SYMBOL", "NAME", "PRICE", "CHANGE");
    let cards = view.cards().await;
    for (i, card) in cards.iter().enumerate() {
        print_row(i, card);
    }

    for card in cards.iter().filter(|c| c.expanded) {
        println!("\n{}\n", RULE);
        println!("🔹 {}", card.candidate);
        if let Some(summary) = &card.summary {
            print_summary(summary);
        }
        let bars = card.bars.as_ref().map_or(0, |b| b.len());
        println!("   {} intraday bars", bars);
    }

    if failed > 0 {
        println!("\n⚠️  {} entries failed to refresh", failed);
    }
    Ok(())
}

fn print_row(index: usize, card: &WatchCard) {
    let price = card.summary.as_ref().and_then(|s| s.price);
    let change = card.summary.as_ref().and_then(|s| s.pct_change);
    println!(
        "{:>3}  {:<14} {:<24} {:>10} {:>9}{}",
        index,
        card.candidate.symbol,
        card.candidate.label(),
        fmt_num(price),
        fmt_pct(change),
        card.error.as_deref().map(|e| format!("  ⚠️  {}", e)).unwrap_or_default()
    );
}
