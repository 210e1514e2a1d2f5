use super::{block_on, fail};
use crate::error::{AppError, Result};
use crate::models::Tab;
use crate::utils::{fmt_num, fmt_pct};
use crate::views::{save_tab, AppContext, SearchView};
use crate::worker::LiveData;

pub fn run(query: String, ticks: u64) {
    if let Err(e) = block_on(|ctx| async move { follow(&ctx, &query, ticks).await }) {
        fail("Polling failed", e);
    }
}

async fn follow(ctx: &AppContext, query: &str, ticks: u64) -> Result<()> {
    save_tab(&ctx.store, Tab::Search);
    let mut view = SearchView::new(ctx);
    let candidate = view
        .direct_select(query)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No instrument matches '{}'", query.trim())))?;

    if !view.poller().is_active() {
        println!(
            "⚠️  {} is shown on {} bars; only the finest timeframe is polled",
            candidate.symbol,
            view.state().timeframe()
        );
        return Ok(());
    }

    let every = ctx.config.poll_interval;
    println!("⏱️  Following {} every {:?} for {} ticks\n", candidate, every, ticks);
    print_tick(&view.live().read().await.clone());

    let sweeper = ctx.client.cache().spawn_sweep_task(ctx.config.cache.ttl);
    let live = view.live();
    let mut seen = 0;
    while seen < ticks {
        tokio::time::sleep(every).await;
        let data = live.read().await.clone();
        if data.ticks > seen {
            seen = data.ticks;
            print_tick(&data);
        }
    }

    sweeper.abort();
    // Stops the poll task
    drop(view);
    println!("\n✅ Done after {} ticks", seen);
    Ok(())
}

fn print_tick(data: &LiveData) {
    let summary = data.summary.as_deref();
    let at = data
        .refreshed_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    println!(
        "#{:<3} {}  price {:>10}  change {:>8}  bars {:>4}{}",
        data.ticks,
        at,
        fmt_num(summary.and_then(|s| s.price)),
        fmt_pct(summary.and_then(|s| s.pct_change)),
        data.bars.len(),
        data.last_tick_error
            .as_deref()
            .map(|e| format!("  ⚠️  {}", e))
            .unwrap_or_default()
    );
}
