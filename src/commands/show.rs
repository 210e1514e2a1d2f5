use super::{block_on, fail, print_json, print_summary, RULE};
use crate::error::AppError;
use crate::models::{Bar, Candidate, ChartMode, Range, Tab, Timeframe};
use crate::services::chart::ChartSeries;
use crate::utils::{fmt_num, MISSING};
use crate::views::{save_tab, SearchView};
use crate::worker::LiveData;

struct Shown {
    candidate: Candidate,
    timeframe: Timeframe,
    range: Range,
    mode: ChartMode,
    live: LiveData,
    chart: Option<ChartSeries>,
}

pub fn run(
    query: String,
    tf: Option<Timeframe>,
    range: Option<Range>,
    mode: Option<ChartMode>,
    auto_mode: bool,
    json: bool,
) {
    let shown = match block_on(|ctx| async move {
        save_tab(&ctx.store, Tab::Search);
        let mut view = SearchView::new(&ctx);
        let candidate = view
            .direct_select(&query)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No instrument matches '{}'", query.trim())))?;

        if let Some(tf) = tf {
            view.set_timeframe(tf).await?;
        }
        if let Some(range) = range {
            view.set_range(range).await?;
        }
        if mode.is_some_and(|m| m != view.state().chart_mode()) {
            view.toggle_chart_mode();
        }
        if auto_mode {
            view.clear_mode_lock();
        }

        let live = view.live().read().await.clone();
        Ok::<_, AppError>(Shown {
            candidate,
            timeframe: view.state().timeframe(),
            range: view.state().range(),
            mode: view.state().chart_mode(),
            chart: view.chart().await,
            live,
        })
    }) {
        Ok(shown) => shown,
        Err(e) => fail("Show failed", e),
    };

    if json {
        if let Some(chart) = &shown.chart {
            if let Err(e) = print_json(chart) {
                fail("Rendering chart failed", e);
            }
        }
        return;
    }

    print_details(&shown);
}

fn minute(bar: &Bar) -> String {
    bar.time()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| MISSING.to_string())
}

fn print_details(shown: &Shown) {
    println!("🔹 {}", shown.candidate);
    println!("   Window: {} / {}   Mode: {}\n", shown.timeframe, shown.range, shown.mode.as_str());

    match &shown.live.summary {
        Some(summary) => print_summary(summary),
        None => println!("   ⚠️  No summary: {}", shown.live.summary_error.as_deref().unwrap_or("unavailable")),
    }

    println!("\n{}\n", RULE);

    let bars = &shown.live.bars;
    if let Some(err) = &shown.live.kline_error {
        println!("⚠️  Bars failed to load: {}", err);
    }
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => {
            println!(
                "📈 {} bars  ({} → {})",
                bars.len(),
                minute(first),
                minute(last)
            );
            println!(
                "   Last: O {}  H {}  L {}  C {}  V {}",
                fmt_num(Some(last.open)),
                fmt_num(Some(last.high)),
                fmt_num(Some(last.low)),
                fmt_num(Some(last.close)),
                fmt_num(Some(last.volume))
            );
        }
        _ => println!("📈 No bars in this window"),
    }

    if let Some(line) = shown.chart.as_ref().and_then(|c| c.reference_line.as_ref()) {
        println!("   {}", line.label);
    }
    println!("\n💡 Use --json for the full chart description");
}
