use super::{block_on, fail, print_json};
use crate::error::{AppError, Result};
use crate::models::{Range, Tab, YAxis};
use crate::services::chart::{CompareChart, PerformanceRate, RateOrder};
use crate::utils::{fmt_num, fmt_pct};
use crate::views::{save_tab, CompareKind, CompareView, DEFAULT_DAILY_RANGE};

pub struct CompareArgs {
    pub queries: Vec<String>,
    pub daily: bool,
    pub range: Option<Range>,
    pub percent: bool,
    pub by_rate: bool,
    pub with_watchlist: bool,
    pub remove: Vec<String>,
    pub json: bool,
}

struct Compared {
    kind: CompareKind,
    range: Range,
    chart: CompareChart,
    rates: Vec<PerformanceRate>,
    errors: Vec<(String, String)>,
    last_prices: Vec<(String, Option<f64>)>,
}

pub fn run(args: CompareArgs) {
    let json = args.json;
    let compared = match block_on(|ctx| async move {
        save_tab(&ctx.store, Tab::Compare);
        let mut view = CompareView::new(&ctx);
        configure(&mut view, &args).await?;

        if view.instruments().is_empty() {
            return Ok(None);
        }

        let failed = view.load().await;
        if failed == view.instruments().len() {
            return Err(AppError::Network(format!("All {} instruments failed to load", failed)));
        }

        let order = if args.by_rate { RateOrder::Descending } else { RateOrder::Input };
        let mut errors: Vec<_> = view.errors().iter().map(|(s, e)| (s.clone(), e.clone())).collect();
        errors.sort();
        Ok::<_, AppError>(Some(Compared {
            kind: view.kind(),
            range: view.range(),
            chart: view.chart(),
            rates: view.rates(None, order),
            last_prices: view
                .instruments()
                .iter()
                .map(|c| (c.symbol.clone(), view.summary(&c.symbol).and_then(|s| s.price)))
                .collect(),
            errors,
        }))
    }) {
        Ok(Some(compared)) => compared,
        Ok(None) => {
            println!("⚠️  Nothing to compare. Pass one or more queries or --with-watchlist.");
            return;
        }
        Err(e) => fail("Compare failed", e),
    };

    if json {
        if let Err(e) = print_json(&compared.chart) {
            fail("Rendering chart failed", e);
        }
        return;
    }

    print_table(&compared);
}

async fn configure(view: &mut CompareView, args: &CompareArgs) -> Result<()> {
    for symbol in &args.remove {
        if view.remove(symbol) {
            println!("➖ Removed {}", symbol);
        }
    }

    for query in &args.queries {
        match view.add_best_match(query).await {
            Ok(Some(candidate)) => println!("➕ Added {}", candidate),
            Ok(None) => {}
            Err(AppError::NotFound(msg)) => println!("⚠️  {}", msg),
            Err(e) => return Err(e),
        }
    }

    if args.with_watchlist {
        let added = view.add_watchlist();
        println!("➕ Added {} watchlist instruments", added);
    }

    if args.daily || args.range.is_some() {
        let range = args.range.unwrap_or(match view.kind() {
            CompareKind::Daily => view.range(),
            CompareKind::Minute => DEFAULT_DAILY_RANGE,
        });
        view.set_daily_mode(range);
    } else {
        view.set_minute_mode();
    }

    if args.percent {
        view.set_y_axis(YAxis::Percentage);
    }
    Ok(())
}

fn print_table(compared: &Compared) {
    let window = match compared.kind {
        CompareKind::Minute => "1m bars, last day".to_string(),
        CompareKind::Daily => format!("1d bars, {}", compared.range),
    };
    println!("\n📊 Comparing {} instruments ({})\n", compared.rates.len(), window);

    println!("{:<14} {:>10} {:>10} {:>8}", "SYMBOL", "PRICE", "RETURN", "POINTS");
    for rate in &compared.rates {
        let price = compared
            .last_prices
            .iter()
            .find(|(s, _)| s == &rate.symbol)
            .and_then(|(_, p)| *p);
        let points = compared
            .chart
            .lines
            .iter()
            .find(|l| l.symbol == rate.symbol)
            .map_or(0, |l| l.points.len());
        println!(
            "{:<14} {:>10} {:>10} {:>8}",
            rate.symbol,
            fmt_num(price),
            fmt_pct(Some(rate.rate * 100.0)),
            points
        );
    }

    for (symbol, error) in &compared.errors {
        println!("⚠️  {}: {}", symbol, error);
    }
    println!("\n💡 Use --json for the full overlay description");
}
