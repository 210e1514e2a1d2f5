pub mod compare;
pub mod poll;
pub mod search;
pub mod show;
pub mod status;
pub mod tab;
pub mod watch;

use crate::error::{AppError, Result};
use crate::models::{ClientConfig, Summary};
use crate::utils::{fmt_num, fmt_pct};
use crate::views::AppContext;
use std::future::Future;

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Build the app context from the environment and drive `f` to completion
pub(crate) fn block_on<F, Fut, T>(f: F) -> Result<T>
where
    F: FnOnce(AppContext) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| AppError::Other(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let ctx = AppContext::from_config(ClientConfig::from_env())?;
        f(ctx).await
    })
}

/// Print the error and leave with status 1
pub(crate) fn fail(context: &str, e: AppError) -> ! {
    eprintln!("❌ {}: {}", context, e);
    std::process::exit(1);
}

pub(crate) fn print_summary(summary: &Summary) {
    println!(
        "   Price: {:>10}   Change: {:>8}   Prev close: {}",
        fmt_num(summary.price),
        fmt_pct(summary.pct_change),
        fmt_num(summary.previous_close)
    );
    println!(
        "   6M high: {:>8} (at {}%)   1Y high: {:>8} (at {}%)",
        fmt_num(summary.high_6m),
        fmt_num(summary.pct_of_high_6m().map(|p| (p * 10.0).round() / 10.0)),
        fmt_num(summary.high_1y),
        fmt_num(summary.pct_of_high_1y().map(|p| (p * 10.0).round() / 10.0))
    );
    println!(
        "   6M low: {:>9}   1Y low: {:>9}   Speed: {}",
        fmt_num(summary.low_6m),
        fmt_num(summary.low_1y),
        fmt_pct(summary.intraday_speed)
    );
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Parse(format!("Failed to render JSON: {}", e)))?;
    println!("{}", json);
    Ok(())
}
