//! Bars to declarative chart series
//!
//! Nothing here draws; the output serializes to JSON for whatever renders it.

use crate::constants::REFERENCE_LINE_LABEL;
use crate::models::{Bar, ChartMode, Timeframe, YAxis};
use crate::utils::fmt_num;
use serde::Serialize;
use std::sync::Arc;

/// Price series in the shape the chart mode asks for
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PriceSeries {
    /// Close per bar
    Line(Vec<f64>),
    /// `[open, close, low, high]` per bar
    Candlestick(Vec<[f64; 4]>),
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        match self {
            PriceSeries::Line(v) => v.len(),
            PriceSeries::Candlestick(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Horizontal annotation, e.g. the previous close
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub price: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    /// `YYYY-MM-DD HH:MM` (UTC) per bar
    pub categories: Vec<String>,
    pub price: PriceSeries,
    pub volume: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_line: Option<ReferenceLine>,
}

pub fn build_chart(bars: &[Bar], mode: ChartMode, reference_price: Option<f64>) -> ChartSeries {
    let categories = bars
        .iter()
        .map(|b| {
            b.time()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default()
        })
        .collect();

    let price = match mode {
        ChartMode::Line => PriceSeries::Line(bars.iter().map(|b| b.close).collect()),
        ChartMode::Candle => PriceSeries::Candlestick(bars.iter().map(Bar::ohlc).collect()),
    };

    let reference_line = reference_price
        .filter(|p| p.is_finite())
        .map(|price| ReferenceLine {
            price,
            label: format!("{} {}", REFERENCE_LINE_LABEL, fmt_num(Some(price))),
        });

    ChartSeries {
        categories,
        price,
        volume: bars.iter().map(|b| b.volume).collect(),
        reference_line,
    }
}

/// Which price of the first bar a rebased series is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RebaseBasis {
    FirstOpen,
    FirstClose,
}

impl RebaseBasis {
    /// Intraday series start from the session open, daily ones from the first close
    pub fn for_timeframe(timeframe: Timeframe) -> Self {
        if timeframe.is_intraday() {
            RebaseBasis::FirstOpen
        } else {
            RebaseBasis::FirstClose
        }
    }
}

/// Percent change of every close against the first bar's basis price
///
/// A zero or non-finite basis yields a flat zero series.
pub fn rebase(bars: &[Bar], basis: RebaseBasis) -> Vec<f64> {
    let Some(first) = bars.first() else {
        return Vec::new();
    };
    let reference = match basis {
        RebaseBasis::FirstOpen => first.open,
        RebaseBasis::FirstClose => first.close,
    };
    if reference == 0.0 || !reference.is_finite() {
        return vec![0.0; bars.len()];
    }
    bars.iter()
        .map(|b| (b.close - reference) / reference * 100.0)
        .collect()
}

/// One instrument's bars in a multi-instrument view
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentBars {
    pub symbol: String,
    pub bars: Arc<Vec<Bar>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareLine {
    pub symbol: String,
    /// `(timestamp_ms, value)`
    pub points: Vec<(i64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareChart {
    pub y_axis: YAxis,
    pub lines: Vec<CompareLine>,
}

/// Overlay of several instruments, each rebased on its own first bar in
/// percentage mode
pub fn build_compare_chart(instruments: &[InstrumentBars], axis: YAxis, basis: RebaseBasis) -> CompareChart {
    let lines = instruments
        .iter()
        .map(|inst| {
            let values = match axis {
                YAxis::Price => inst.bars.iter().map(|b| b.close).collect(),
                YAxis::Percentage => rebase(&inst.bars, basis),
            };
            CompareLine {
                symbol: inst.symbol.clone(),
                points: inst
                    .bars
                    .iter()
                    .zip(values)
                    .map(|(b, v)| (b.timestamp_ms, v))
                    .collect(),
            }
        })
        .collect();

    CompareChart { y_axis: axis, lines }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateOrder {
    /// Instrument order as given
    #[default]
    Input,
    /// Best performer first
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRate {
    pub symbol: String,
    /// Fraction, clamped to `[-1, 1]`
    pub rate: f64,
}

/// Change from the first bar's open to the close at `cursor` (last bar when
/// `None`, clamped to the series); instruments without bars rate zero
pub fn performance_rates(instruments: &[InstrumentBars], cursor: Option<usize>, order: RateOrder) -> Vec<PerformanceRate> {
    let mut rates: Vec<PerformanceRate> = instruments
        .iter()
        .map(|inst| PerformanceRate {
            symbol: inst.symbol.clone(),
            rate: rate_at(&inst.bars, cursor),
        })
        .collect();

    if order == RateOrder::Descending {
        rates.sort_by(|a, b| b.rate.total_cmp(&a.rate));
    }
    rates
}

fn rate_at(bars: &[Bar], cursor: Option<usize>) -> f64 {
    let (Some(first), Some(last_index)) = (bars.first(), bars.len().checked_sub(1)) else {
        return 0.0;
    };
    let current = bars[cursor.unwrap_or(last_index).min(last_index)].close;
    if first.open == 0.0 || !first.open.is_finite() {
        return 0.0;
    }
    let rate = (current - first.open) / first.open;
    if rate.is_finite() {
        rate.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
