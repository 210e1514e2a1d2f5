/// Chart presentation mode
///
/// Line series for the freshest intraday view, candlesticks otherwise.
use serde::{Deserialize, Serialize};

use super::{Range, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    /// Close-only line
    Line,

    /// OHLC candlesticks
    #[serde(alias = "candlestick")]
    Candle,
}

impl Default for ChartMode {
    fn default() -> Self {
        ChartMode::Line
    }
}

impl ChartMode {
    /// Mode derived from the presentation window when no manual choice is locked in
    pub fn derive(timeframe: Timeframe, range: Range) -> Self {
        if timeframe.is_finest() && range.is_shortest() {
            ChartMode::Line
        } else {
            ChartMode::Candle
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ChartMode::Line => ChartMode::Candle,
            ChartMode::Candle => ChartMode::Line,
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "line" => Ok(ChartMode::Line),
            "candle" | "candlestick" => Ok(ChartMode::Candle),
            _ => Err(format!("Invalid chart mode: '{}'. Valid values: line, candle", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartMode::Line => "line",
            ChartMode::Candle => "candle",
        }
    }
}

/// Y-axis of the compare overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YAxis {
    /// Absolute close prices
    Price,
    /// Percent change against each instrument's own first bar
    Percentage,
}

impl Default for YAxis {
    fn default() -> Self {
        YAxis::Price
    }
}
