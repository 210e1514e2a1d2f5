use serde::{Deserialize, Serialize};

/// Live summary metrics for one instrument
///
/// Every field is optional: the service omits what it could not compute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Summary {
    pub price: Option<f64>,
    pub pct_change: Option<f64>,
    pub previous_close: Option<f64>,

    // 52-week style extremes
    #[serde(rename = "high6m")]
    pub high_6m: Option<f64>,
    #[serde(rename = "high1y")]
    pub high_1y: Option<f64>,
    #[serde(rename = "high2y")]
    pub high_2y: Option<f64>,
    #[serde(rename = "low6m")]
    pub low_6m: Option<f64>,
    #[serde(rename = "low1y")]
    pub low_1y: Option<f64>,
    #[serde(rename = "low2y")]
    pub low_2y: Option<f64>,

    /// Current price as a percentage of the 6-month high
    #[serde(rename = "pctOfHigh6m")]
    pub pct_of_high_6m: Option<f64>,
    #[serde(rename = "pctOfHigh1y")]
    pub pct_of_high_1y: Option<f64>,

    /// Rate of change over the latest intraday bars
    pub intraday_speed: Option<f64>,
}

impl Summary {
    /// Service value, or price/high when the service left it out
    pub fn pct_of_high_6m(&self) -> Option<f64> {
        self.pct_of_high_6m.or_else(|| ratio_pct(self.price, self.high_6m))
    }

    pub fn pct_of_high_1y(&self) -> Option<f64> {
        self.pct_of_high_1y.or_else(|| ratio_pct(self.price, self.high_1y))
    }

    /// Reference price for the chart's horizontal line
    pub fn reference_price(&self) -> Option<f64> {
        self.previous_close.filter(|p| p.is_finite())
    }
}

fn ratio_pct(price: Option<f64>, high: Option<f64>) -> Option<f64> {
    let (p, h) = (price?, high?);
    if !p.is_finite() || !h.is_finite() || h == 0.0 {
        return None;
    }
    Some(p / h * 100.0)
}
