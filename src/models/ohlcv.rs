use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One kline bar
///
/// On the wire a bar is the six-element array
/// `[timestamp_ms, open, close, low, high, volume]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    /// Bar open time, epoch milliseconds
    pub timestamp_ms: i64,

    pub open: f64,
    pub close: f64,
    pub low: f64,
    pub high: f64,

    /// Trading volume (0 when the service had none)
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp_ms: i64, open: f64, close: f64, low: f64, high: f64, volume: f64) -> Self {
        Self {
            timestamp_ms,
            open,
            close,
            low,
            high,
            volume,
        }
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }

    /// `[open, close, low, high]`, the candlestick tuple order
    pub fn ohlc(&self) -> [f64; 4] {
        [self.open, self.close, self.low, self.high]
    }

    /// Build from a raw wire row; rows with a missing timestamp or price are rejected
    fn from_row(row: &[Option<f64>]) -> Option<Self> {
        let get = |i: usize| row.get(i).copied().flatten().filter(|v| v.is_finite());
        Some(Self {
            timestamp_ms: get(0)? as i64,
            open: get(1)?,
            close: get(2)?,
            low: get(3)?,
            high: get(4)?,
            volume: get(5).unwrap_or(0.0),
        })
    }
}

/// Response body of the kline endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KlineResponse {
    #[serde(default, deserialize_with = "deserialize_bars")]
    pub bars: Vec<Bar>,
}

fn deserialize_bars<'de, D>(deserializer: D) -> Result<Vec<Bar>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows: Option<Vec<Vec<Option<f64>>>> = Option::deserialize(deserializer)?;
    let rows = rows.unwrap_or_default();
    let total = rows.len();
    let bars: Vec<Bar> = rows.iter().filter_map(|row| Bar::from_row(row)).collect();
    if bars.len() != total {
        tracing::debug!(dropped = total - bars.len(), "Dropped incomplete kline rows");
    }
    Ok(bars)
}
