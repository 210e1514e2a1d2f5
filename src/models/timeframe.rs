use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar granularity accepted by the kline endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1-minute candles
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "2m")]
    Minute2,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "60m")]
    Minute60,
    #[serde(rename = "90m")]
    Minute90,
    /// Daily candles
    #[serde(rename = "1d")]
    Day1,
    /// Weekly candles
    #[serde(rename = "1wk")]
    Week1,
    /// Monthly candles
    #[serde(rename = "1mo")]
    Month1,
}

impl Timeframe {
    /// Wire representation used in query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute2 => "2m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Minute60 => "60m",
            Timeframe::Minute90 => "90m",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1wk",
            Timeframe::Month1 => "1mo",
        }
    }

    /// Parse from string (case-sensitive, `1m` is not `1M`)
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim() {
            "1m" => Ok(Timeframe::Minute1),
            "2m" => Ok(Timeframe::Minute2),
            "5m" => Ok(Timeframe::Minute5),
            "15m" => Ok(Timeframe::Minute15),
            "30m" => Ok(Timeframe::Minute30),
            "60m" | "1h" => Ok(Timeframe::Minute60),
            "90m" => Ok(Timeframe::Minute90),
            "1d" => Ok(Timeframe::Day1),
            "1wk" | "1w" => Ok(Timeframe::Week1),
            "1mo" => Ok(Timeframe::Month1),
            _ => Err(format!(
                "Invalid timeframe: '{}'. Valid options: 1m, 2m, 5m, 15m, 30m, 60m, 90m, 1d, 1wk, 1mo",
                s
            )),
        }
    }

    /// The finest granularity; the only one that is live-polled
    pub fn finest() -> Self {
        Timeframe::Minute1
    }

    pub fn is_finest(&self) -> bool {
        *self == Self::finest()
    }

    /// Sub-daily bars
    pub fn is_intraday(&self) -> bool {
        !matches!(self, Timeframe::Day1 | Timeframe::Week1 | Timeframe::Month1)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::finest()
    }
}

/// Span of history requested from the kline endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Range {
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "5d")]
    Day5,
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
    #[serde(rename = "6mo")]
    Month6,
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "2y")]
    Year2,
    #[serde(rename = "5y")]
    Year5,
    #[serde(rename = "max")]
    Max,
    /// Explicit bounds in epoch seconds
    Custom { start: i64, end: i64 },
}

impl Range {
    /// Named span for the query string, `None` for custom bounds
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Range::Day1 => Some("1d"),
            Range::Day5 => Some("5d"),
            Range::Month1 => Some("1mo"),
            Range::Month3 => Some("3mo"),
            Range::Month6 => Some("6mo"),
            Range::Year1 => Some("1y"),
            Range::Year2 => Some("2y"),
            Range::Year5 => Some("5y"),
            Range::Max => Some("max"),
            Range::Custom { .. } => None,
        }
    }

    /// Parse a named span, or `start..end` epoch seconds for custom bounds
    pub fn from_str(s: &str) -> Result<Self, String> {
        let s = s.trim();
        match s {
            "1d" => Ok(Range::Day1),
            "5d" => Ok(Range::Day5),
            "1mo" => Ok(Range::Month1),
            "3mo" => Ok(Range::Month3),
            "6mo" => Ok(Range::Month6),
            "1y" => Ok(Range::Year1),
            "2y" => Ok(Range::Year2),
            "5y" => Ok(Range::Year5),
            "max" => Ok(Range::Max),
            _ => {
                let (start, end) = s
                    .split_once("..")
                    .ok_or_else(|| format!("Invalid range: '{}'. Valid options: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, max, <start>..<end>", s))?;
                let start = start
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| format!("Invalid range start '{}': {}", start, e))?;
                let end = end
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| format!("Invalid range end '{}': {}", end, e))?;
                Range::custom(start, end)
            }
        }
    }

    /// Custom bounds; `start` must precede `end`
    pub fn custom(start: i64, end: i64) -> Result<Self, String> {
        if start >= end {
            return Err(format!("Invalid custom range: start {} is not before end {}", start, end));
        }
        Ok(Range::Custom { start, end })
    }

    /// The shortest window; paired with the finest timeframe by default
    pub fn shortest() -> Self {
        Range::Day1
    }

    pub fn is_shortest(&self) -> bool {
        *self == Self::shortest()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Range::Custom { start, end } => write!(f, "{}..{}", start, end),
            named => write!(f, "{}", named.as_str().unwrap_or_default()),
        }
    }
}

impl Default for Range {
    fn default() -> Self {
        Range::shortest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_defaults_to_finest() {
        assert_eq!(Timeframe::default(), Timeframe::Minute1);
        assert!(Timeframe::Minute1.is_finest());
        assert!(!Timeframe::Minute5.is_finest());
    }

    #[test]
    fn test_timeframe_from_str() {
        assert_eq!(Timeframe::from_str("1m").unwrap(), Timeframe::Minute1);
        assert_eq!(Timeframe::from_str("1wk").unwrap(), Timeframe::Week1);
        assert_eq!(Timeframe::from_str("1mo").unwrap(), Timeframe::Month1);
        assert!(Timeframe::from_str("1M").is_err());
    }

    #[test]
    fn test_timeframe_intraday() {
        assert!(Timeframe::Minute90.is_intraday());
        assert!(!Timeframe::Day1.is_intraday());
        assert!(!Timeframe::Month1.is_intraday());
    }

    #[test]
    fn test_timeframe_serialize() {
        assert_eq!(serde_json::to_string(&Timeframe::Week1).unwrap(), r#""1wk""#);
        let tf: Timeframe = serde_json::from_str(r#""1d""#).unwrap();
        assert_eq!(tf, Timeframe::Day1);
    }

    #[test]
    fn test_range_from_str() {
        assert_eq!(Range::from_str("6mo").unwrap(), Range::Month6);
        assert_eq!(
            Range::from_str("1700000000..1700086400").unwrap(),
            Range::Custom { start: 1_700_000_000, end: 1_700_086_400 }
        );
        assert!(Range::from_str("1700086400..1700000000").is_err());
        assert!(Range::from_str("3 months").is_err());
    }

    #[test]
    fn test_range_roundtrip_serde() {
        let named = serde_json::to_string(&Range::Year1).unwrap();
        assert_eq!(named, r#""1y""#);

        let custom: Range = serde_json::from_str(r#"{"custom":{"start":1,"end":2}}"#).unwrap();
        assert_eq!(custom, Range::Custom { start: 1, end: 2 });
    }

    #[test]
    fn test_range_display() {
        assert_eq!(Range::Day5.to_string(), "5d");
        assert_eq!(Range::Custom { start: 10, end: 20 }.to_string(), "10..20");
    }
}
