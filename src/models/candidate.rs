use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::ranking::{HOME_MARKET, HOME_SYMBOL_SUFFIX};

/// An instrument returned by the search endpoint
///
/// Identity is `symbol`. The data service has shipped several field
/// spellings over time, all of which are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub symbol: String,
    #[serde(default, alias = "name")]
    pub display_name: String,
    #[serde(default, alias = "cn_name", skip_serializing_if = "Option::is_none")]
    pub localized_name: Option<String>,
    #[serde(default, alias = "stock_code")]
    pub listing_code: String,
    #[serde(default, alias = "market")]
    pub market_code: String,
}

impl Candidate {
    pub fn new(symbol: &str, display_name: &str, listing_code: &str, market_code: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            display_name: display_name.to_string(),
            localized_name: None,
            listing_code: listing_code.to_string(),
            market_code: market_code.to_string(),
        }
    }

    /// Name shown to the user: localized when present, display name, then symbol
    pub fn label(&self) -> &str {
        self.localized_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(Some(self.display_name.as_str()).filter(|s| !s.is_empty()))
            .unwrap_or(&self.symbol)
    }

    /// Whether the instrument trades on the home market
    pub fn is_home_market(&self) -> bool {
        self.market_code.eq_ignore_ascii_case(HOME_MARKET)
            || self.symbol.to_uppercase().ends_with(HOME_SYMBOL_SUFFIX)
    }

    /// Code shown next to the name, e.g. `00700.HK` for home listings
    pub fn display_code(&self) -> String {
        if !self.listing_code.is_empty() && self.is_home_market() {
            format!("{}{}", self.listing_code, HOME_SYMBOL_SUFFIX)
        } else {
            self.symbol.clone()
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.display_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_service_spelling() {
        let json = r#"{"symbol":"0700.HK","cn_name":"腾讯控股","name":"TENCENT","stock_code":"00700","market":"HK"}"#;
        let c: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.symbol, "0700.HK");
        assert_eq!(c.display_name, "TENCENT");
        assert_eq!(c.localized_name.as_deref(), Some("腾讯控股"));
        assert_eq!(c.listing_code, "00700");
        assert_eq!(c.market_code, "HK");
    }

    #[test]
    fn test_deserialize_camel_case_and_missing_fields() {
        let json = r#"{"symbol":"AAPL","displayName":"Apple","marketCode":"US"}"#;
        let c: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.display_name, "Apple");
        assert_eq!(c.listing_code, "");
        assert!(c.localized_name.is_none());
    }

    #[test]
    fn test_home_market_detection() {
        assert!(Candidate::new("9988.HK", "BABA-SW", "09988", "").is_home_market());
        assert!(Candidate::new("X", "X", "1", "hk").is_home_market());
        assert!(!Candidate::new("BABA", "Alibaba", "", "US").is_home_market());
    }

    #[test]
    fn test_display() {
        let mut c = Candidate::new("0700.HK", "TENCENT", "00700", "HK");
        assert_eq!(c.to_string(), "TENCENT (00700.HK)");
        c.localized_name = Some("腾讯控股".to_string());
        assert_eq!(c.label(), "腾讯控股");

        let foreign = Candidate::new("AAPL", "", "", "US");
        assert_eq!(foreign.to_string(), "AAPL (AAPL)");
    }
}
