use crate::error::{Error, Result};
use crate::models::{Candidate, KlineRequest, KlineResponse, Range, SearchResponse, Summary};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info};

/// Read-only market data service
///
/// Implementations must be `Send + Sync`; calls are issued from spawned
/// poll and search tasks.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Raw (unranked) candidates for a normalized query
    async fn search(&self, query: &str) -> Result<Vec<Candidate>>;

    async fn summary(&self, symbol: &str) -> Result<Summary>;

    async fn kline(&self, request: &KlineRequest) -> Result<KlineResponse>;
}

/// HTTP client for the `/api/search`, `/api/summary` and `/api/kline` endpoints
pub struct HttpDataService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDataService {
    /// Create a new API client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the data service (e.g., "http://127.0.0.1:8000")
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url = %base_url, timeout_secs = timeout.as_secs(), "Created HttpDataService");

        Ok(Self { base_url, client })
    }

    /// GET `{base}{path}` with non-empty query parameters and decode the JSON body
    async fn get_json<T>(&self, path: &str, params: &[(&str, String)]) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let query: Vec<(&str, &str)> = params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (*k, v.as_str()))
            .collect();

        debug!(url = %url, params = ?query, "Sending request");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                let error_msg = format!("API request failed: {} (url: {})", e, url);
                error!("{}", error_msg);
                Error::Network(error_msg)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(Error::Network(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("Failed to parse JSON response from {}: {}", path, e)))
    }
}

/// Query parameters for a kline request: named span, or custom epoch bounds
pub fn kline_params(request: &KlineRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", request.symbol.clone()),
        ("tf", request.timeframe.as_str().to_string()),
    ];
    match request.range {
        Range::Custom { start, end } => {
            params.push(("start", start.to_string()));
            params.push(("end", end.to_string()));
        }
        named => params.push(("range", named.to_string())),
    }
    params
}

#[async_trait]
impl DataService for HttpDataService {
    async fn search(&self, query: &str) -> Result<Vec<Candidate>> {
        let response: SearchResponse = self
            .get_json("/api/search", &[("q", query.to_string())])
            .await?;
        Ok(response.items)
    }

    async fn summary(&self, symbol: &str) -> Result<Summary> {
        self.get_json("/api/summary", &[("symbol", symbol.to_string())])
            .await
    }

    async fn kline(&self, request: &KlineRequest) -> Result<KlineResponse> {
        self.get_json("/api/kline", &kline_params(request)).await
    }
}
