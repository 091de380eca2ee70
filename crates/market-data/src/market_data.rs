//! Spot price feeds for the underlying index.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use theta_core::{FetchError, YahooConfig};
use tracing::{debug, warn};

use crate::client::{transport_error, GatewayClient};
use crate::types::positive_price;

/// Anything that can report the current spot of an underlying.
#[async_trait]
pub trait SpotFeed: Send + Sync {
    async fn spot(&self, underlying: &str) -> Result<Decimal, FetchError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct GatewaySpot {
    price: Decimal,
}

#[async_trait]
impl SpotFeed for GatewayClient {
    async fn spot(&self, underlying: &str) -> Result<Decimal, FetchError> {
        let path = format!("/spot/{}", urlencoding::encode(underlying));
        let body: GatewaySpot = self.get(&path, &[]).await?;
        positive_price("gateway", body.price)
    }

    fn name(&self) -> &str {
        "gateway"
    }
}

/// Last traded price from the Yahoo chart endpoint (one-minute bars).
pub struct YahooSpotFeed {
    http: Client,
    base_url: String,
    symbol: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

impl YahooSpotFeed {
    pub fn new(config: &YahooConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) theta/0.1")
            .build()
            .context("Failed to build Yahoo HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            symbol: config.symbol.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl SpotFeed for YahooSpotFeed {
    /// The underlying name is ignored; Yahoo is keyed by its own symbol.
    async fn spot(&self, _underlying: &str) -> Result<Decimal, FetchError> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(&self.symbol)
        );
        debug!(url = %url, "GET");

        let response = self
            .http
            .get(&url)
            .query(&[("interval", "1m"), ("range", "1d")])
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(FetchError::unavailable(format!(
                "yahoo {} for {}",
                response.status(),
                self.symbol
            )));
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| FetchError::bad_quote(format!("undecodable yahoo body: {e}")))?;

        let price = body
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .and_then(|r| r.meta.regular_market_price)
            .ok_or_else(|| FetchError::bad_quote(format!("no price in yahoo chart for {}", self.symbol)))?;

        let price = Decimal::try_from(price)
            .map_err(|e| FetchError::bad_quote(format!("yahoo price {price}: {e}")))?
            .round_dp(2);
        positive_price("yahoo", price)
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

/// Tries each feed in order; the first positive price wins.
pub struct FallbackSpotFeed {
    feeds: Vec<Arc<dyn SpotFeed>>,
}

impl FallbackSpotFeed {
    pub fn new(feeds: Vec<Arc<dyn SpotFeed>>) -> Self {
        Self { feeds }
    }
}

#[async_trait]
impl SpotFeed for FallbackSpotFeed {
    async fn spot(&self, underlying: &str) -> Result<Decimal, FetchError> {
        let mut last_error = FetchError::unavailable("no spot feeds configured");
        for feed in &self.feeds {
            match feed.spot(underlying).await {
                Ok(price) => return Ok(price),
                Err(e) => {
                    warn!(feed = feed.name(), underlying, error = %e, "Spot feed failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
