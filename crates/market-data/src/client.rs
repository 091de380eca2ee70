//! Broker gateway HTTP client.
//!
//! The gateway is a small REST bridge in front of the broker session
//! (login, token refresh and instrument lookup live there, not here).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use theta_core::{FetchError, GatewayConfig};
use tracing::{debug, info};

/// Wrapper around a `reqwest::Client` pointed at the gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl GatewayClient {
    /// Builds a client whose every request is bounded by `timeout`.
    pub fn new(config: &GatewayConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build gateway HTTP client")?;

        info!(base_url = %config.base_url, "Gateway client ready");
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with query parameters and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(query);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::unavailable(format!("gateway {status}: {text}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::bad_quote(format!("undecodable gateway body: {e}")))
    }
}

/// Maps a reqwest failure onto the transient fetch taxonomy.
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::unavailable(err.to_string())
    }
}
