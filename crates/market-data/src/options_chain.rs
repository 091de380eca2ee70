//! Option premium quotes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use theta_core::{FetchError, OptionsContract};
use tracing::debug;

use crate::client::GatewayClient;
use crate::types::OptionQuote;

/// Anything that can price a single option contract.
#[async_trait]
pub trait PremiumFeed: Send + Sync {
    async fn premium(&self, contract: &OptionsContract, as_of: DateTime<Utc>) -> Result<Decimal, FetchError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct GatewayOptionQuote {
    #[serde(default)]
    bid: Decimal,
    #[serde(default)]
    ask: Decimal,
    #[serde(default)]
    last: Decimal,
}

impl GatewayClient {
    /// Fetch a single option quote.
    pub async fn option_quote(&self, contract: &OptionsContract) -> Result<OptionQuote, FetchError> {
        debug!(
            underlying = contract.underlying,
            strike = %contract.strike,
            right = %contract.right,
            expiry = %contract.expiry,
            "Fetching option quote"
        );

        let path = format!("/option/{}", urlencoding::encode(&contract.underlying));
        let query = [
            ("strike", contract.strike.normalize().to_string()),
            ("right", contract.right.to_string()),
            ("expiry", contract.expiry.format("%Y-%m-%d").to_string()),
        ];
        let raw: GatewayOptionQuote = self.get(&path, &query).await?;

        Ok(OptionQuote {
            contract: contract.clone(),
            bid: raw.bid,
            ask: raw.ask,
            last: raw.last,
        })
    }
}

#[async_trait]
impl PremiumFeed for GatewayClient {
    /// Always the live quote; the gateway has no historical chain.
    async fn premium(&self, contract: &OptionsContract, _as_of: DateTime<Utc>) -> Result<Decimal, FetchError> {
        self.option_quote(contract).await?.premium()
    }

    fn name(&self) -> &str {
        "gateway"
    }
}
