//! Assembles the configured feeds into one [`MarketDataSource`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use theta_core::{
    FetchError, MarketDataConfig, MarketDataSource, OptionsContract, PremiumSourceKind,
    SpotSourceKind,
};
use tracing::info;

use crate::client::GatewayClient;
use crate::market_data::{FallbackSpotFeed, SpotFeed, YahooSpotFeed};
use crate::options_chain::PremiumFeed;
use crate::paper::{ModelPremiumFeed, PremiumModel};

/// A spot feed paired with a premium feed.
pub struct CompositeSource {
    name: String,
    spot: Arc<dyn SpotFeed>,
    premiums: Arc<dyn PremiumFeed>,
}

impl CompositeSource {
    pub fn new(spot: Arc<dyn SpotFeed>, premiums: Arc<dyn PremiumFeed>) -> Self {
        let name = format!("{}+{}", spot.name(), premiums.name());
        Self {
            name,
            spot,
            premiums,
        }
    }
}

#[async_trait]
impl MarketDataSource for CompositeSource {
    async fn spot(&self, underlying: &str) -> Result<Decimal, FetchError> {
        self.spot.spot(underlying).await
    }

    async fn premium(&self, contract: &OptionsContract, as_of: DateTime<Utc>) -> Result<Decimal, FetchError> {
        self.premiums.premium(contract, as_of).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Builds the source described by `config`.
///
/// `tz` is the exchange time zone, used by the paper premium model to work
/// out how much of the session is left.
pub fn build_source(
    config: &MarketDataConfig,
    tz: Tz,
    timeout: Duration,
) -> Result<Arc<dyn MarketDataSource>> {
    let gateway = match &config.gateway {
        Some(gateway) => Some(Arc::new(GatewayClient::new(gateway, timeout)?)),
        None => None,
    };
    let require_gateway = || {
        gateway
            .clone()
            .ok_or_else(|| anyhow!("market_data.gateway is not configured"))
    };

    let mut feeds: Vec<Arc<dyn SpotFeed>> = Vec::with_capacity(config.spot_sources.len());
    for kind in &config.spot_sources {
        let feed: Arc<dyn SpotFeed> = match kind {
            SpotSourceKind::Gateway => require_gateway()?,
            SpotSourceKind::Yahoo => Arc::new(YahooSpotFeed::new(&config.yahoo, timeout)?),
        };
        feeds.push(feed);
    }
    let spot: Arc<dyn SpotFeed> = Arc::new(FallbackSpotFeed::new(feeds));

    let premiums: Arc<dyn PremiumFeed> = match config.premium_source {
        PremiumSourceKind::Gateway => require_gateway()?,
        PremiumSourceKind::Model => Arc::new(ModelPremiumFeed::new(
            PremiumModel::new(config.model.clone()),
            Arc::clone(&spot),
            tz,
        )),
    };

    let source = CompositeSource::new(spot, premiums);
    info!(source = source.name(), "Market data source ready");
    Ok(Arc::new(source))
}
