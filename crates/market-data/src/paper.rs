//! Paper-mode premium model.
//!
//! Estimates a 0DTE option premium from how far the strike sits from spot
//! and how much of the session is left. Used when no option chain feed is
//! wired up; spot itself is still live.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use theta_core::{FetchError, OptionsContract, PremiumModelConfig};
use tracing::debug;

use crate::market_data::SpotFeed;
use crate::options_chain::PremiumFeed;

/// Smallest hours-to-close the model will use, so decay never hits zero.
const MIN_HOURS_TO_CLOSE: Decimal = dec!(0.0001);

#[derive(Debug, Clone)]
pub struct PremiumModel {
    config: PremiumModelConfig,
}

impl PremiumModel {
    pub fn new(config: PremiumModelConfig) -> Self {
        Self { config }
    }

    /// Premium estimate, rounded to two decimals and never below the floor.
    pub fn estimate(&self, spot: Decimal, strike: Decimal, hours_to_close: Decimal) -> Decimal {
        if spot <= Decimal::ZERO {
            return self.config.floor;
        }

        let distance_pct = (spot - strike).abs() / spot * Decimal::ONE_HUNDRED;
        let time_factor = (hours_to_close / self.config.full_value_hours).min(Decimal::ONE);
        let base_pct = self
            .config
            .tiers
            .iter()
            .find(|tier| distance_pct < tier.max_distance_pct)
            .map_or(self.config.tail_pct, |tier| tier.base_pct);

        (spot * base_pct / Decimal::ONE_HUNDRED * time_factor)
            .max(self.config.floor)
            .round_dp(2)
    }

    /// Hours between `now` and the session close, floored at a tiny positive value.
    pub fn hours_to_close(&self, now: NaiveTime) -> Decimal {
        let minutes = (self.config.session_close - now).num_minutes();
        (Decimal::from(minutes) / dec!(60)).max(MIN_HOURS_TO_CLOSE)
    }
}

/// [`PremiumFeed`] backed by [`PremiumModel`] and a live spot feed.
pub struct ModelPremiumFeed {
    model: PremiumModel,
    spot: Arc<dyn SpotFeed>,
    tz: Tz,
}

impl ModelPremiumFeed {
    pub fn new(model: PremiumModel, spot: Arc<dyn SpotFeed>, tz: Tz) -> Self {
        Self { model, spot, tz }
    }
}

#[async_trait]
impl PremiumFeed for ModelPremiumFeed {
    async fn premium(&self, contract: &OptionsContract, as_of: DateTime<Utc>) -> Result<Decimal, FetchError> {
        let spot = self.spot.spot(&contract.underlying).await?;
        let hours = self.model.hours_to_close(as_of.with_timezone(&self.tz).time());
        let premium = self.model.estimate(spot, contract.strike, hours);

        debug!(
            contract = %contract.display_name(),
            spot = %spot,
            hours_to_close = %hours,
            premium = %premium,
            "Model premium"
        );
        Ok(premium)
    }

    fn name(&self) -> &str {
        "model"
    }
}
