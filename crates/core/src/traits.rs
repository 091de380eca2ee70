use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::contract::OptionsContract;
use crate::error::FetchError;
use crate::events::AlertEvent;

/// Supplies underlying spot and option premiums.
///
/// Implementations may fail or hang; callers bound every call with a timeout
/// and treat failures as "try again next poll".
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn spot(&self, underlying: &str) -> Result<Decimal, FetchError>;

    /// Premium for `contract` as of `as_of`. Live feeds quote the current
    /// market; modelled feeds price at `as_of`.
    async fn premium(&self, contract: &OptionsContract, as_of: DateTime<Utc>) -> Result<Decimal, FetchError>;

    fn name(&self) -> &str;
}

/// Delivers human-readable alerts somewhere a person will see them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, event: &AlertEvent) -> Result<(), FetchError>;

    fn name(&self) -> &str;
}
