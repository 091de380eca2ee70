//! Quote types returned by the data sources.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use theta_core::{FetchError, OptionsContract};

/// Option quote snapshot from the broker gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub contract: OptionsContract,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
}

impl OptionQuote {
    /// Mid of a sane two-sided market, otherwise the last traded price.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::BadQuote`] when neither is positive.
    pub fn premium(&self) -> Result<Decimal, FetchError> {
        let two_sided = self.bid > Decimal::ZERO && self.ask > Decimal::ZERO && self.ask >= self.bid;
        if two_sided {
            return Ok((self.bid + self.ask) / Decimal::TWO);
        }
        if self.last > Decimal::ZERO {
            return Ok(self.last);
        }
        Err(FetchError::bad_quote(format!(
            "{} has no usable price (bid {}, ask {}, last {})",
            self.contract.display_name(),
            self.bid,
            self.ask,
            self.last
        )))
    }
}

/// Validates a spot price reported by any source.
pub(crate) fn positive_price(source: &str, price: Decimal) -> Result<Decimal, FetchError> {
    if price > Decimal::ZERO {
        Ok(price)
    } else {
        Err(FetchError::bad_quote(format!("{source} returned non-positive price {price}")))
    }
}
