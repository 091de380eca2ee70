//! Option contract identifiers shared by data sources and the engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Options contract right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// A single listed option on an index underlying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsContract {
    pub underlying: String,
    pub expiry: NaiveDate,
    pub strike: Decimal,
    pub right: OptionRight,
}

impl OptionsContract {
    pub fn new(underlying: &str, expiry: NaiveDate, strike: Decimal, right: OptionRight) -> Self {
        Self {
            underlying: underlying.to_uppercase(),
            expiry,
            strike,
            right,
        }
    }

    /// Human-readable contract description (e.g., "NIFTY 19800P 2026-10-20").
    pub fn display_name(&self) -> String {
        format!("{} {}{} {}", self.underlying, self.strike, self.right, self.expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn display_name_is_compact() {
        let expiry = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let contract = OptionsContract::new("nifty", expiry, dec!(19800), OptionRight::Put);
        assert_eq!(contract.display_name(), "NIFTY 19800P 2026-10-20");
    }
}
