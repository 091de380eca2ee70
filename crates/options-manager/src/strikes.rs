//! Strike selection for the put credit spread.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use theta_core::StrategyConfig;

use crate::error::InvalidInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadStrikes {
    pub short_strike: Decimal,
    pub long_strike: Decimal,
}

/// Rounds `value` to the nearest multiple of `step`, ties to the even multiple.
pub fn round_to_step(value: Decimal, step: Decimal) -> Decimal {
    (value / step).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven) * step
}

/// Short put `otm_pct` below spot, long put one spread width further down.
///
/// Decimal arithmetic throughout, so the same spot always gives the same
/// strikes.
pub fn select_strikes(spot: Decimal, config: &StrategyConfig) -> Result<SpreadStrikes, InvalidInput> {
    if spot <= Decimal::ZERO {
        return Err(InvalidInput::NonPositiveSpot(spot));
    }

    let target = spot * (Decimal::ONE - config.otm_pct / Decimal::ONE_HUNDRED);
    let short_strike = round_to_step(target, config.strike_step()).normalize();
    let long_strike = (short_strike - config.spread_width).normalize();

    Ok(SpreadStrikes {
        short_strike,
        long_strike,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> StrategyConfig {
        StrategyConfig::default()
    }

    #[test]
    fn one_percent_below_twenty_thousand() {
        let strikes = select_strikes(dec!(20000), &config()).unwrap();
        assert_eq!(strikes.short_strike, dec!(19800));
        assert_eq!(strikes.long_strike, dec!(19750));
    }

    #[test]
    fn rounds_to_nearest_step() {
        // 20040 * 0.99 = 19839.6 -> 19850
        let strikes = select_strikes(dec!(20040), &config()).unwrap();
        assert_eq!(strikes.short_strike, dec!(19850));
        // 20010 * 0.99 = 19809.9 -> 19800
        let strikes = select_strikes(dec!(20010), &config()).unwrap();
        assert_eq!(strikes.short_strike, dec!(19800));
    }

    #[test]
    fn ties_go_to_the_even_multiple() {
        assert_eq!(round_to_step(dec!(19825), dec!(50)), dec!(19800));
        assert_eq!(round_to_step(dec!(19875), dec!(50)), dec!(19900));
        assert_eq!(round_to_step(dec!(48050), dec!(100)), dec!(48000));
    }

    #[test]
    fn same_spot_same_strikes() {
        let spot = dec!(19873.35);
        let first = select_strikes(spot, &config()).unwrap();
        for _ in 0..100 {
            assert_eq!(select_strikes(spot, &config()).unwrap(), first);
        }
    }

    #[test]
    fn banknifty_sized_spread() {
        let config = StrategyConfig {
            underlying: "BANKNIFTY".to_string(),
            spread_width: dec!(100),
            ..config()
        };
        let strikes = select_strikes(dec!(48500), &config).unwrap();
        // 48500 * 0.99 = 48015 -> 48000
        assert_eq!(strikes.short_strike, dec!(48000));
        assert_eq!(strikes.long_strike, dec!(47900));
    }

    #[test]
    fn rejects_non_positive_spot() {
        assert_eq!(
            select_strikes(dec!(0), &config()),
            Err(InvalidInput::NonPositiveSpot(dec!(0)))
        );
        assert!(select_strikes(dec!(-5), &config()).is_err());
    }
}
