//! Intraday stop-loss guard for an open spread.

use rust_decimal::Decimal;
use theta_core::StrategyConfig;

/// Returns the trigger level if the current cost to close has reached
/// `entry_credit × stop_loss_multiplier`. Disabled when no multiplier is set.
pub fn check_stop_loss(
    entry_credit: Decimal,
    cost_to_close: Decimal,
    config: &StrategyConfig,
) -> Option<Decimal> {
    let multiplier = config.stop_loss_multiplier?;
    let trigger = entry_credit * multiplier;

    if cost_to_close >= trigger {
        tracing::warn!(
            entry_credit = %entry_credit,
            cost_to_close = %cost_to_close,
            trigger = %trigger,
            "Stop loss triggered"
        );
        return Some(trigger);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(multiplier: Option<Decimal>) -> StrategyConfig {
        StrategyConfig {
            stop_loss_multiplier: multiplier,
            ..StrategyConfig::default()
        }
    }

    #[test]
    fn disabled_without_multiplier() {
        assert_eq!(check_stop_loss(dec!(8), dec!(49), &config(None)), None);
    }

    #[test]
    fn triggers_at_multiple_of_credit() {
        let config = config(Some(dec!(2)));
        assert_eq!(check_stop_loss(dec!(8), dec!(15.99), &config), None);
        assert_eq!(check_stop_loss(dec!(8), dec!(16), &config), Some(dec!(16)));
        assert_eq!(check_stop_loss(dec!(8), dec!(30), &config), Some(dec!(16)));
    }
}
