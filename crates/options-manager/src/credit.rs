//! Credit evaluation and spread P&L.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use theta_core::StrategyConfig;

use crate::error::InvalidInput;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditDecision {
    /// Short premium minus long premium.
    pub credit: Decimal,
    /// `credit / spread_width`.
    pub credit_ratio: Decimal,
    pub approved: bool,
}

/// Decides whether the quoted spread pays enough to open.
///
/// Approved when the credit is positive and its ratio to the spread width
/// is at least `min_credit_ratio`. Negative premiums are an error; callers
/// treat that as "not approved".
pub fn evaluate_credit(
    short_premium: Decimal,
    long_premium: Decimal,
    config: &StrategyConfig,
) -> Result<CreditDecision, InvalidInput> {
    for premium in [short_premium, long_premium] {
        if premium < Decimal::ZERO {
            return Err(InvalidInput::NegativePremium(premium));
        }
    }

    let credit = short_premium - long_premium;
    let credit_ratio = credit / config.spread_width;
    let approved = credit > Decimal::ZERO && credit_ratio >= config.min_credit_ratio;

    Ok(CreditDecision {
        credit,
        credit_ratio,
        approved,
    })
}

/// Realized P&L of a closed spread.
///
/// The cost to close is clamped into `[0, spread_width]`, the range a put
/// spread can actually settle in, so bad quotes cannot produce a loss
/// larger than the spread allows.
pub fn spread_pnl(
    entry_credit: Decimal,
    exit_credit: Decimal,
    quantity: u32,
    spread_width: Decimal,
) -> Decimal {
    let cost_to_close = exit_credit.max(Decimal::ZERO).min(spread_width);
    (entry_credit - cost_to_close) * Decimal::from(quantity)
}

/// Worst case for the position: width minus credit, per unit times quantity.
pub fn max_loss(entry_credit: Decimal, quantity: u32, spread_width: Decimal) -> Decimal {
    (spread_width - entry_credit) * Decimal::from(quantity)
}

/// Best case: the whole credit is kept.
pub fn max_profit(entry_credit: Decimal, quantity: u32) -> Decimal {
    entry_credit * Decimal::from(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> StrategyConfig {
        StrategyConfig::default()
    }

    #[test]
    fn approves_sixteen_percent_credit() {
        let decision = evaluate_credit(dec!(10), dec!(2), &config()).unwrap();
        assert_eq!(decision.credit, dec!(8));
        assert_eq!(decision.credit_ratio, dec!(0.16));
        assert!(decision.approved);
    }

    #[test]
    fn rejects_twelve_percent_credit() {
        let decision = evaluate_credit(dec!(8), dec!(2), &config()).unwrap();
        assert_eq!(decision.credit_ratio, dec!(0.12));
        assert!(!decision.approved);
    }

    #[test]
    fn ratio_exactly_at_minimum_is_approved() {
        let decision = evaluate_credit(dec!(9.5), dec!(2), &config()).unwrap();
        assert_eq!(decision.credit_ratio, dec!(0.15));
        assert!(decision.approved);
    }

    #[test]
    fn zero_or_negative_credit_is_never_approved() {
        let config = StrategyConfig {
            min_credit_ratio: dec!(0.01),
            ..config()
        };
        assert!(!evaluate_credit(dec!(2), dec!(2), &config).unwrap().approved);
        assert!(!evaluate_credit(dec!(1), dec!(3), &config).unwrap().approved);
    }

    #[test]
    fn negative_premium_is_invalid() {
        assert_eq!(
            evaluate_credit(dec!(-1), dec!(2), &config()),
            Err(InvalidInput::NegativePremium(dec!(-1)))
        );
        assert!(evaluate_credit(dec!(10), dec!(-0.5), &config()).is_err());
    }

    #[test]
    fn pnl_is_credit_kept_times_quantity() {
        assert_eq!(spread_pnl(dec!(10), dec!(4), 500, dec!(50)), dec!(3000));
        assert_eq!(spread_pnl(dec!(8), dec!(12), 150, dec!(50)), dec!(-600));
    }

    #[test]
    fn pnl_is_bounded_by_the_spread() {
        // Cost to close cannot exceed the width...
        assert_eq!(spread_pnl(dec!(8), dec!(70), 150, dec!(50)), dec!(-6300));
        assert_eq!(max_loss(dec!(8), 150, dec!(50)), dec!(6300));
        // ...or go below zero.
        assert_eq!(spread_pnl(dec!(8), dec!(-1), 150, dec!(50)), dec!(1200));
        assert_eq!(max_profit(dec!(8), 150), dec!(1200));
    }
}
