#![allow(clippy::format_push_string)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use theta_core::{format_amount, format_signed};

use crate::store::PersistedRecord;
use crate::types::PositionStatus;

/// Running paper-trading statistics over every stored day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub underlying: String,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    /// Closed trades.
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub skipped: usize,
    pub open: usize,
    /// Days still OPEN that have been flagged for intervention.
    pub stuck: usize,
    pub total_pnl: Decimal,
    pub best_trade: Option<Decimal>,
    pub worst_trade: Option<Decimal>,
    pub paper_capital: Decimal,
}

impl SessionSummary {
    pub fn from_history(underlying: &str, history: &[PersistedRecord], paper_capital: Decimal) -> Self {
        let mut summary = Self {
            underlying: underlying.to_uppercase(),
            first_day: history.first().map(|p| p.record.date),
            last_day: history.last().map(|p| p.record.date),
            trades: 0,
            wins: 0,
            losses: 0,
            skipped: 0,
            open: 0,
            stuck: 0,
            total_pnl: Decimal::ZERO,
            best_trade: None,
            worst_trade: None,
            paper_capital,
        };

        for persisted in history {
            let record = &persisted.record;
            match record.status {
                PositionStatus::Closed => {
                    let pnl = record.realized_pnl().unwrap_or_default();
                    summary.trades += 1;
                    if pnl > Decimal::ZERO {
                        summary.wins += 1;
                    } else {
                        summary.losses += 1;
                    }
                    summary.total_pnl += pnl;
                    summary.best_trade = Some(summary.best_trade.map_or(pnl, |b| b.max(pnl)));
                    summary.worst_trade = Some(summary.worst_trade.map_or(pnl, |w| w.min(pnl)));
                }
                PositionStatus::Skipped => summary.skipped += 1,
                PositionStatus::Open => {
                    summary.open += 1;
                    if record.needs_intervention {
                        summary.stuck += 1;
                    }
                }
                PositionStatus::NotEntered => {}
            }
        }

        summary
    }

    /// Wins as a percentage of closed trades; zero with no trades.
    pub fn win_rate(&self) -> Decimal {
        if self.trades == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.wins) / Decimal::from(self.trades) * Decimal::ONE_HUNDRED).round_dp(1)
    }

    pub fn capital(&self) -> Decimal {
        self.paper_capital + self.total_pnl
    }

    /// One-line form used in exit alerts.
    pub fn headline(&self) -> String {
        format!(
            "{} trades | {}% win | Total {} | Capital {}",
            self.trades,
            self.win_rate(),
            format_signed(self.total_pnl, 0),
            format_amount(self.capital(), 0)
        )
    }

    pub fn format(&self) -> String {
        let rule = "───────────────────────────────────────────\n";
        let mut output = String::new();

        output.push_str(&format!("{} paper trading summary\n", self.underlying));
        output.push_str(rule);
        match (self.first_day, self.last_day) {
            (Some(first), Some(last)) => {
                output.push_str(&format!("Period:            {first} .. {last}\n"));
            }
            _ => output.push_str("Period:            no recorded days\n"),
        }
        output.push_str(&format!("Trades:            {}\n", self.trades));
        if self.trades > 0 {
            output.push_str(&format!(
                "Wins / Losses:     {} / {}\n",
                self.wins, self.losses
            ));
            output.push_str(&format!("Win Rate:          {}%\n", self.win_rate()));
        } else {
            output.push_str("Win Rate:          N/A (no trades)\n");
        }
        output.push_str(&format!("Skipped Days:      {}\n", self.skipped));
        if self.open > 0 {
            output.push_str(&format!("Open Positions:    {}\n", self.open));
        }
        if self.stuck > 0 {
            output.push_str(&format!("Needs Attention:   {}\n", self.stuck));
        }
        output.push_str(rule);
        output.push_str(&format!("Total P&L:         {}\n", format_signed(self.total_pnl, 0)));
        if let (Some(best), Some(worst)) = (self.best_trade, self.worst_trade) {
            output.push_str(&format!("Best / Worst:      {} / {}\n", format_signed(best, 0), format_signed(worst, 0)));
        }
        output.push_str(&format!("Starting Capital:  {}\n", format_amount(self.paper_capital, 0)));
        output.push_str(&format!("Current Capital:   {}\n", format_amount(self.capital(), 0)));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::spread_pnl;
    use crate::types::{ExitReason, PositionRecord, SpreadEntry, SpreadExit};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use theta_core::StrategyConfig;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn entry(d: u32) -> SpreadEntry {
        SpreadEntry {
            short_strike: dec!(19800),
            long_strike: dec!(19750),
            entry_credit: dec!(8),
            credit_ratio: dec!(0.16),
            entry_spot: dec!(20000),
            entry_time: Utc.with_ymd_and_hms(2026, 10, d, 6, 0, 0).unwrap(),
            quantity: 150,
        }
    }

    fn persisted(record: PositionRecord) -> PersistedRecord {
        PersistedRecord {
            record,
            config: StrategyConfig::default(),
            saved_at: Utc::now(),
        }
    }

    fn closed(d: u32, exit_credit: Decimal) -> PersistedRecord {
        let mut record = PositionRecord::new("NIFTY", day(d));
        record.enter(entry(d)).unwrap();
        record
            .close(SpreadExit {
                exit_credit,
                exit_spot: None,
                exit_time: Utc.with_ymd_and_hms(2026, 10, d, 9, 55, 0).unwrap(),
                reason: ExitReason::EndOfDay,
                realized_pnl: spread_pnl(dec!(8), exit_credit, 150, dec!(50)),
            })
            .unwrap();
        persisted(record)
    }

    fn skipped(d: u32) -> PersistedRecord {
        let mut record = PositionRecord::new("NIFTY", day(d));
        record
            .skip(Utc.with_ymd_and_hms(2026, 10, d, 8, 30, 0).unwrap(), "low credit")
            .unwrap();
        persisted(record)
    }

    #[test]
    fn empty_history() {
        let summary = SessionSummary::from_history("NIFTY", &[], dec!(500000));
        assert_eq!(summary.trades, 0);
        assert_eq!(summary.win_rate(), dec!(0));
        assert_eq!(summary.capital(), dec!(500000));
        assert!(summary.format().contains("N/A (no trades)"));
    }

    #[test]
    fn aggregates_closed_and_skipped_days() {
        let history = vec![
            closed(6, dec!(2)),  // +900
            skipped(13),
            closed(20, dec!(12)), // -600
            closed(27, dec!(0)),  // +1200
        ];
        let summary = SessionSummary::from_history("NIFTY", &history, dec!(500000));

        assert_eq!(summary.trades, 3);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.losses, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total_pnl, dec!(1500));
        assert_eq!(summary.best_trade, Some(dec!(1200)));
        assert_eq!(summary.worst_trade, Some(dec!(-600)));
        assert_eq!(summary.win_rate(), dec!(66.7));
        assert_eq!(summary.capital(), dec!(501500));
        assert_eq!(summary.first_day, Some(day(6)));
        assert_eq!(summary.last_day, Some(day(27)));

        let headline = summary.headline();
        assert!(headline.contains("3 trades"));
        assert!(headline.contains("501,500"));
    }

    #[test]
    fn open_and_stuck_days_are_counted_separately() {
        let mut open = PositionRecord::new("NIFTY", day(20));
        open.enter(entry(20)).unwrap();
        let mut stuck = PositionRecord::new("NIFTY", day(27));
        stuck.enter(entry(27)).unwrap();
        stuck.exit_failures = 3;
        stuck.needs_intervention = true;

        let summary =
            SessionSummary::from_history("NIFTY", &[persisted(open), persisted(stuck)], dec!(500000));
        assert_eq!(summary.open, 2);
        assert_eq!(summary.stuck, 1);
        assert_eq!(summary.trades, 0);
        assert!(summary.format().contains("Needs Attention:   1"));
    }
}
