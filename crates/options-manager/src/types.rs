//! The daily position record and its lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::credit::spread_pnl;
use crate::error::TransitionError;

/// Lifecycle of the single trade allowed per trading day.
///
/// `NotEntered -> Open -> Closed` or `NotEntered -> Skipped`. Closed and
/// Skipped are terminal for the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    NotEntered,
    Open,
    Closed,
    Skipped,
}

impl PositionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Skipped)
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEntered => write!(f, "NOT_ENTERED"),
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Why an open spread was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    EndOfDay,
    StopLoss,
    /// Recorded by an operator after closing outside the engine.
    Manual,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndOfDay => write!(f, "end_of_day"),
            Self::StopLoss => write!(f, "stop_loss"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Everything fixed at the moment of entry. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadEntry {
    pub short_strike: Decimal,
    pub long_strike: Decimal,
    /// Net credit per unit: short premium minus long premium.
    pub entry_credit: Decimal,
    pub credit_ratio: Decimal,
    pub entry_spot: Decimal,
    pub entry_time: DateTime<Utc>,
    /// Lots × lot size at entry.
    pub quantity: u32,
}

impl SpreadEntry {
    /// Distance between the strikes, which is also the per-unit loss cap.
    pub fn width(&self) -> Decimal {
        self.short_strike - self.long_strike
    }
}

/// Everything fixed at the moment of exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadExit {
    /// Cost to close per unit as quoted (short minus long).
    pub exit_credit: Decimal,
    pub exit_spot: Option<Decimal>,
    pub exit_time: DateTime<Utc>,
    pub reason: ExitReason,
    pub realized_pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipNote {
    pub skipped_at: DateTime<Utc>,
    pub reason: String,
}

/// The durable state of one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub date: NaiveDate,
    pub underlying: String,
    pub status: PositionStatus,
    #[serde(default)]
    pub entry: Option<SpreadEntry>,
    #[serde(default)]
    pub exit: Option<SpreadExit>,
    #[serde(default)]
    pub skip: Option<SkipNote>,
    /// Failed attempts to price the mandatory close.
    #[serde(default)]
    pub exit_failures: u32,
    /// Set once the close has failed too often; stays set as history.
    #[serde(default)]
    pub needs_intervention: bool,
}

impl PositionRecord {
    /// A fresh record for a day nothing has happened on yet.
    pub fn new(underlying: &str, date: NaiveDate) -> Self {
        Self {
            date,
            underlying: underlying.to_uppercase(),
            status: PositionStatus::NotEntered,
            entry: None,
            exit: None,
            skip: None,
            exit_failures: 0,
            needs_intervention: false,
        }
    }

    pub fn enter(&mut self, entry: SpreadEntry) -> Result<(), TransitionError> {
        self.require(PositionStatus::NotEntered, PositionStatus::Open)?;
        self.entry = Some(entry);
        self.status = PositionStatus::Open;
        Ok(())
    }

    pub fn close(&mut self, exit: SpreadExit) -> Result<(), TransitionError> {
        self.require(PositionStatus::Open, PositionStatus::Closed)?;
        self.exit = Some(exit);
        self.status = PositionStatus::Closed;
        Ok(())
    }

    pub fn skip(&mut self, at: DateTime<Utc>, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.require(PositionStatus::NotEntered, PositionStatus::Skipped)?;
        self.skip = Some(SkipNote {
            skipped_at: at,
            reason: reason.into(),
        });
        self.status = PositionStatus::Skipped;
        Ok(())
    }

    /// Counts one failed close attempt and returns the new total.
    pub fn record_exit_failure(&mut self) -> Result<u32, TransitionError> {
        self.require(PositionStatus::Open, PositionStatus::Open)?;
        self.exit_failures += 1;
        Ok(self.exit_failures)
    }

    pub fn realized_pnl(&self) -> Option<Decimal> {
        self.exit.as_ref().map(|exit| exit.realized_pnl)
    }

    fn require(&self, from: PositionStatus, to: PositionStatus) -> Result<(), TransitionError> {
        if self.status == from {
            Ok(())
        } else {
            Err(TransitionError {
                from: self.status,
                to,
            })
        }
    }

    /// Checks that the record is internally consistent. Returns a
    /// description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        use PositionStatus::*;

        match (self.status, &self.entry, &self.exit, &self.skip) {
            (NotEntered, None, None, None) => {}
            (Open, Some(_), None, None) => {}
            (Closed, Some(_), Some(_), None) => {}
            (Skipped, None, None, Some(_)) => {}
            (status, entry, exit, skip) => {
                return Err(format!(
                    "status {status} with entry={} exit={} skip={}",
                    entry.is_some(),
                    exit.is_some(),
                    skip.is_some()
                ));
            }
        }

        if matches!(self.status, NotEntered | Skipped)
            && (self.exit_failures > 0 || self.needs_intervention)
        {
            return Err(format!("status {} carries exit failure bookkeeping", self.status));
        }

        if let Some(entry) = &self.entry {
            if entry.quantity == 0 {
                return Err("entry quantity is zero".to_string());
            }
            if entry.entry_credit <= Decimal::ZERO {
                return Err(format!("entry credit {} is not positive", entry.entry_credit));
            }
            if entry.width() <= Decimal::ZERO {
                return Err(format!(
                    "long strike {} is not below short strike {}",
                    entry.long_strike, entry.short_strike
                ));
            }
        }

        if let (Some(entry), Some(exit)) = (&self.entry, &self.exit) {
            if exit.exit_time < entry.entry_time {
                return Err("exit time precedes entry time".to_string());
            }
            let expected = spread_pnl(
                entry.entry_credit,
                exit.exit_credit,
                entry.quantity,
                entry.width(),
            );
            if exit.realized_pnl != expected {
                return Err(format!(
                    "realized P&L {} does not match entry/exit credits (expected {})",
                    exit.realized_pnl, expected
                ));
            }
        }

        Ok(())
    }
}
