//! Error types for the credit-spread engine.
//!
//! Transient data problems never show up here: the engine turns them into
//! no-op outcomes. What remains is what an operator has to look at.

use std::path::PathBuf;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::PositionStatus;

/// A price that cannot be used to make a trading decision.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    #[error("spot price must be positive, got {0}")]
    NonPositiveSpot(Decimal),

    #[error("premium must not be negative, got {0}")]
    NegativePremium(Decimal),
}

/// A status change that the daily lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: PositionStatus,
    pub to: PositionStatus,
}

/// Failures of the durable record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// The file exists but is not a readable record.
    #[error("corrupt record at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The file parsed but its contents break a lifecycle invariant.
    #[error("record at {path} violates invariant: {reason}")]
    Invariant { path: PathBuf, reason: String },

    /// Another invocation moved the record first.
    #[error("record for {date} changed concurrently: expected {expected}, found {found}")]
    Conflict {
        date: NaiveDate,
        expected: PositionStatus,
        found: PositionStatus,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Conditions that end an invocation with operator attention required.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Config(#[from] theta_core::ConfigError),

    #[error(transparent)]
    Input(#[from] InvalidInput),

    /// The mandatory close could not be priced after the allowed attempts.
    #[error("{underlying} {date}: position still OPEN past exit after {failures} failed close attempts")]
    StuckOpenPastExit {
        underlying: String,
        date: NaiveDate,
        failures: u32,
    },
}
