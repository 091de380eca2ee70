//! Deterministic 0DTE put credit spread, one trade per day.
//!
//! Each invocation of [`StrategyEngine`] loads the day's [`PositionRecord`]
//! from the [`StateStore`], takes at most one lifecycle step, commits it
//! atomically, and then alerts through the [`AlertEmitter`].
//!
//! No discretion in the execution path: strikes, credit threshold and exit
//! time are all fixed by configuration.

pub mod alerts;
pub mod credit;
pub mod engine;
pub mod error;
pub mod notify;
pub mod service;
pub mod stops;
pub mod store;
pub mod strikes;
pub mod summary;
pub mod types;

pub use alerts::AlertEmitter;
pub use credit::{evaluate_credit, spread_pnl, CreditDecision};
pub use engine::{Outcome, StrategyEngine};
pub use error::{EngineError, InvalidInput, StoreError, TransitionError};
pub use notify::{LogSink, TelegramSink};
pub use store::{PersistedRecord, StateStore};
pub use strikes::{round_to_step, select_strikes, SpreadStrikes};
pub use summary::SessionSummary;
pub use types::{ExitReason, PositionRecord, PositionStatus, SkipNote, SpreadEntry, SpreadExit};
