//! The daily credit-spread state machine.
//!
//! [`StrategyEngine::invoke`] is called on a schedule (every few minutes
//! during the session). Each call loads the day's record, takes at most one
//! step through `NOT_ENTERED -> OPEN -> CLOSED` (or `-> SKIPPED`), commits
//! it, and only then alerts. Repeating a call with nothing new to do is a
//! no-op.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use theta_core::{FetchError, MarketDataSource, OptionRight, OptionsContract, StrategyConfig};
use tracing::{debug, error, info, warn};

use crate::alerts::{self, AlertEmitter};
use crate::credit::{evaluate_credit, spread_pnl};
use crate::error::{EngineError, InvalidInput, StoreError, TransitionError};
use crate::stops::check_stop_loss;
use crate::store::StateStore;
use crate::strikes::select_strikes;
use crate::summary::SessionSummary;
use crate::types::{ExitReason, PositionRecord, PositionStatus, SpreadEntry, SpreadExit};

/// What a single invocation did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    NotTradingDay,
    BeforeEntryWindow,
    /// The day is already CLOSED or SKIPPED.
    AlreadyDone(PositionStatus),
    /// A quote could not be fetched; the next poll retries.
    DataUnavailable { reason: String },
    /// A quote arrived but could not be used.
    InvalidQuote { reason: String },
    CreditTooLow { credit: Decimal, credit_ratio: Decimal },
    Entered {
        short_strike: Decimal,
        long_strike: Decimal,
        credit: Decimal,
    },
    /// OPEN and nothing to do before exit time.
    Holding,
    Skipped,
    Closed { reason: ExitReason, realized_pnl: Decimal },
    /// The mandatory close could not be priced yet.
    ExitDeferred { failures: u32 },
    /// Another invocation moved the record first.
    LostRace { found: PositionStatus },
}

impl Outcome {
    /// True when the invocation changed the persisted record.
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            Self::Entered { .. } | Self::Skipped | Self::Closed { .. } | Self::ExitDeferred { .. }
        )
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotTradingDay => write!(f, "not a trading day"),
            Self::BeforeEntryWindow => write!(f, "before entry window"),
            Self::AlreadyDone(status) => write!(f, "day already {status}"),
            Self::DataUnavailable { reason } => write!(f, "market data unavailable: {reason}"),
            Self::InvalidQuote { reason } => write!(f, "unusable quote: {reason}"),
            Self::CreditTooLow {
                credit,
                credit_ratio,
            } => write!(f, "credit {credit} (ratio {credit_ratio}) below minimum"),
            Self::Entered {
                short_strike,
                long_strike,
                credit,
            } => write!(f, "entered {short_strike}/{long_strike} for {credit}"),
            Self::Holding => write!(f, "holding open position"),
            Self::Skipped => write!(f, "day skipped"),
            Self::Closed {
                reason,
                realized_pnl,
            } => write!(f, "closed ({reason}) P&L {realized_pnl}"),
            Self::ExitDeferred { failures } => write!(f, "exit deferred after {failures} failed attempt(s)"),
            Self::LostRace { found } => write!(f, "record already moved to {found} by another run"),
        }
    }
}

enum Commit {
    Done,
    LostRace(PositionStatus),
}

pub struct StrategyEngine {
    config: StrategyConfig,
    tz: Tz,
    store: StateStore,
    market: Arc<dyn MarketDataSource>,
    alerts: AlertEmitter,
    call_timeout: Duration,
}

impl StrategyEngine {
    pub fn new(
        config: StrategyConfig,
        store: StateStore,
        market: Arc<dyn MarketDataSource>,
        alerts: AlertEmitter,
        call_timeout: Duration,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let tz = config.tz()?;
        Ok(Self {
            config,
            tz,
            store,
            market,
            alerts,
            call_timeout,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// The strategy's local trading date at `now`.
    pub fn trading_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// Runs one step of the day's lifecycle at wall-clock time `now`.
    pub async fn invoke(&self, now: DateTime<Utc>) -> Result<Outcome, EngineError> {
        let local = now.with_timezone(&self.tz);
        let date = local.date_naive();
        let time = local.time();

        self.check_previous_session(date).await?;

        if !self.config.is_trading_day(date) {
            debug!(%date, weekday = %date.weekday(), "Not a trading day");
            return Ok(Outcome::NotTradingDay);
        }

        let record = match self.store.load(&self.config.underlying, date) {
            Ok(record) => record,
            Err(e) => return Err(self.store_failure(date, e).await),
        };

        match record.status {
            PositionStatus::NotEntered => self.step_not_entered(record, now, time).await,
            PositionStatus::Open => self.step_open(record, now, time).await,
            status => {
                debug!(%date, %status, "Day already finished");
                Ok(Outcome::AlreadyDone(status))
            }
        }
    }

    /// Closes the OPEN position of `date` at an operator-supplied cost to
    /// close, for a spread the engine could not price itself.
    pub async fn close_manually(
        &self,
        date: NaiveDate,
        exit_credit: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Outcome, EngineError> {
        if exit_credit < Decimal::ZERO {
            return Err(InvalidInput::NegativePremium(exit_credit).into());
        }
        let record = match self.store.load(&self.config.underlying, date) {
            Ok(record) => record,
            Err(e) => return Err(self.store_failure(date, e).await),
        };
        if record.status != PositionStatus::Open {
            return Err(TransitionError {
                from: record.status,
                to: PositionStatus::Closed,
            }
            .into());
        }
        let Some(entry) = record.entry.clone() else {
            let err = StoreError::Invariant {
                path: self.store.path_for(&record.underlying, date),
                reason: "OPEN record without entry".to_string(),
            };
            return Err(self.store_failure(date, err).await);
        };
        self.close(record, &entry, exit_credit, now, ExitReason::Manual)
            .await
    }

    /// Refuses to go on while an earlier day is still OPEN.
    ///
    /// A 0DTE spread left OPEN on a past day was never closed by the engine,
    /// whatever its failure count. It is flagged for intervention once, with
    /// one ERROR alert, and every invocation fails until it is resolved.
    async fn check_previous_session(&self, today: NaiveDate) -> Result<(), EngineError> {
        let previous = match self.store.latest_before(&self.config.underlying, today) {
            Ok(Some(previous)) if previous.record.status == PositionStatus::Open => previous,
            Ok(_) => return Ok(()),
            Err(e) => return Err(self.store_failure(today, e).await),
        };

        let mut record = previous.record;
        if !record.needs_intervention {
            record.needs_intervention = true;
            match self.store.commit(&record, &previous.config, PositionStatus::Open) {
                Ok(_) => {
                    self.alerts
                        .notify(&alerts::stuck_alert(
                            &self.config,
                            &record,
                            "session ended before the position was closed",
                        ))
                        .await;
                }
                Err(StoreError::Conflict { found, .. }) if found != PositionStatus::Open => {
                    return Ok(());
                }
                Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(self.store_failure(record.date, e).await),
            }
        }

        error!(
            underlying = %record.underlying,
            date = %record.date,
            failures = record.exit_failures,
            "Earlier session still OPEN, close it manually"
        );
        Err(EngineError::StuckOpenPastExit {
            underlying: record.underlying,
            date: record.date,
            failures: record.exit_failures,
        })
    }

    async fn step_not_entered(
        &self,
        mut record: PositionRecord,
        now: DateTime<Utc>,
        time: NaiveTime,
    ) -> Result<Outcome, EngineError> {
        if time < self.config.entry_start {
            debug!(%time, entry_start = %self.config.entry_start, "Before entry window");
            return Ok(Outcome::BeforeEntryWindow);
        }

        if time >= self.config.entry_end {
            let reason = format!(
                "No qualifying entry before {}",
                self.config.entry_end.format("%H:%M")
            );
            record.skip(now, reason.clone())?;
            if let Commit::LostRace(found) = self.commit(&record, PositionStatus::NotEntered).await? {
                return Ok(Outcome::LostRace { found });
            }
            info!(date = %record.date, underlying = %record.underlying, "Entry window closed, day skipped");
            self.alerts
                .notify(&alerts::skipped_alert(&self.config, &record, &reason))
                .await;
            return Ok(Outcome::Skipped);
        }

        let spot = match self.fetch(self.market.spot(&self.config.underlying)).await {
            Ok(spot) => spot,
            Err(e) => {
                warn!(error = %e, "Spot unavailable, retrying next poll");
                return Ok(Outcome::DataUnavailable {
                    reason: e.to_string(),
                });
            }
        };

        let strikes = match select_strikes(spot, &self.config) {
            Ok(strikes) => strikes,
            Err(e) => {
                warn!(error = %e, "Unusable spot");
                return Ok(Outcome::InvalidQuote {
                    reason: e.to_string(),
                });
            }
        };

        let (short_premium, long_premium) = match self
            .quote_spread(record.date, strikes.short_strike, strikes.long_strike, now)
            .await
        {
            Ok(premiums) => premiums,
            Err(e) => {
                warn!(error = %e, "Option premiums unavailable, retrying next poll");
                return Ok(Outcome::DataUnavailable {
                    reason: e.to_string(),
                });
            }
        };

        let decision = match evaluate_credit(short_premium, long_premium, &self.config) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Unusable premiums");
                return Ok(Outcome::InvalidQuote {
                    reason: e.to_string(),
                });
            }
        };

        if !decision.approved {
            info!(
                spot = %spot,
                short_strike = %strikes.short_strike,
                credit = %decision.credit,
                credit_ratio = %decision.credit_ratio,
                min_credit_ratio = %self.config.min_credit_ratio,
                "Credit below minimum, waiting"
            );
            return Ok(Outcome::CreditTooLow {
                credit: decision.credit,
                credit_ratio: decision.credit_ratio,
            });
        }

        let entry = SpreadEntry {
            short_strike: strikes.short_strike,
            long_strike: strikes.long_strike,
            entry_credit: decision.credit,
            credit_ratio: decision.credit_ratio,
            entry_spot: spot,
            entry_time: now,
            quantity: self.config.quantity(),
        };
        record.enter(entry.clone())?;
        if let Commit::LostRace(found) = self.commit(&record, PositionStatus::NotEntered).await? {
            return Ok(Outcome::LostRace { found });
        }

        info!(
            underlying = %record.underlying,
            spot = %spot,
            short_strike = %entry.short_strike,
            long_strike = %entry.long_strike,
            credit = %entry.entry_credit,
            quantity = entry.quantity,
            "Entered put credit spread"
        );
        self.alerts
            .notify(&alerts::entry_alert(&self.config, &record, &entry))
            .await;

        Ok(Outcome::Entered {
            short_strike: entry.short_strike,
            long_strike: entry.long_strike,
            credit: entry.entry_credit,
        })
    }

    async fn step_open(
        &self,
        record: PositionRecord,
        now: DateTime<Utc>,
        time: NaiveTime,
    ) -> Result<Outcome, EngineError> {
        let Some(entry) = record.entry.clone() else {
            let err = StoreError::Invariant {
                path: self.store.path_for(&record.underlying, record.date),
                reason: "OPEN record without entry".to_string(),
            };
            return Err(self.store_failure(record.date, err).await);
        };

        if time < self.config.exit_time {
            if self.config.stop_loss_multiplier.is_none() {
                debug!(%time, exit_time = %self.config.exit_time, "Holding until exit time");
                return Ok(Outcome::Holding);
            }
            let cost_to_close = match self.cost_to_close(record.date, &entry, now).await {
                Ok(cost) => cost,
                Err(e) => {
                    debug!(error = %e, "Stop check skipped, no quote");
                    return Ok(Outcome::Holding);
                }
            };
            if check_stop_loss(entry.entry_credit, cost_to_close, &self.config).is_none() {
                debug!(cost_to_close = %cost_to_close, "Holding, stop not reached");
                return Ok(Outcome::Holding);
            }
            return self
                .close(record, &entry, cost_to_close, now, ExitReason::StopLoss)
                .await;
        }

        match self.cost_to_close(record.date, &entry, now).await {
            Ok(cost) => self.close(record, &entry, cost, now, ExitReason::EndOfDay).await,
            Err(e) => self.exit_failed(record, e).await,
        }
    }

    async fn close(
        &self,
        mut record: PositionRecord,
        entry: &SpreadEntry,
        exit_credit: Decimal,
        now: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<Outcome, EngineError> {
        let exit_spot = match reason {
            ExitReason::Manual => None,
            _ => self
                .fetch(self.market.spot(&self.config.underlying))
                .await
                .ok(),
        };
        let realized_pnl = spread_pnl(entry.entry_credit, exit_credit, entry.quantity, entry.width());
        let exit = SpreadExit {
            exit_credit,
            exit_spot,
            exit_time: now,
            reason,
            realized_pnl,
        };

        let recovered = record.needs_intervention;
        record.close(exit.clone())?;
        if let Commit::LostRace(found) = self.commit(&record, PositionStatus::Open).await? {
            return Ok(Outcome::LostRace { found });
        }

        info!(
            underlying = %record.underlying,
            %reason,
            exit_credit = %exit_credit,
            realized_pnl = %realized_pnl,
            recovered,
            "Closed put credit spread"
        );

        let session = match self.store.history(&self.config.underlying) {
            Ok(history) => Some(SessionSummary::from_history(
                &self.config.underlying,
                &history,
                self.config.paper_capital,
            )),
            Err(e) => {
                warn!(error = %e, "Could not compute session stats for exit alert");
                None
            }
        };
        self.alerts
            .notify(&alerts::exit_alert(
                &self.config,
                &record,
                entry,
                &exit,
                session.as_ref(),
            ))
            .await;

        Ok(Outcome::Closed {
            reason,
            realized_pnl,
        })
    }

    async fn exit_failed(&self, mut record: PositionRecord, cause: FetchError) -> Result<Outcome, EngineError> {
        let failures = record.record_exit_failure()?;
        let stuck = failures >= self.config.max_exit_attempts;
        let first_escalation = stuck && !record.needs_intervention;
        if stuck {
            record.needs_intervention = true;
        }

        if let Commit::LostRace(found) = self.commit(&record, PositionStatus::Open).await? {
            return Ok(Outcome::LostRace { found });
        }

        if !stuck {
            warn!(
                failures,
                max_attempts = self.config.max_exit_attempts,
                error = %cause,
                "Exit quote failed, retrying next poll"
            );
            return Ok(Outcome::ExitDeferred { failures });
        }

        error!(
            underlying = %record.underlying,
            date = %record.date,
            failures,
            error = %cause,
            "Position stuck OPEN past exit time"
        );
        if first_escalation {
            self.alerts
                .notify(&alerts::stuck_alert(&self.config, &record, &cause.to_string()))
                .await;
        }
        Err(EngineError::StuckOpenPastExit {
            underlying: record.underlying,
            date: record.date,
            failures,
        })
    }

    /// Current cost to buy the spread back, from real quotes only.
    async fn cost_to_close(
        &self,
        date: NaiveDate,
        entry: &SpreadEntry,
        now: DateTime<Utc>,
    ) -> Result<Decimal, FetchError> {
        let (short_premium, long_premium) = self
            .quote_spread(date, entry.short_strike, entry.long_strike, now)
            .await?;
        if short_premium < Decimal::ZERO || long_premium < Decimal::ZERO {
            return Err(FetchError::bad_quote(format!(
                "negative premium (short {short_premium}, long {long_premium})"
            )));
        }
        Ok(short_premium - long_premium)
    }

    async fn quote_spread(
        &self,
        expiry: NaiveDate,
        short_strike: Decimal,
        long_strike: Decimal,
        as_of: DateTime<Utc>,
    ) -> Result<(Decimal, Decimal), FetchError> {
        let underlying = &self.config.underlying;
        let short = OptionsContract::new(underlying, expiry, short_strike, OptionRight::Put);
        let long = OptionsContract::new(underlying, expiry, long_strike, OptionRight::Put);

        let short_premium = self.fetch(self.market.premium(&short, as_of)).await?;
        let long_premium = self.fetch(self.market.premium(&long, as_of)).await?;
        debug!(
            short = %short.display_name(),
            short_premium = %short_premium,
            long = %long.display_name(),
            long_premium = %long_premium,
            "Quoted spread"
        );
        Ok((short_premium, long_premium))
    }

    async fn fetch<T>(&self, call: impl Future<Output = Result<T, FetchError>>) -> Result<T, FetchError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .unwrap_or_else(|_| Err(FetchError::Timeout(self.call_timeout)))
    }

    async fn commit(&self, record: &PositionRecord, expected: PositionStatus) -> Result<Commit, EngineError> {
        match self.store.commit(record, &self.config, expected) {
            Ok(_) => Ok(Commit::Done),
            Err(StoreError::Conflict { found, .. }) => {
                info!(date = %record.date, %expected, %found, "Record moved by a concurrent run, standing down");
                Ok(Commit::LostRace(found))
            }
            Err(e) => Err(self.store_failure(record.date, e).await),
        }
    }

    async fn store_failure(&self, date: NaiveDate, err: StoreError) -> EngineError {
        error!(%date, error = %err, "State store failure");
        self.alerts
            .notify(&alerts::error_alert(
                &self.config,
                date,
                format!("State store failure, manual check needed: {err}"),
            ))
            .await;
        EngineError::Store(err)
    }
}
