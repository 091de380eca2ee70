//! Best-effort alert delivery and the alert texts the engine sends.
//!
//! Alerts are built from records that are already committed. Delivery
//! failures are logged and dropped; nothing here can fail the caller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use theta_core::{
    format_amount, AlertCategory, AlertEvent, NotificationSink, NotifyConfig, StrategyConfig,
};
use tracing::{debug, warn};

use crate::credit::{max_loss, max_profit};
use crate::notify::{LogSink, TelegramSink};
use crate::summary::SessionSummary;
use crate::types::{PositionRecord, SpreadEntry, SpreadExit};

/// Fans an event out to every configured sink, each bounded by `timeout`.
#[derive(Clone)]
pub struct AlertEmitter {
    sinks: Vec<Arc<dyn NotificationSink>>,
    timeout: Duration,
}

impl AlertEmitter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sinks: Vec::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Log sink always, Telegram when configured.
    pub fn from_config(config: &NotifyConfig, timeout: Duration) -> Result<Self> {
        let mut emitter = Self::new(timeout).with_sink(Arc::new(LogSink));
        if let Some(telegram) = &config.telegram {
            emitter = emitter.with_sink(Arc::new(TelegramSink::new(telegram, timeout)?));
        }
        Ok(emitter)
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    /// Delivers `event` to every sink. Returns how many accepted it.
    pub async fn notify(&self, event: &AlertEvent) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match tokio::time::timeout(self.timeout, sink.send(event)).await {
                Ok(Ok(())) => {
                    delivered += 1;
                    debug!(sink = sink.name(), category = %event.category, "Alert delivered");
                }
                Ok(Err(e)) => {
                    warn!(sink = sink.name(), category = %event.category, error = %e, "Alert delivery failed");
                }
                Err(_) => {
                    warn!(
                        sink = sink.name(),
                        category = %event.category,
                        timeout = ?self.timeout,
                        "Alert delivery timed out"
                    );
                }
            }
        }
        delivered
    }
}

fn base(config: &StrategyConfig, category: AlertCategory, date: NaiveDate, message: impl Into<String>) -> AlertEvent {
    AlertEvent::new(category, &config.name, &config.underlying, date, message)
}

pub fn entry_alert(config: &StrategyConfig, record: &PositionRecord, entry: &SpreadEntry) -> AlertEvent {
    let event = base(
        config,
        AlertCategory::Entry,
        record.date,
        format!("Opened put credit spread at spot {}", format_amount(entry.entry_spot, 2)),
    )
    .with_strikes(entry.short_strike, entry.long_strike)
    .with_credit(entry.entry_credit)
    .with_detail("Credit ratio", format!("{:.1}%", entry.credit_ratio * rust_decimal::Decimal::ONE_HUNDRED))
    .with_detail("Quantity", entry.quantity.to_string())
    .with_detail(
        "Max profit",
        format_amount(max_profit(entry.entry_credit, entry.quantity), 0),
    )
    .with_detail(
        "Max loss",
        format_amount(max_loss(entry.entry_credit, entry.quantity, config.spread_width), 0),
    );
    match config.stop_loss_multiplier {
        Some(multiplier) => event.with_detail(
            "Stop at cost",
            format_amount(entry.entry_credit * multiplier, 2),
        ),
        None => event,
    }
}

pub fn exit_alert(
    config: &StrategyConfig,
    record: &PositionRecord,
    entry: &SpreadEntry,
    exit: &SpreadExit,
    session: Option<&SessionSummary>,
) -> AlertEvent {
    let mut event = base(
        config,
        AlertCategory::Exit,
        record.date,
        format!("Closed spread ({})", exit.reason),
    )
    .with_strikes(entry.short_strike, entry.long_strike)
    .with_credit(entry.entry_credit)
    .with_pnl(exit.realized_pnl)
    .with_detail("Exit cost", format_amount(exit.exit_credit, 2));
    if let Some(spot) = exit.exit_spot {
        event = event.with_detail("Exit spot", format_amount(spot, 2));
    }
    if let Some(session) = session {
        event = event.with_detail("Session", session.headline());
    }
    event
}

pub fn skipped_alert(config: &StrategyConfig, record: &PositionRecord, reason: &str) -> AlertEvent {
    base(config, AlertCategory::Skipped, record.date, reason.to_string())
}

pub fn stuck_alert(config: &StrategyConfig, record: &PositionRecord, last_error: &str) -> AlertEvent {
    let mut event = base(
        config,
        AlertCategory::Error,
        record.date,
        format!(
            "Position still OPEN after {} failed exit attempts. Close it manually.",
            record.exit_failures
        ),
    )
    .with_detail("Last error", last_error.to_string());
    if let Some(entry) = &record.entry {
        event = event
            .with_strikes(entry.short_strike, entry.long_strike)
            .with_credit(entry.entry_credit);
    }
    event
}

pub fn error_alert(config: &StrategyConfig, date: NaiveDate, message: impl Into<String>) -> AlertEvent {
    base(config, AlertCategory::Error, date, message)
}

/// Heads-up sent the evening before a trading day.
pub fn reminder_alert(config: &StrategyConfig, trading_day: NaiveDate) -> AlertEvent {
    let stop = config
        .stop_loss_multiplier
        .map_or_else(|| "off".to_string(), |m| format!("{m}x credit"));
    base(
        config,
        AlertCategory::Reminder,
        trading_day,
        format!("{} runs on {}", config.name, trading_day.format("%A %Y-%m-%d")),
    )
    .with_detail("Strategy", format!("{} 0DTE put credit spread", config.underlying))
    .with_detail(
        "Size",
        format!(
            "{} x {} = {} units | Spread {} pts",
            config.lots,
            config.lot_size,
            config.quantity(),
            config.spread_width
        ),
    )
    .with_detail(
        "Entry window",
        format!(
            "{} - {} {}",
            config.entry_start.format("%H:%M"),
            config.entry_end.format("%H:%M"),
            config.timezone
        ),
    )
    .with_detail("Stop loss", stop)
    .with_detail("Hard exit", config.exit_time.format("%H:%M").to_string())
    .with_detail("Mode", "PAPER")
}
