//! `remind`: heads-up alert for the next trading day.

use anyhow::{anyhow, Result};
use chrono::{Days, NaiveDate};
use clap::Args;
use theta_core::{AppConfig, StrategyConfig};
use theta_options_manager::alerts::reminder_alert;
use theta_options_manager::AlertEmitter;

use super::{call_timeout, local_today};

/// Arguments for the remind command.
#[derive(Args, Debug, Clone)]
pub struct RemindArgs {
    /// Trading day to announce; defaults to the next configured weekday after today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

/// # Errors
/// Returns an error if the alert sinks cannot be built.
pub async fn run_remind(config: &AppConfig, args: RemindArgs) -> Result<()> {
    let day = match args.date {
        Some(day) => day,
        None => next_trading_day(&config.strategy, local_today(config)?)
            .ok_or_else(|| anyhow!("no trading weekday configured"))?,
    };

    let alerts = AlertEmitter::from_config(&config.notify, call_timeout(config))?;
    let delivered = alerts.notify(&reminder_alert(&config.strategy, day)).await;
    tracing::info!(%day, delivered, "Reminder sent");
    Ok(())
}

/// First configured trading day strictly after `today`.
fn next_trading_day(config: &StrategyConfig, today: NaiveDate) -> Option<NaiveDate> {
    (1..=7)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .find(|day| config.is_trading_day(*day))
}
