//! CLI commands for the credit-spread paper trader.

use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use theta_core::AppConfig;
use theta_options_manager::{AlertEmitter, StateStore, StrategyEngine};

pub mod check_config;
pub mod close;
pub mod remind;
pub mod run;
pub mod status;
pub mod summary;

pub use check_config::run_check_config;
pub use close::{run_close, CloseArgs};
pub use remind::{run_remind, RemindArgs};
pub use run::{run_once, run_watch, RunArgs, WatchArgs};
pub use status::{run_status, StatusArgs};
pub use summary::{run_summary, SummaryArgs};

fn call_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.runtime.call_timeout_secs)
}

fn state_store(config: &AppConfig) -> StateStore {
    StateStore::new(&config.state.dir)
}

/// Wires the configured market data, alert sinks and store into an engine.
fn build_engine(config: &AppConfig) -> Result<StrategyEngine> {
    let timeout = call_timeout(config);
    let tz = config.strategy.tz()?;
    let market = theta_market_data::build_source(&config.market_data, tz, timeout)?;
    let alerts = AlertEmitter::from_config(&config.notify, timeout)?;
    tracing::debug!(sinks = ?alerts.sink_names(), "Alert sinks ready");

    let engine = StrategyEngine::new(
        config.strategy.clone(),
        state_store(config),
        market,
        alerts,
        timeout,
    )?;
    Ok(engine)
}

/// Today's date in the strategy's time zone.
fn local_today(config: &AppConfig) -> Result<NaiveDate> {
    Ok(config.strategy.local(Utc::now())?.date_naive())
}
