//! `close`: book an operator close for a position the engine left OPEN.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Args;
use rust_decimal::Decimal;
use theta_core::AppConfig;

use super::build_engine;

/// Arguments for the close command.
#[derive(Args, Debug, Clone)]
pub struct CloseArgs {
    /// Trading date of the OPEN position (YYYY-MM-DD)
    #[arg(long)]
    pub date: NaiveDate,

    /// Per-unit cost paid to buy the spread back (short minus long premium)
    #[arg(long)]
    pub exit_credit: Decimal,
}

/// # Errors
/// Returns an error if the day is not OPEN, the cost is negative, or the
/// record cannot be written.
pub async fn run_close(config: &AppConfig, args: CloseArgs) -> Result<()> {
    let engine = build_engine(config)?;
    let outcome = engine
        .close_manually(args.date, args.exit_credit, Utc::now())
        .await
        .with_context(|| format!("cannot close {} {}", config.strategy.underlying, args.date))?;

    tracing::info!(date = %args.date, %outcome, "Manual close recorded");
    println!("{} {}: {outcome}", config.strategy.underlying, args.date);
    Ok(())
}
