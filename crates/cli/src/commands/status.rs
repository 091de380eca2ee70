//! `status`: print the stored record for a day.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use theta_core::AppConfig;

use super::{local_today, state_store};

/// Arguments for the status command.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Trading date (YYYY-MM-DD); defaults to today in the strategy time zone
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

/// # Errors
/// Returns an error if the record exists but cannot be read.
pub fn run_status(config: &AppConfig, args: StatusArgs) -> Result<()> {
    let date = match args.date {
        Some(date) => date,
        None => local_today(config)?,
    };
    let store = state_store(config);

    match store.load_persisted(&config.strategy.underlying, date)? {
        Some(persisted) => println!("{}", serde_json::to_string_pretty(&persisted)?),
        None => println!(
            "{} {}: no record (NOT_ENTERED), expected at {}",
            config.strategy.underlying,
            date,
            store.path_for(&config.strategy.underlying, date).display()
        ),
    }
    Ok(())
}
