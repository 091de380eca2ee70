//! `summary`: running paper-trading statistics.

use anyhow::Result;
use clap::Args;
use theta_core::AppConfig;
use theta_options_manager::SessionSummary;

use super::state_store;

/// Arguments for the summary command.
#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    /// Print JSON instead of the text report
    #[arg(long)]
    pub json: bool,
}

/// # Errors
/// Returns an error if any stored record cannot be read.
pub fn run_summary(config: &AppConfig, args: SummaryArgs) -> Result<()> {
    let underlying = &config.strategy.underlying;
    let history = state_store(config).history(underlying)?;
    let summary = SessionSummary::from_history(underlying, &history, config.strategy.paper_capital);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.format());
    }
    Ok(())
}
