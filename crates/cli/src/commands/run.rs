//! `run` and `watch`: drive the strategy engine.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use theta_core::AppConfig;
use theta_options_manager::service;

use super::build_engine;

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Evaluate as of this instant (RFC 3339) instead of now
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

/// Arguments for the watch command.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Seconds between invocations (defaults to runtime.poll_interval_secs)
    #[arg(long)]
    pub interval_secs: Option<u64>,
}

/// Runs exactly one engine invocation.
///
/// # Errors
/// Returns an error if the engine cannot be built or the invocation is
/// fatal (store failure, position stuck past exit).
pub async fn run_once(config: &AppConfig, args: RunArgs) -> Result<()> {
    let engine = build_engine(config)?;
    let now = args.at.unwrap_or_else(Utc::now);

    let outcome = engine
        .invoke(now)
        .await
        .with_context(|| format!("{} invocation failed", config.strategy.name))?;

    if outcome.is_transition() {
        tracing::info!(strategy = %config.strategy.name, %outcome, "Invocation complete");
    } else {
        tracing::debug!(strategy = %config.strategy.name, %outcome, "Invocation complete");
    }
    Ok(())
}

/// Polls until Ctrl-C.
///
/// # Errors
/// Returns an error if the engine cannot be built.
pub async fn run_watch(config: &AppConfig, args: WatchArgs) -> Result<()> {
    let engine = build_engine(config)?;
    let interval = Duration::from_secs(
        args.interval_secs
            .unwrap_or(config.runtime.poll_interval_secs)
            .max(1),
    );

    service::run(&engine, interval, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
    .await;
    Ok(())
}
