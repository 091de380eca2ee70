//! Poll loop: invokes the engine on a fixed interval until shut down.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::engine::StrategyEngine;

/// Run the engine every `poll_interval` until `shutdown` resolves.
///
/// Fatal invocation errors are logged and the loop keeps polling: a stuck
/// position may still close on a later quote, and the operator has already
/// been alerted.
pub async fn run(engine: &StrategyEngine, poll_interval: Duration, shutdown: impl Future<Output = ()>) {
    let config = engine.config();
    info!(
        strategy = %config.name,
        underlying = %config.underlying,
        poll_secs = poll_interval.as_secs(),
        entry_start = %config.entry_start,
        entry_end = %config.entry_end,
        exit_time = %config.exit_time,
        "Strategy service started"
    );

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Strategy service stopping");
                return;
            }
            _ = interval.tick() => {}
        }

        match engine.invoke(Utc::now()).await {
            Ok(outcome) if outcome.is_transition() => info!(%outcome, "Poll"),
            Ok(outcome) => debug!(%outcome, "Poll"),
            Err(e) => error!(error = %e, "Poll failed"),
        }
    }
}
