use std::sync::Arc;

use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::SessionSynchronizer;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Runs [`SessionSynchronizer::poll_tick`] every `period` until cancelled.
///
/// The first tick fires one period after start. Ticks never overlap; a slow
/// tick delays the next one. Cancelling drops the in-flight tick, so results
/// that arrive after cancellation are never applied.
pub async fn poll_loop(
    sync: Arc<SessionSynchronizer>,
    period: Duration,
    verbose: bool,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::select! {
                    _ = sync.poll_tick() => {
                        ticks = ticks.wrapping_add(1);
                        if verbose {
                            log_debug!("poll tick {ticks} done");
                        }
                    }
                    _ = cancel_token.cancelled() => break,
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }

    log_info!("session poll loop shutting down after {ticks} ticks");
}
