use std::sync::Arc;

use chrono::Utc;
use tokio::{
    sync::mpsc,
    time::{Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::tracker::Clipboard;

const ENABLE_LOGS: bool = false;

use crate::{log_debug, log_info};

/// Fresh clipboard text the user may want to save as a memo.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardOffer {
    pub text: String,
    pub seen_at: i64,
}

/// Polls the clipboard every `period` and offers text that changed since the
/// last read. Whitespace-only text is ignored and read failures are skipped.
/// The first read only seeds the baseline, so whatever was already on the
/// clipboard when the app came to the foreground is not offered.
pub async fn clipboard_loop(
    clipboard: Arc<dyn Clipboard>,
    period: Duration,
    offers: mpsc::Sender<ClipboardOffer>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_seen: Option<String> = match clipboard.read_text().await {
        Ok(text) => text.map(|t| t.trim().to_string()),
        Err(_) => None,
    };

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel_token.cancelled() => break,
        }

        let text = match clipboard.read_text().await {
            Ok(Some(text)) => text.trim().to_string(),
            Ok(None) => continue,
            Err(err) => {
                log_debug!("clipboard read failed: {err:#}");
                continue;
            }
        };
        if text.is_empty() || last_seen.as_deref() == Some(text.as_str()) {
            continue;
        }
        last_seen = Some(text.clone());

        let offer = ClipboardOffer {
            text,
            seen_at: Utc::now().timestamp_millis(),
        };
        if offers.send(offer).await.is_err() {
            break;
        }
    }

    log_info!("clipboard watcher shutting down");
}
