//! Long-polling loop for deployments without a public webhook URL

use crate::dispatch::Dispatcher;
use crate::protocol::Update;
use crate::transport::TelegramClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Seconds Telegram may hold a getUpdates call open
pub const LONG_POLL_SECS: u64 = 50;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Offset that acknowledges every update in `updates`
pub fn next_offset(current: i64, updates: &[Update]) -> i64 {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .map_or(current, |next| next.max(current))
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

pub async fn run(
    client: Arc<TelegramClient>,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
) {
    let mut offset = 0;
    let mut backoff = INITIAL_BACKOFF;
    tracing::info!("Polling for updates");

    loop {
        let result = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = client.get_updates(offset, LONG_POLL_SECS) => result,
        };

        match result {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;
                offset = next_offset(offset, &updates);
                for update in updates {
                    if let Some(event) = update.into_event() {
                        dispatcher.dispatch(event).await;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("getUpdates failed: {} (retrying in {:?})", e, backoff);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = next_backoff(backoff);
            }
        }
    }

    tracing::info!("Polling stopped");
}
