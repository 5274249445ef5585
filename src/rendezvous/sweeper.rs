//! Periodic TTL eviction.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::store::RoomStore;

/// Spawn a task that sweeps expired rooms every `every` until `token` fires.
pub fn spawn_sweeper(
    store: Arc<RoomStore>,
    every: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = store.sweep_expired();
                    if evicted > 0 {
                        tracing::info!(evicted, remaining = store.len(), "Swept expired rooms");
                    }
                }
            }
        }

        tracing::debug!("Room sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_after_ttl_and_stops_on_cancel() {
        let store = Arc::new(RoomStore::new(Duration::from_secs(600)));
        let token = CancellationToken::new();
        let handle = spawn_sweeper(store.clone(), Duration::from_secs(300), token.clone());

        store.create_room("AB12");
        // Sweeps at 300s, 600s (room exactly at TTL, kept), 900s (evicted).
        tokio::time::sleep(Duration::from_secs(601)).await;
        assert_eq!(store.len(), 1);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(store.len(), 0);

        token.cancel();
        handle.await.unwrap();
    }
}
