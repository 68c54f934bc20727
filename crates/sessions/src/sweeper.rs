//! Background sweeper: removes terminal sessions past their idle TTL.

use std::sync::Arc;
use std::time::Duration;

use crate::store::SessionStore;

/// Spawn the sweeper task. Ticks every `sweep_interval`, removing terminal
/// sessions whose `end_time` is older than `idle_ttl`.
pub fn spawn_sweeper(
    store: Arc<SessionStore>,
    idle_ttl: chrono::Duration,
    sweep_interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            let removed = store.sweep_older_than(idle_ttl);
            if removed > 0 {
                tracing::debug!(removed, "swept idle sessions");
            }
        }
    })
}
