//! Idle-client eviction.
//!
//! Scans the client registry on a fixed period and force-disconnects
//! anyone whose last activity is older than the idle threshold. Eviction
//! detaches the record under the state lock, then signals the client's
//! handler, whose next poll of the transport observes the closure.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::state::SharedState;

pub async fn run(state: SharedState, period: Duration, idle_timeout: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;

        let mut shared = state.lock().await;
        let now = Instant::now();
        let expired: Vec<usize> = shared
            .clients
            .iter_active()
            .filter(|(_, record)| now.duration_since(record.last_activity) > idle_timeout)
            .map(|(slot, _)| slot)
            .collect();

        for slot in expired {
            if let Some(record) = shared.detach_client(slot) {
                warn!(
                    client = %record.id,
                    idle_secs = now.duration_since(record.last_activity).as_secs(),
                    "Evicting idle client"
                );
                record.kick.notify_one();
            }
        }
    }
}
