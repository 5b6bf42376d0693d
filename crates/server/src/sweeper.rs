use std::sync::Arc;
use std::time::Duration;

use pidloga_core::{Clock, SessionStore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Removes conversations idle for longer than `ttl_secs` on a fixed cadence.
/// A zero TTL keeps sessions forever and no task is started.
pub fn spawn(
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    ttl_secs: u64,
) -> Option<JoinHandle<()>> {
    if ttl_secs == 0 {
        info!(event_name = "conversation.sweeper.disabled", "session expiry disabled");
        return None;
    }

    let period = sweep_interval(ttl_secs);
    info!(
        event_name = "conversation.sweeper.started",
        ttl_secs,
        interval_secs = period.as_secs(),
        "stale session sweeper started"
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(&sessions, clock.as_ref(), ttl_secs);
        }
    }))
}

/// A TTL too large for `TimeDelta` can never elapse, so nothing is removed.
pub fn sweep_once(sessions: &SessionStore, clock: &dyn Clock, ttl_secs: u64) -> usize {
    let Some(ttl) = i64::try_from(ttl_secs).ok().and_then(chrono::TimeDelta::try_seconds) else {
        warn!(
            event_name = "conversation.sweeper.ttl_out_of_range",
            ttl_secs,
            "session ttl is out of range, skipping sweep"
        );
        return 0;
    };
    let removed = sessions.purge_expired(clock.now(), ttl);
    if removed > 0 {
        info!(
            event_name = "conversation.sessions_expired",
            removed,
            remaining = sessions.len(),
            "stale sessions removed"
        );
    } else {
        debug!(remaining = sessions.len(), "no stale sessions");
    }
    removed
}

fn sweep_interval(ttl_secs: u64) -> Duration {
    Duration::from_secs((ttl_secs / 4).max(1)).min(MAX_SWEEP_INTERVAL)
}
