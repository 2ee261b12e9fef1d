//! Periodic removal of expired, unverified challenges.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use super::OtpStore;

/// Spawn a background task that sweeps the challenge table every `period`.
///
/// The handle is owned by the server; abort it on shutdown.
pub fn spawn_sweeper(store: Arc<OtpStore>, period: Duration) -> JoinHandle<()> {
    let period = if period.is_zero() {
        Duration::from_secs(1)
    } else {
        period
    };

    tokio::spawn(async move {
        let mut sweep_interval = interval(period);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        sweep_interval.tick().await;

        loop {
            sweep_interval.tick().await;

            let removed = store.cleanup_expired().await;
            if removed > 0 {
                debug!(removed, "expired OTP challenges removed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::{IssueOutcome, OtpConfig};
    use anyhow::Result;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_challenges() -> Result<()> {
        let store = Arc::new(OtpStore::new(OtpConfig::new()));
        let outcome = store.begin_issue("a@b.com").await?;
        assert!(matches!(outcome, IssueOutcome::Issued(_)));

        let handle = spawn_sweeper(store.clone(), Duration::from_secs(60));

        // Tick at 300s sees the challenge exactly at expiry; the 360s tick removes it.
        sleep(Duration::from_secs(301)).await;
        assert_eq!(store.len().await, 1);
        sleep(Duration::from_secs(60)).await;
        assert!(store.is_empty().await);

        handle.abort();
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_skips_the_immediate_tick() -> Result<()> {
        let store = Arc::new(OtpStore::new(OtpConfig::new().with_ttl_seconds(1)));
        store.begin_issue("a@b.com").await?;
        sleep(Duration::from_secs(2)).await;

        let handle = spawn_sweeper(store.clone(), Duration::from_secs(10));
        tokio::task::yield_now().await;
        assert_eq!(store.len().await, 1);

        sleep(Duration::from_secs(11)).await;
        assert!(store.is_empty().await);

        handle.abort();
        Ok(())
    }
}
