use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ledger::VisitorLedger;

/// Periodically prunes idle entries from a [`VisitorLedger`].
pub struct EvictionSweeper {
    ledger: Arc<VisitorLedger>,
    interval: Duration,
    stale_after: Duration,
}

impl EvictionSweeper {
    pub fn new(ledger: Arc<VisitorLedger>, interval: Duration, stale_after: Duration) -> Self {
        Self {
            ledger,
            interval,
            stale_after,
        }
    }

    /// Run a single sweep as of `now`, returning how many entries were removed.
    pub fn sweep_once(&self, now: Instant) -> usize {
        let removed = self.ledger.evict_stale(now, self.stale_after);
        tracing::debug!(
            removed,
            remaining = self.ledger.len(),
            "visitor ledger sweep complete"
        );
        removed
    }

    /// Spawn the sweep loop on the current Tokio runtime. It runs until the
    /// runtime shuts down.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = self.ticker().await;
            loop {
                ticker.tick().await;
                self.sweep_once(monotonic_now());
            }
        })
    }

    /// Like [`spawn`](Self::spawn), but the loop also exits once `shutdown`
    /// flips to `true` or its sender is dropped.
    pub fn spawn_with_shutdown(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = self.ticker().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once(monotonic_now());
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("visitor ledger sweeper stopping");
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn ticker(&self) -> tokio::time::Interval {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            stale_after_secs = self.stale_after.as_secs(),
            "starting visitor ledger sweeper"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first sweep waits one
        // full interval.
        ticker.tick().await;
        ticker
    }
}

/// Current time on the Tokio clock, so paused test time drives staleness too.
pub(crate) fn monotonic_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_bucket::BucketPolicy;

    fn ledger() -> Arc<VisitorLedger> {
        Arc::new(VisitorLedger::new(BucketPolicy::new(10, 10)))
    }

    #[test]
    fn sweep_once_reports_removed() {
        let ledger = ledger();
        let start = Instant::now();
        ledger.admit("a", start);
        ledger.admit("b", start);

        let sweeper = EvictionSweeper::new(
            Arc::clone(&ledger),
            Duration::from_secs(300),
            Duration::from_secs(600),
        );
        assert_eq!(sweeper.sweep_once(start + Duration::from_secs(60)), 0);
        assert_eq!(sweeper.sweep_once(start + Duration::from_secs(601)), 2);
        assert!(ledger.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_evicts_after_interval() {
        let ledger = ledger();
        ledger.admit("idle", monotonic_now());

        let handle = EvictionSweeper::new(
            Arc::clone(&ledger),
            Duration::from_secs(300),
            Duration::from_secs(600),
        )
        .spawn();

        // First sweep at 5 minutes: entry is only 5 minutes idle.
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(ledger.contains("idle"));

        // Touched now, so it survives the 10 minute sweep as well.
        ledger.admit("busy", monotonic_now());
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(!ledger.contains("idle"));
        assert!(ledger.contains("busy"));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_stops_loop() {
        let (tx, rx) = watch::channel(false);
        let handle = EvictionSweeper::new(ledger(), Duration::from_secs(1), Duration::from_secs(1))
            .spawn_with_shutdown(rx);

        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
