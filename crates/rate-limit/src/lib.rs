//! Per-client request admission for the shortlink service.
//!
//! The [`AdmissionGate`] answers one question per request: may this client
//! proceed? It keeps a token bucket per client identity in a shared
//! [`VisitorLedger`]:
//!
//! - **Token bucket** -- each identity holds up to `burst` whole tokens and
//!   earns `rps` tokens per second. Every admitted request spends one.
//!
//! - **Ledger** -- a sharded [`DashMap`](dashmap::DashMap) so clients in
//!   different shards never contend, while refill and consume for one client
//!   form a single critical section.
//!
//! - **Eviction sweeper** -- a background Tokio task that drops idle entries.
//!   The ledger is advisory, so losing it on restart simply resets everyone's
//!   allowance.

pub mod identity;
pub mod ledger;
pub mod sweeper;
pub mod token_bucket;

use std::sync::Arc;
use std::time::{Duration, Instant};

use shortlink_common::RateLimitConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use identity::ClientHints;
pub use ledger::VisitorLedger;
pub use sweeper::EvictionSweeper;
pub use token_bucket::{BucketPolicy, VisitorEntry};

/// The request-path admission decision.
///
/// Cheaply cloneable (backed by `Arc`) and safe to share across tasks and
/// threads; clones share one ledger.
#[derive(Clone)]
pub struct AdmissionGate {
    ledger: Arc<VisitorLedger>,
}

impl AdmissionGate {
    /// Create a gate with a token bucket per identity.
    ///
    /// * `rps`   - sustained requests per second (token refill rate)
    /// * `burst` - maximum burst size (bucket capacity)
    pub fn new(rps: u64, burst: u64) -> Self {
        tracing::info!(rps, burst, "creating admission gate");
        Self {
            ledger: Arc::new(VisitorLedger::new(BucketPolicy::new(rps, burst))),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.rps, config.burst)
    }

    /// Decide whether a request from `identity` at `now` is admitted.
    ///
    /// Returns `false` when the client is over its limit; producing the
    /// throttling response is up to the caller.
    pub fn admit(&self, identity: &str, now: Instant) -> bool {
        let allowed = self.ledger.admit(identity, now);
        if !allowed {
            tracing::debug!(identity, "admission rejected");
        }
        allowed
    }

    /// [`admit`](Self::admit) at the current time.
    pub fn check(&self, identity: &str) -> bool {
        self.admit(identity, sweeper::monotonic_now())
    }

    pub fn ledger(&self) -> &Arc<VisitorLedger> {
        &self.ledger
    }

    /// Spawn the eviction sweeper for this gate's ledger. The task lives until
    /// the runtime shuts down.
    pub fn start_sweeper(&self, interval: Duration, stale_after: Duration) -> JoinHandle<()> {
        EvictionSweeper::new(Arc::clone(&self.ledger), interval, stale_after).spawn()
    }

    /// Spawn the eviction sweeper with a shutdown signal.
    pub fn start_sweeper_with_shutdown(
        &self,
        interval: Duration,
        stale_after: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        EvictionSweeper::new(Arc::clone(&self.ledger), interval, stale_after)
            .spawn_with_shutdown(shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_enforces_burst() {
        let gate = AdmissionGate::new(5, 3);

        assert!(gate.check("client-a"));
        assert!(gate.check("client-a"));
        assert!(gate.check("client-a"));
        assert!(!gate.check("client-a"));

        // Different key is independent.
        assert!(gate.check("client-b"));
    }

    #[test]
    fn clone_shares_state() {
        let gate = AdmissionGate::new(10, 2);
        let gate2 = gate.clone();
        let now = Instant::now();

        assert!(gate.admit("shared", now));
        assert!(gate2.admit("shared", now));

        // Both clones consumed from the same bucket -- should now be empty.
        assert!(!gate.admit("shared", now));
        assert!(!gate2.admit("shared", now));
    }

    #[test]
    fn from_config_uses_limits() {
        let config = RateLimitConfig {
            rps: 1,
            burst: 1,
            ..RateLimitConfig::default()
        };
        let gate = AdmissionGate::from_config(&config);
        let now = Instant::now();

        assert!(gate.admit("solo", now));
        assert!(!gate.admit("solo", now));
        assert_eq!(gate.ledger().policy().burst_capacity(), 1);
    }
}
