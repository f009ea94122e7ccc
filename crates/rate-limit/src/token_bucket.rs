use std::time::{Duration, Instant};

/// The two tunables of the token bucket algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPolicy {
    rate_per_second: u64,
    burst_capacity: u64,
}

impl BucketPolicy {
    /// Create a new policy.
    ///
    /// * `rps`   - sustained requests per second (refill rate)
    /// * `burst` - maximum burst size (bucket capacity), at least 1
    pub fn new(rps: u64, burst: u64) -> Self {
        Self {
            rate_per_second: rps,
            burst_capacity: burst.max(1),
        }
    }

    pub fn rate_per_second(&self) -> u64 {
        self.rate_per_second
    }

    pub fn burst_capacity(&self) -> u64 {
        self.burst_capacity
    }
}

/// Admission state for a single client identity.
///
/// Tokens are whole units. Refill truncates `elapsed * rate` and only moves
/// `last_seen` forward when at least one token was added, so the fractional
/// remainder keeps accruing until it crosses a whole token instead of being
/// thrown away on every call. What is lost is the remainder at the moment a
/// refill happens; that under-refill is accepted in exchange for integer
/// state.
#[derive(Debug, Clone)]
pub struct VisitorEntry {
    tokens: u64,
    last_seen: Instant,
}

impl VisitorEntry {
    /// State for an identity seen for the first time. Its first request is
    /// pre-charged, so the entry starts one token short of a full bucket.
    pub fn first_visit(policy: &BucketPolicy, now: Instant) -> Self {
        Self {
            tokens: policy.burst_capacity - 1,
            last_seen: now,
        }
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Returns `true` if the entry has not been refilled for longer than
    /// `stale_after` as of `now`.
    pub fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > stale_after
    }

    /// Add the whole tokens earned since `last_seen`, capped at the burst
    /// capacity. A `now` older than `last_seen` counts as no time passing.
    pub fn refill(&mut self, policy: &BucketPolicy, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_seen).as_secs_f64();
        let to_add = (elapsed * policy.rate_per_second as f64).floor() as u64;

        if to_add > 0 {
            self.tokens = self.tokens.saturating_add(to_add).min(policy.burst_capacity);
            self.last_seen = now;
        }
    }

    /// Spend one token if any are left.
    pub fn try_consume(&mut self) -> bool {
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Refill then consume. Callers must hold exclusive access to the entry
    /// for the whole call.
    pub fn admit(&mut self, policy: &BucketPolicy, now: Instant) -> bool {
        self.refill(policy, now);
        let allowed = self.try_consume();

        assert!(
            self.tokens <= policy.burst_capacity,
            "token bucket overflow: {} tokens with capacity {}",
            self.tokens,
            policy.burst_capacity
        );

        allowed
    }
}
