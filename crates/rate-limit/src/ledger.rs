use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::token_bucket::{BucketPolicy, VisitorEntry};

/// In-memory map from client identity to token bucket state.
///
/// Backed by a sharded [`DashMap`]: the refill and consume steps for one
/// identity run under that entry's shard write lock, and identities in other
/// shards proceed in parallel. Nothing is persisted.
pub struct VisitorLedger {
    entries: DashMap<String, VisitorEntry>,
    policy: BucketPolicy,
}

impl VisitorLedger {
    pub fn new(policy: BucketPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &BucketPolicy {
        &self.policy
    }

    /// Decide whether a request from `identity` arriving at `now` is admitted.
    pub fn admit(&self, identity: &str, now: Instant) -> bool {
        // Known identities skip the key allocation.
        if let Some(mut entry) = self.entries.get_mut(identity) {
            return entry.admit(&self.policy, now);
        }

        match self.entries.entry(identity.to_string()) {
            // Another caller created it between the two lookups.
            Entry::Occupied(mut occupied) => occupied.get_mut().admit(&self.policy, now),
            Entry::Vacant(vacant) => {
                vacant.insert(VisitorEntry::first_visit(&self.policy, now));
                true
            }
        }
    }

    /// Remove every entry idle for longer than `stale_after` as of `now`.
    ///
    /// Returns the number of entries removed. Each shard is write-locked while
    /// it is scanned, so a concurrent `admit` sees an entry either fully
    /// present or fully gone.
    pub fn evict_stale(&self, now: Instant, stale_after: Duration) -> usize {
        let mut removed = 0;
        self.entries.retain(|_identity, entry| {
            let keep = !entry.is_stale(now, stale_after);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Current token count for `identity`, if it has an entry.
    pub fn tokens(&self, identity: &str) -> Option<u64> {
        self.entries.get(identity).map(|entry| entry.tokens())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
