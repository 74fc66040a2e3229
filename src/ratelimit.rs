//! Per-host outbound rate limiting for IMAP/SMTP/webhook connections (spec §4.1).
//!
//! A token-bucket quota is maintained per remote host so one noisy tenant's
//! mailbox can't starve connections to a different mail server. Distinct from
//! `api/rate_limit.rs`'s inbound per-IP sliding window, which throttles
//! callers of our own HTTP API rather than our outbound traffic.
//!
//! Grounded on the keyed-quota pattern in
//! `pavlealeksic-flowDesk/shared/rust-lib/src/mail/auth/token_manager.rs`.

use std::num::NonZeroU32;
use std::sync::Arc;

use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use nonzero_ext::nonzero;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default quota applied to a host seen for the first time: 5 operations/sec
/// with a burst of 10, generous enough for a single tenant's poll loop while
/// still bounding a runaway fan-out across many tenants hitting one host.
fn default_quota() -> Quota {
    Quota::per_second(nonzero!(5u32)).allow_burst(nonzero!(10u32))
}

/// Lazily-populated per-host token buckets.
pub struct HostRateLimiter {
    buckets: DashMap<String, Arc<DirectLimiter>>,
    quota: Quota,
}

impl HostRateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            quota: default_quota(),
        }
    }

    pub fn with_quota(per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        Self {
            buckets: DashMap::new(),
            quota: Quota::per_second(per_second).allow_burst(burst),
        }
    }

    fn bucket_for(&self, host: &str) -> Arc<DirectLimiter> {
        self.buckets
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(GovernorRateLimiter::direct(self.quota)))
            .clone()
    }

    /// Blocks the calling task until a token for `host` is available.
    pub async fn acquire(&self, host: &str) {
        let bucket = self.bucket_for(host);
        bucket.until_ready().await;
    }

    /// Non-blocking check: true if a token was available and consumed.
    pub fn try_acquire(&self, host: &str) -> bool {
        self.bucket_for(host).check().is_ok()
    }
}

impl Default for HostRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
