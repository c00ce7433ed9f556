// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backoff policy for deletions deferred by active readers.
//
// A sweep that finds readers on an expired artifact re-enqueues it after an
// exponentially growing delay.  After `max_deferrals` attempts the artifact
// is given up on and left for the shutdown/startup purge.

use std::time::Duration;

use pexel_core::ServiceConfig;
use tracing::{debug, warn};

/// Upper bound on a single deferral delay.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Deferred-deletion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferralPolicy {
    /// Deferrals allowed before giving up.
    pub max_deferrals: u32,
    /// Delay before the first retry; doubles on each further one.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for DeferralPolicy {
    fn default() -> Self {
        Self {
            max_deferrals: 5,
            base_delay: Duration::from_millis(500),
            max_delay: MAX_DELAY,
        }
    }
}

impl DeferralPolicy {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            max_deferrals: config.max_deferrals,
            base_delay: config.deferral_base(),
            max_delay: MAX_DELAY,
        }
    }

    /// What to do with an artifact that has already been deferred
    /// `deferrals` times.
    pub fn decide(&self, deferrals: u32) -> DeferralDecision {
        if deferrals >= self.max_deferrals {
            warn!(deferrals, max = self.max_deferrals, "deferral limit exhausted");
            DeferralDecision::Exhausted
        } else {
            let delay = self.delay_for(deferrals);
            debug!(deferrals, delay_ms = delay.as_millis() as u64, "deferring deletion");
            DeferralDecision::RetryAfter(delay)
        }
    }

    /// delay = min(base * 2^attempt + jitter, max_delay), jitter in [0, base).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(16));
        let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
        Duration::from_millis(total_ms.min(self.max_delay.as_millis() as u64))
    }
}

/// Outcome of [`DeferralPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferralDecision {
    RetryAfter(Duration),
    Exhausted,
}

/// Deterministic spread in [0, base) so deferred entries that expired
/// together do not all retry on the same tick.
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = u64::from(attempt).wrapping_add(1).wrapping_mul(6364136223846793005);
    (hash >> 33) % base_ms.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_attempts() {
        let policy = DeferralPolicy::default();
        let d0 = policy.delay_for(0);
        let d1 = policy.delay_for(1);
        let d2 = policy.delay_for(2);
        assert!(d0 >= Duration::from_millis(500) && d0 < Duration::from_millis(1000));
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn delay_is_capped() {
        let policy = DeferralPolicy {
            max_delay: Duration::from_secs(3),
            ..DeferralPolicy::default()
        };
        assert_eq!(policy.delay_for(30), Duration::from_secs(3));
    }

    #[test]
    fn decision_respects_limit() {
        let policy = DeferralPolicy {
            max_deferrals: 2,
            ..DeferralPolicy::default()
        };
        assert!(matches!(policy.decide(0), DeferralDecision::RetryAfter(_)));
        assert!(matches!(policy.decide(1), DeferralDecision::RetryAfter(_)));
        assert_eq!(policy.decide(2), DeferralDecision::Exhausted);
    }

    #[test]
    fn zero_base_never_panics() {
        let policy = DeferralPolicy {
            base_delay: Duration::ZERO,
            ..DeferralPolicy::default()
        };
        assert_eq!(policy.delay_for(3), Duration::ZERO);
    }
}
