//! The limiter front door: validates the call, stamps the time, and
//! delegates one atomic round trip to the store.

use crate::clock::{Clock, SystemClock};
use crate::decision::{Decision, RetryAfter};
use crate::error::LimiterError;
use crate::rate::Rate;
use crate::store::BucketStore;
use std::time::Duration;

/// A rate limiter over some bucket store.
///
/// Construct one with an explicit store handle and pass it to call sites;
/// there is deliberately no process-wide default instance. Multiple limiter
/// values (one per process, say) may target the same store and keys
/// concurrently with no coordination beyond the store's own atomicity.
///
/// The limiter holds no cache of bucket state: a cache would reintroduce
/// exactly the race the atomic store operation exists to prevent.
#[derive(Debug, Clone)]
pub struct RateLimiter<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: BucketStore> RateLimiter<S> {
    /// Create a limiter over `store` using the system wall clock.
    pub fn new(store: S) -> Self {
        Self { store, clock: SystemClock }
    }
}

impl<S: BucketStore, C: Clock> RateLimiter<S, C> {
    /// Create a limiter with an injected clock (deterministic tests).
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Check whether one unit may be consumed under `rate` for `key`.
    ///
    /// Performs exactly one store round trip and no internal retries: a
    /// store outage surfaces as [`LimiterError::StoreUnavailable`], never as
    /// a decision. Dropping the returned future abandons the round trip;
    /// the atomic submission either fully applied or did not apply, so no
    /// partial state survives cancellation.
    pub async fn allow(&self, key: &str, rate: &Rate) -> Result<Decision, LimiterError> {
        self.allow_n(key, rate, 1).await
    }

    /// Check whether `cost` units may be consumed at once.
    ///
    /// A cost above the burst depth can never be admitted and is denied
    /// immediately with [`RetryAfter::Never`]; a cost of zero is not a valid
    /// probe and is an error.
    pub async fn allow_n(
        &self,
        key: &str,
        rate: &Rate,
        cost: u64,
    ) -> Result<Decision, LimiterError> {
        if cost == 0 {
            return Err(LimiterError::ZeroCost);
        }
        if cost > u64::from(rate.burst()) {
            // No stored state could change the answer, and denials write
            // nothing, so the round trip is skipped entirely.
            tracing::debug!(
                target: "floodgate",
                key,
                cost,
                burst = rate.burst(),
                "cost exceeds burst depth; never satisfiable"
            );
            return Ok(Decision::denied(0, RetryAfter::Never, Duration::ZERO));
        }

        let now_ns = self.clock.now_nanos();
        let decision = self
            .store
            .check_and_update(key, rate, now_ns, cost)
            .await
            .map_err(|e| LimiterError::StoreUnavailable { source: Box::new(e) })?;

        if decision.is_allowed() {
            tracing::trace!(
                target: "floodgate",
                key,
                cost,
                remaining = decision.remaining(),
                "request allowed"
            );
        } else {
            tracing::debug!(
                target: "floodgate",
                key,
                cost,
                retry_after = ?decision.retry_after(),
                "request denied"
            );
        }
        Ok(decision)
    }
}
