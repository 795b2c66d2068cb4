//! Error types for rate specification and limiter calls.

/// Rejected at [`Rate`](crate::Rate) construction; evaluation never sees an
/// invalid specification.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RateError {
    /// The permitted count was zero.
    #[error("permitted count must be at least 1")]
    ZeroPermitted,
    /// The period was zero.
    #[error("period must be longer than zero")]
    ZeroPeriod,
    /// The period overflows 64-bit nanoseconds (around 584 years).
    #[error("period does not fit in 64-bit nanoseconds")]
    PeriodTooLong,
    /// The burst depth was zero; a bucket that admits nothing is a
    /// configuration error, not a rate.
    #[error("burst depth must be at least 1")]
    ZeroBurst,
}

/// Errors surfaced by [`RateLimiter`](crate::RateLimiter) calls.
///
/// None of these is ever resolved into an allow or deny decision. A caller
/// that wants fail-open behavior on store outages has to choose that
/// explicitly.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum LimiterError {
    /// A zero-cost call is not a valid rate-limit probe.
    #[error("cost must be at least 1")]
    ZeroCost,
    /// The atomic round trip to the store could not be completed.
    #[error("store unavailable: {source}")]
    StoreUnavailable {
        /// The backend's own error (connection, timeout, script failure).
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl LimiterError {
    /// Check if this error is a store outage rather than a bad request.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}
