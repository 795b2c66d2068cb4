//! Rate specifications: how many units per period, and how deep the burst.

use crate::error::RateError;
use std::fmt;
use std::time::Duration;

/// An immutable rate specification.
///
/// A rate of `permitted` units per `period` admits one unit every
/// `period / permitted` (the emission interval). The `burst` depth bounds
/// how many units can be admitted instantaneously and defaults to
/// `permitted`.
///
/// The emission interval is fixed at construction in integer nanoseconds;
/// it is never recomputed per call, so admission boundaries are exact and
/// reproducible over the lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rate {
    permitted: u32,
    period: Duration,
    burst: u32,
    emission_interval_ns: u64,
}

impl Rate {
    /// `permitted` units per second.
    pub fn per_second(permitted: u32) -> Result<Self, RateError> {
        Self::per_period(permitted, Duration::from_secs(1))
    }

    /// `permitted` units per minute.
    pub fn per_minute(permitted: u32) -> Result<Self, RateError> {
        Self::per_period(permitted, Duration::from_secs(60))
    }

    /// `permitted` units per hour.
    pub fn per_hour(permitted: u32) -> Result<Self, RateError> {
        Self::per_period(permitted, Duration::from_secs(3600))
    }

    /// `permitted` units per arbitrary `period`.
    pub fn per_period(permitted: u32, period: Duration) -> Result<Self, RateError> {
        if permitted == 0 {
            return Err(RateError::ZeroPermitted);
        }
        let period_ns = u64::try_from(period.as_nanos()).map_err(|_| RateError::PeriodTooLong)?;
        if period_ns == 0 {
            return Err(RateError::ZeroPeriod);
        }
        // Sub-nanosecond intervals collapse to 1ns, the finest granularity
        // the arithmetic carries.
        let emission_interval_ns = (period_ns / u64::from(permitted)).max(1);
        Ok(Self { permitted, period, burst: permitted, emission_interval_ns })
    }

    /// Builder-style: override the burst depth (defaults to `permitted`).
    pub fn with_burst(mut self, burst: u32) -> Result<Self, RateError> {
        if burst == 0 {
            return Err(RateError::ZeroBurst);
        }
        self.burst = burst;
        Ok(self)
    }

    /// The permitted count per period.
    pub fn permitted(&self) -> u32 {
        self.permitted
    }

    /// The period over which `permitted` units are admitted.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Maximum units admissible instantaneously.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Time cost of one unit, in nanoseconds.
    pub fn emission_interval_ns(&self) -> u64 {
        self.emission_interval_ns
    }

    /// Burst tolerance (`burst * emission_interval`), in nanoseconds: how far
    /// a bucket's theoretical arrival time may run ahead of the wall clock.
    pub fn tolerance_ns(&self) -> u64 {
        self.emission_interval_ns.saturating_mul(u64::from(self.burst))
    }

    /// Time for a full bucket to drain; idle keys are expired after this,
    /// which bounds storage to the set of recently active keys.
    pub fn ttl(&self) -> Duration {
        Duration::from_nanos(self.tolerance_ns())
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {:?} (burst {})", self.permitted, self.period, self.burst)
    }
}
