//! The pure GCRA arithmetic: one function from (stored state, now, rate,
//! cost) to (new state, decision).
//!
//! GCRA keeps a single timestamp per bucket, the theoretical arrival time
//! (TAT): the instant at which the bucket would be fully drained if no more
//! requests arrived. A request of `cost` units pushes the TAT forward by
//! `cost * emission_interval`; it conforms as long as the pushed TAT stays
//! within `burst * emission_interval` of the wall clock.
//!
//! The function here is stateless so that every storage backend enforces the
//! same contract: the in-process store calls it directly, the Redis adapter
//! mirrors it in a server-side script.

use crate::decision::{Decision, RetryAfter};
use crate::rate::Rate;
use std::time::Duration;

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Theoretical arrival time to persist, or `None` when nothing may be
    /// written. Denials never consume quota, so they never produce a write.
    pub new_tat: Option<u64>,
    /// The decision to hand back to the caller.
    pub decision: Decision,
}

/// Evaluate one request of `cost` units against a bucket.
///
/// `prev_tat` is the stored theoretical arrival time for the key, or `None`
/// when no state exists (equivalent to a fully drained bucket). `now` is
/// wall-clock nanoseconds since the Unix epoch. All arithmetic is saturating
/// integer nanoseconds.
///
/// Callers reject `cost == 0` before getting here; it is not a valid probe.
pub fn evaluate(prev_tat: Option<u64>, now: u64, rate: &Rate, cost: u64) -> Evaluation {
    debug_assert!(cost > 0, "zero-cost probes are rejected before evaluation");
    let interval = rate.emission_interval_ns();
    let tolerance = rate.tolerance_ns();
    let burst = u64::from(rate.burst());

    if cost > burst {
        // Larger than the bucket can ever hold: denied whatever the state.
        return Evaluation {
            new_tat: None,
            decision: Decision::denied(
                headroom(prev_tat, now, rate),
                RetryAfter::Never,
                drain_time(prev_tat, now),
            ),
        };
    }

    let tat = prev_tat.unwrap_or(now);
    let increment = interval.saturating_mul(cost);
    let candidate = tat.max(now).saturating_add(increment);

    // Earliest instant at which `cost` units could have been emitted while
    // staying within the burst depth.
    let allow_at = candidate.saturating_sub(tolerance);

    if allow_at <= now {
        let remaining =
            (now.saturating_add(tolerance).saturating_sub(candidate) / interval).min(burst);
        Evaluation {
            new_tat: Some(candidate),
            decision: Decision::allowed(remaining, Duration::from_nanos(candidate - now)),
        }
    } else {
        Evaluation {
            new_tat: None,
            decision: Decision::denied(
                headroom(prev_tat, now, rate),
                RetryAfter::After(Duration::from_nanos(allow_at - now)),
                drain_time(prev_tat, now),
            ),
        }
    }
}

/// Whole units currently admissible without committing anything.
fn headroom(prev_tat: Option<u64>, now: u64, rate: &Rate) -> u64 {
    let tat = prev_tat.unwrap_or(now);
    let slack = now.saturating_add(rate.tolerance_ns()).saturating_sub(tat);
    (slack / rate.emission_interval_ns()).min(u64::from(rate.burst()))
}

/// Time until the stored bucket drains, absent this request.
fn drain_time(prev_tat: Option<u64>, now: u64) -> Duration {
    Duration::from_nanos(prev_tat.map_or(0, |tat| tat.saturating_sub(now)))
}
