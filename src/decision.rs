//! The decision returned to callers: computed fresh per call, never stored.

use std::time::Duration;

/// When a denied request could next be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RetryAfter {
    /// The request was allowed; there is nothing to wait for.
    Ready,
    /// Earliest delay after which an identical request could be admitted.
    /// Useful for `Retry-After` headers.
    After(Duration),
    /// The request can never be admitted under this rate: its cost exceeds
    /// the bucket's burst depth, so no amount of waiting helps.
    Never,
}

impl RetryAfter {
    /// The wait duration, if one exists.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::After(d) => Some(*d),
            Self::Ready | Self::Never => None,
        }
    }

    /// Check whether the request is unsatisfiable at any time.
    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }
}

/// The result of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    allowed: bool,
    remaining: u64,
    retry_after: RetryAfter,
    reset_after: Duration,
}

impl Decision {
    /// Build an allowed decision. `remaining` is the headroom left after
    /// this call's consumption.
    pub fn allowed(remaining: u64, reset_after: Duration) -> Self {
        Self { allowed: true, remaining, retry_after: RetryAfter::Ready, reset_after }
    }

    /// Build a denied decision. Denials never consume quota, so `remaining`
    /// reports the headroom that exists without this call.
    pub fn denied(remaining: u64, retry_after: RetryAfter, reset_after: Duration) -> Self {
        Self { allowed: false, remaining, retry_after, reset_after }
    }

    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Whole units still admissible. Feeds `X-RateLimit-Remaining`.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// When to retry, for denied requests.
    pub fn retry_after(&self) -> RetryAfter {
        self.retry_after
    }

    /// `Retry-After` header value in whole seconds, rounded up so callers
    /// never retry early. `None` when allowed or never satisfiable.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after.as_duration().map(|d| {
            let secs = d.as_secs();
            if d.subsec_nanos() > 0 { secs + 1 } else { secs }
        })
    }

    /// Time until the bucket fully drains.
    pub fn reset_after(&self) -> Duration {
        self.reset_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_decision_has_nothing_to_wait_for() {
        let d = Decision::allowed(3, Duration::from_millis(700));
        assert!(d.is_allowed());
        assert_eq!(d.remaining(), 3);
        assert_eq!(d.retry_after(), RetryAfter::Ready);
        assert_eq!(d.retry_after_secs(), None);
        assert_eq!(d.reset_after(), Duration::from_millis(700));
    }

    #[test]
    fn denied_decision_reports_wait() {
        let d = Decision::denied(0, RetryAfter::After(Duration::from_millis(990)), Duration::from_secs(1));
        assert!(!d.is_allowed());
        assert_eq!(d.retry_after().as_duration(), Some(Duration::from_millis(990)));
    }

    #[test]
    fn retry_after_secs_rounds_up() {
        let d = Decision::denied(0, RetryAfter::After(Duration::from_millis(1_200)), Duration::ZERO);
        assert_eq!(d.retry_after_secs(), Some(2));

        let d = Decision::denied(0, RetryAfter::After(Duration::from_secs(3)), Duration::ZERO);
        assert_eq!(d.retry_after_secs(), Some(3));
    }

    #[test]
    fn never_has_no_finite_wait() {
        let d = Decision::denied(0, RetryAfter::Never, Duration::ZERO);
        assert!(d.retry_after().is_never());
        assert_eq!(d.retry_after().as_duration(), None);
        assert_eq!(d.retry_after_secs(), None);
    }
}
