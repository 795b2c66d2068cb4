//! Redis-backed atomic store for `floodgate` (companion crate).
//!
//! One bucket is one Redis string key holding the theoretical arrival time.
//! Each decision is a single round trip: a server-side Lua script reads the
//! key, runs the same arithmetic as `floodgate::gcra::evaluate`, writes the
//! new state with its expiry, and replies with the decision. Redis executes
//! scripts atomically, so concurrent callers anywhere can never interleave
//! between the read and the write for a key.

use async_trait::async_trait;
use floodgate::{BucketStore, Decision, Rate, RetryAfter};
use redis::aio::ConnectionManager;
use redis::Script;
use std::sync::Arc;
use std::time::Duration;

const NANOS_PER_MICRO: u64 = 1_000;

/// Warn when caller and server clocks disagree by more than this. GCRA only
/// compares relative deltas, so small skew is harmless; large skew shifts
/// every admission boundary and is worth knowing about.
const SKEW_WARN_MICROS: u128 = 1_000_000;

/// The GCRA check-and-update, mirroring `floodgate::gcra::evaluate`.
///
/// KEYS[1]  bucket key
/// ARGV[1]  now, microseconds since the Unix epoch (caller's clock)
/// ARGV[2]  emission interval, microseconds
/// ARGV[3]  burst tolerance, microseconds
/// ARGV[4]  burst depth, units
/// ARGV[5]  cost, units
/// ARGV[6]  key TTL, milliseconds
///
/// Reply: {allowed, remaining, retry_after_us, reset_after_us, server_now_us}
/// with retry_after_us = -1 when the cost can never be admitted.
///
/// Everything stays in integer microseconds: Lua numbers are IEEE doubles,
/// exact only below 2^53, which epoch microseconds respect and epoch
/// nanoseconds would not. The stored TAT is written with %.0f for the same
/// reason; plain tostring falls back to exponent notation for values this
/// large.
const GCRA_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local interval = tonumber(ARGV[2])
local tolerance = tonumber(ARGV[3])
local burst = tonumber(ARGV[4])
local cost = tonumber(ARGV[5])
local ttl_ms = tonumber(ARGV[6])

local time = redis.call("TIME")
local server_now = tonumber(time[1]) * 1000000 + tonumber(time[2])

local tat = tonumber(redis.call("GET", key))
if not tat then
  tat = now
end

local headroom = math.floor((now + tolerance - tat) / interval)
if headroom < 0 then
  headroom = 0
elseif headroom > burst then
  headroom = burst
end

local reset = tat - now
if reset < 0 then
  reset = 0
end

if cost > burst then
  return {0, headroom, -1, reset, server_now}
end

local base = tat
if base < now then
  base = now
end
local candidate = base + cost * interval
local allow_at = candidate - tolerance

if allow_at > now then
  return {0, headroom, allow_at - now, reset, server_now}
end

redis.call("SET", key, string.format("%.0f", candidate), "PX", ttl_ms)

local remaining = math.floor((now + tolerance - candidate) / interval)
if remaining < 0 then
  remaining = 0
elseif remaining > burst then
  remaining = burst
end
return {1, remaining, 0, candidate - now, server_now}
"#;

/// Redis-backed [`BucketStore`]. Bring your own [`ConnectionManager`], or
/// let [`RedisStore::connect`] build one from a URL.
///
/// Cloning shares the underlying multiplexed connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    script: Arc<Script>,
    key_prefix: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("key_prefix", &self.key_prefix)
            .field("conn", &"<redis::aio::ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1/`) and build a store over a
    /// fresh connection manager.
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }

    /// Build a store over an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, script: Arc::new(Script::new(GCRA_SCRIPT)), key_prefix: String::new() }
    }

    /// Builder-style: prepend `prefix` to every bucket key, to keep limiter
    /// state in its own keyspace (`ratelimit:project:123`).
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn bucket_key(&self, key: &str) -> String {
        prefixed(&self.key_prefix, key)
    }
}

fn prefixed(prefix: &str, key: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + key.len());
    out.push_str(prefix);
    out.push_str(key);
    out
}

/// Script arguments in the units the script speaks (µs for time, ms for PX).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScriptArgs {
    now_us: u64,
    interval_us: u64,
    tolerance_us: u64,
    burst: u64,
    cost: u64,
    ttl_ms: u64,
}

fn script_args(rate: &Rate, now_ns: u64, cost: u64) -> ScriptArgs {
    let interval_us = (rate.emission_interval_ns() / NANOS_PER_MICRO).max(1);
    // Recomputed from the truncated interval so the script's arithmetic is
    // internally consistent.
    let tolerance_us = interval_us.saturating_mul(u64::from(rate.burst()));
    ScriptArgs {
        now_us: now_ns / NANOS_PER_MICRO,
        interval_us,
        tolerance_us,
        burst: u64::from(rate.burst()),
        cost,
        // PX is millisecond-granular; round up so a key never expires
        // before its bucket drains.
        ttl_ms: ((tolerance_us + 999) / 1_000).max(1),
    }
}

fn decision_from_reply(
    allowed: i64,
    remaining: u64,
    retry_after_us: i64,
    reset_after_us: u64,
) -> Decision {
    let reset_after = Duration::from_micros(reset_after_us);
    if allowed == 1 {
        Decision::allowed(remaining, reset_after)
    } else if retry_after_us < 0 {
        Decision::denied(remaining, RetryAfter::Never, reset_after)
    } else {
        let wait = Duration::from_micros(u64::try_from(retry_after_us).unwrap_or(0));
        Decision::denied(remaining, RetryAfter::After(wait), reset_after)
    }
}

#[async_trait]
impl BucketStore for RedisStore {
    type Error = redis::RedisError;

    async fn check_and_update(
        &self,
        key: &str,
        rate: &Rate,
        now_ns: u64,
        cost: u64,
    ) -> Result<Decision, redis::RedisError> {
        let args = script_args(rate, now_ns, cost);
        let mut conn = self.conn.clone();
        let (allowed, remaining, retry_after_us, reset_after_us, server_now_us): (
            i64,
            u64,
            i64,
            u64,
            u64,
        ) = self
            .script
            .key(self.bucket_key(key))
            .arg(args.now_us)
            .arg(args.interval_us)
            .arg(args.tolerance_us)
            .arg(args.burst)
            .arg(args.cost)
            .arg(args.ttl_ms)
            .invoke_async(&mut conn)
            .await?;

        let skew_us = i128::from(server_now_us) - i128::from(args.now_us);
        if skew_us.unsigned_abs() > SKEW_WARN_MICROS {
            tracing::warn!(
                target: "floodgate::redis",
                key,
                skew_ms = (skew_us / 1_000) as i64,
                "caller and Redis clocks disagree"
            );
        }

        Ok(decision_from_reply(allowed, remaining, retry_after_us, reset_after_us))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_convert_to_microseconds() {
        let rate = Rate::per_second(10).unwrap();
        let args = script_args(&rate, 2_000_000_500, 3);
        assert_eq!(args.now_us, 2_000_000); // sub-µs truncated
        assert_eq!(args.interval_us, 100_000);
        assert_eq!(args.tolerance_us, 1_000_000);
        assert_eq!(args.burst, 10);
        assert_eq!(args.cost, 3);
        assert_eq!(args.ttl_ms, 1_000);
    }

    #[test]
    fn ttl_rounds_up_and_never_hits_zero() {
        // 3 per second: tolerance 999_999µs rounds up to the full second.
        let rate = Rate::per_second(3).unwrap();
        let args = script_args(&rate, 0, 1);
        assert_eq!(args.tolerance_us, 999_999);
        assert_eq!(args.ttl_ms, 1_000);

        // Degenerate sub-µs interval still yields a live key.
        let rate = Rate::per_period(1_000_000_000, Duration::from_secs(1)).unwrap();
        let args = script_args(&rate, 0, 1);
        assert_eq!(args.interval_us, 1);
        assert!(args.ttl_ms >= 1);
    }

    #[test]
    fn reply_maps_to_decisions() {
        let d = decision_from_reply(1, 4, 0, 600_000);
        assert!(d.is_allowed());
        assert_eq!(d.remaining(), 4);
        assert_eq!(d.reset_after(), Duration::from_micros(600_000));

        let d = decision_from_reply(0, 0, 990_000, 1_000_000);
        assert!(!d.is_allowed());
        assert_eq!(d.retry_after(), RetryAfter::After(Duration::from_millis(990)));

        let d = decision_from_reply(0, 2, -1, 0);
        assert!(d.retry_after().is_never());
        assert_eq!(d.remaining(), 2);
    }

    #[test]
    fn key_prefix_is_prepended() {
        assert_eq!(prefixed("ratelimit:", "project:123"), "ratelimit:project:123");
        assert_eq!(prefixed("", "project:123"), "project:123");
    }
}
