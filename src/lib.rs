#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Floodgate 🌊
//!
//! Distributed rate limiting on GCRA (the Generic Cell Rate Algorithm, a
//! continuous-time leaky bucket) over a shared key-value store.
//!
//! ## Features
//!
//! - **Pure evaluator**: the GCRA math is one stateless function of
//!   (stored state, now, rate, cost) — integer nanoseconds throughout
//! - **Atomic stores**: the read-evaluate-write round trip is indivisible
//!   per key, so arbitrarily many processes can share one limit with no
//!   locks and no in-memory state that must survive restarts
//! - **Deterministic clocks**: inject a [`ManualClock`] and test admission
//!   boundaries exactly, no sleeps
//! - **Honest failures**: a store outage is an error, never an implicit
//!   allow or deny
//!
//! The Redis-backed store (one Lua script per decision) lives in the
//! companion `floodgate-redis` crate.
//!
//! ## Quick Start
//!
//! ```rust
//! use floodgate::{MemoryStore, Rate, RateLimiter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let limiter = RateLimiter::new(MemoryStore::new());
//!     let rate = Rate::per_second(10)?.with_burst(20)?;
//!
//!     let decision = limiter.allow("project:123", &rate).await?;
//!     if decision.is_allowed() {
//!         // proceed; decision.remaining() feeds X-RateLimit-Remaining
//!     } else {
//!         // back off; decision.retry_after_secs() feeds Retry-After
//!     }
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod decision;
pub mod error;
pub mod gcra;
pub mod limiter;
pub mod rate;
pub mod store;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{Decision, RetryAfter};
pub use error::{LimiterError, RateError};
pub use limiter::RateLimiter;
pub use rate::Rate;
pub use store::{BucketStore, MemoryStore};
