//! Storage seam: where the read-evaluate-write becomes atomic.
//!
//! The trait sits at the check-and-update level rather than get/set because
//! distributed backends evaluate server-side (a Redis Lua script, for
//! instance). What the contract requires is the observable guarantee, not
//! the primitive: per key, no concurrent caller ever sees a state between
//! this call's read and its write.

use crate::decision::Decision;
use crate::gcra;
use crate::rate::Rate;
use async_trait::async_trait;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

/// Abstract bucket storage.
///
/// Implementations hold one theoretical-arrival-time value per key and make
/// the read-evaluate-write sequence indivisible per key. The expiry
/// (`rate.ttl()`) is attached in the same operation, so idle keys vanish on
/// their own.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Atomically read the bucket for `key`, evaluate a request of `cost`
    /// units at `now_ns`, persist the new state with its expiry, and return
    /// the decision. Exactly one round trip; no partial state may ever be
    /// observable or survive a cancelled call.
    async fn check_and_update(
        &self,
        key: &str,
        rate: &Rate,
        now_ns: u64,
        cost: u64,
    ) -> Result<Decision, Self::Error>;
}

#[derive(Debug, Clone, Copy)]
struct StoredBucket {
    tat_ns: u64,
    expires_at_ns: u64,
}

/// In-process store: a mutex-guarded map of bucket state.
///
/// Suitable for tests and single-process deployments. Expiry is honored on
/// read; a shared store does the equivalent eviction server-side, here the
/// owner calls [`purge_expired`](MemoryStore::purge_expired) whenever it
/// wants the map itself shrunk.
#[derive(Default, Clone, Debug)]
pub struct MemoryStore {
    buckets: Arc<Mutex<HashMap<String, StoredBucket>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries whose TTL has lapsed.
    pub fn purge_expired(&self, now_ns: u64) {
        let mut buckets = self.buckets.lock().unwrap();
        buckets.retain(|_, bucket| bucket.expires_at_ns > now_ns);
    }

    /// Number of live entries (including any not yet purged).
    pub fn len(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BucketStore for MemoryStore {
    type Error = Infallible;

    async fn check_and_update(
        &self,
        key: &str,
        rate: &Rate,
        now_ns: u64,
        cost: u64,
    ) -> Result<Decision, Infallible> {
        let mut buckets = self.buckets.lock().unwrap();
        let prev_tat = buckets
            .get(key)
            .filter(|bucket| bucket.expires_at_ns > now_ns)
            .map(|bucket| bucket.tat_ns);
        let eval = gcra::evaluate(prev_tat, now_ns, rate, cost);
        if let Some(tat_ns) = eval.new_tat {
            buckets.insert(
                key.to_string(),
                StoredBucket { tat_ns, expires_at_ns: now_ns.saturating_add(rate.tolerance_ns()) },
            );
        }
        Ok(eval.decision)
    }
}
