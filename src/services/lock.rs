//! src/services/lock.rs
//!
//! Distributed mutual exclusion built on the cache store's set-if-absent
//! primitive. One lock key exists per (bucket, prefix); whoever creates it
//! owns the rebuild for that prefix until release or TTL expiry.
//!
//! Acquisition is a single non-blocking attempt. Losers poll for release at
//! a fixed interval bounded by a deadline; there is no wakeup signal, which
//! is acceptable for a 10-second bound (worst case 100 polls).

use crate::services::cache_store::CacheStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Poll interval while waiting for a contended lock to clear.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Opaque ownership token returned by a successful acquisition. Release
/// requires presenting it back, so a caller whose lock has expired and been
/// re-acquired by someone else cannot release the new holder's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Cross-process lock over a [`CacheStore`].
///
/// The cache store is the rendezvous point: coordination holds across
/// instances, not just within one process. When the cache is degraded every
/// acquisition fails, which funnels callers into their uncached fallback
/// paths rather than blocking.
#[derive(Clone)]
pub struct DistributedLock {
    cache: Arc<dyn CacheStore>,
}

impl DistributedLock {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Try once to take the lock. Returns the ownership token iff this
    /// caller created the key.
    pub async fn acquire(&self, lock_key: &str, ttl: Duration) -> Option<LockToken> {
        let token = LockToken::generate();
        if self
            .cache
            .set_if_absent_with_ttl(lock_key, token.as_str(), ttl)
            .await
        {
            debug!(lock_key, "lock acquired");
            Some(token)
        } else {
            None
        }
    }

    /// Release the lock if we still hold it (compare-and-delete on the
    /// token). A lock that expired and was re-acquired by another caller is
    /// left alone. Idempotent.
    pub async fn release(&self, lock_key: &str, token: &LockToken) -> bool {
        let released = self.cache.delete_if_equals(lock_key, token.as_str()).await;
        debug!(lock_key, released, "lock release");
        released
    }

    /// Poll until the lock key disappears or `max_wait` elapses. True as
    /// soon as the key is absent; false at the deadline.
    pub async fn wait_for_release(&self, lock_key: &str, max_wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + max_wait;
        let mut polls = 0u32;
        loop {
            if !self.cache.exists(lock_key).await {
                debug!(lock_key, polls, "lock released");
                return true;
            }
            polls += 1;
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                debug!(lock_key, polls, "lock wait timed out");
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
