//! src/services/cache_store.rs
//!
//! Redis-backed key-value cache with TTLs, pipelined batch writes, and the
//! atomic set-if-absent primitive the distributed lock is built on.
//!
//! Every operation is infallible at the signature level: when Redis is
//! disabled or unreachable the store degrades to absent/false/empty results
//! instead of raising, so callers treat a dead cache as a valid always-miss
//! mode and their control flow stays plain conditionals.

use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult, aio::ConnectionManager};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Lua compare-and-delete: remove the key only while it still holds the
/// caller's value. Used for token-checked lock release.
const COMPARE_AND_DELETE: &str =
    "if redis.call('get', KEYS[1]) == ARGV[1] then return redis.call('del', KEYS[1]) else return 0 end";

/// Key-value cache contract consumed by the pagination engine and the lock.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// True when the backing store answers a ping. A degraded store is not
    /// an error condition; listing just runs uncached.
    async fn healthy(&self) -> bool;

    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool;

    /// Pipelined multi-set with a shared TTL. Partial application on a failed
    /// pipeline is acceptable: entries are independently keyed and
    /// idempotently rebuildable.
    async fn set_batch_with_ttl(&self, entries: Vec<(String, Vec<u8>)>, ttl: Duration) -> bool;

    async fn delete(&self, keys: &[String]) -> bool;

    async fn exists(&self, key: &str) -> bool;

    /// Remaining TTL in seconds; -1 for no expiry, -2 for an absent key
    /// (Redis TTL conventions).
    async fn ttl(&self, key: &str) -> i64;

    async fn keys_matching(&self, pattern: &str) -> Vec<String>;

    /// Atomic SET NX EX. True iff this caller created the key.
    async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> bool;

    /// Delete the key only if it currently holds `value`. True iff deleted.
    async fn delete_if_equals(&self, key: &str, value: &str) -> bool;
}

/// Redis-backed [`CacheStore`].
///
/// The connection is established lazily on first use and shared afterwards;
/// the tokio connection manager reconnects on its own after network drops.
/// Constructing with `url: None` yields a permanently-degraded store (cache
/// disabled by configuration).
pub struct RedisCacheStore {
    url: Option<String>,
    conn: Mutex<Option<ConnectionManager>>,
}

impl RedisCacheStore {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            conn: Mutex::new(None),
        }
    }

    /// Get the shared connection, dialing it on first use. Returns `None`
    /// when the cache is disabled or the dial fails; failures are retried on
    /// the next call.
    async fn conn(&self) -> Option<ConnectionManager> {
        let url = self.url.as_deref()?;
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Some(conn.clone());
        }
        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(err) => {
                warn!("invalid redis url: {err}");
                return None;
            }
        };
        match client.get_connection_manager().await {
            Ok(conn) => {
                debug!("redis connection established");
                *guard = Some(conn.clone());
                Some(conn)
            }
            Err(err) => {
                warn!("redis unavailable, running uncached: {err}");
                None
            }
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn healthy(&self) -> bool {
        let Some(mut conn) = self.conn().await else {
            return false;
        };
        let res: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        res.is_ok()
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut conn = self.conn().await?;
        let res: RedisResult<Option<Vec<u8>>> = conn.get(key).await;
        match res {
            Ok(value) => value,
            Err(err) => {
                warn!(key, "cache get failed: {err}");
                None
            }
        }
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool {
        let Some(mut conn) = self.conn().await else {
            return false;
        };
        let res: RedisResult<()> = conn.set_ex(key, value, ttl.as_secs()).await;
        if let Err(err) = &res {
            warn!(key, "cache set failed: {err}");
        }
        res.is_ok()
    }

    async fn set_batch_with_ttl(&self, entries: Vec<(String, Vec<u8>)>, ttl: Duration) -> bool {
        if entries.is_empty() {
            return true;
        }
        let Some(mut conn) = self.conn().await else {
            return false;
        };
        let mut pipe = redis::pipe();
        for (key, value) in &entries {
            pipe.set_ex(key, value.as_slice(), ttl.as_secs()).ignore();
        }
        let res: RedisResult<()> = pipe.query_async(&mut conn).await;
        if let Err(err) = &res {
            warn!(entries = entries.len(), "cache batch set failed: {err}");
        }
        res.is_ok()
    }

    async fn delete(&self, keys: &[String]) -> bool {
        if keys.is_empty() {
            return true;
        }
        let Some(mut conn) = self.conn().await else {
            return false;
        };
        let res: RedisResult<()> = conn.del(keys).await;
        if let Err(err) = &res {
            warn!("cache delete failed: {err}");
        }
        res.is_ok()
    }

    async fn exists(&self, key: &str) -> bool {
        let Some(mut conn) = self.conn().await else {
            return false;
        };
        let res: RedisResult<bool> = conn.exists(key).await;
        res.unwrap_or(false)
    }

    async fn ttl(&self, key: &str) -> i64 {
        let Some(mut conn) = self.conn().await else {
            return -2;
        };
        let res: RedisResult<i64> = conn.ttl(key).await;
        res.unwrap_or(-2)
    }

    async fn keys_matching(&self, pattern: &str) -> Vec<String> {
        let Some(mut conn) = self.conn().await else {
            return Vec::new();
        };
        let res: RedisResult<Vec<String>> = conn.keys(pattern).await;
        match res {
            Ok(keys) => keys,
            Err(err) => {
                warn!(pattern, "cache key scan failed: {err}");
                Vec::new()
            }
        }
    }

    async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let Some(mut conn) = self.conn().await else {
            return false;
        };
        let res: RedisResult<Option<String>> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await;
        match res {
            Ok(reply) => reply.is_some(),
            Err(err) => {
                warn!(key, "cache set-if-absent failed: {err}");
                false
            }
        }
    }

    async fn delete_if_equals(&self, key: &str, value: &str) -> bool {
        let Some(mut conn) = self.conn().await else {
            return false;
        };
        let res: RedisResult<i64> = redis::Script::new(COMPARE_AND_DELETE)
            .key(key)
            .arg(value)
            .invoke_async(&mut conn)
            .await;
        match res {
            Ok(deleted) => deleted > 0,
            Err(err) => {
                warn!(key, "cache compare-and-delete failed: {err}");
                false
            }
        }
    }
}

/// In-memory [`CacheStore`] for tests.
///
/// Entries live in a `HashMap` behind a mutex so the atomic primitives
/// (set-if-absent, compare-and-delete) hold under concurrent test tasks.
/// Expiry uses `tokio::time::Instant`, so paused-clock tests can advance
/// time past a TTL deterministically.
#[cfg(test)]
pub struct MemoryCacheStore {
    entries: Mutex<std::collections::HashMap<String, (Vec<u8>, Option<tokio::time::Instant>)>>,
}

#[cfg(test)]
impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn expired(deadline: &Option<tokio::time::Instant>) -> bool {
        deadline.is_some_and(|d| tokio::time::Instant::now() >= d)
    }

    fn deadline(ttl: Duration) -> Option<tokio::time::Instant> {
        Some(tokio::time::Instant::now() + ttl)
    }
}

/// Minimal glob support: a literal prefix with one trailing-or-embedded `*`.
/// That covers every pattern the engine issues (`s3:page:{...}:*`, `s3:*`).
#[cfg(test)]
fn glob_match(pattern: &str, key: &str) -> bool {
    match pattern.split_once('*') {
        Some((head, tail)) => {
            key.len() >= head.len() + tail.len() && key.starts_with(head) && key.ends_with(tail)
        }
        None => pattern == key,
    }
}

#[cfg(test)]
#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn healthy(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((_, deadline)) if Self::expired(deadline) => {
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value, Self::deadline(ttl)));
        true
    }

    async fn set_batch_with_ttl(&self, batch: Vec<(String, Vec<u8>)>, ttl: Duration) -> bool {
        let mut entries = self.entries.lock().await;
        for (key, value) in batch {
            entries.insert(key, (value, Self::deadline(ttl)));
        }
        true
    }

    async fn delete(&self, keys: &[String]) -> bool {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(key);
        }
        true
    }

    async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    async fn ttl(&self, key: &str) -> i64 {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some((_, Some(deadline))) => {
                let now = tokio::time::Instant::now();
                if *deadline <= now {
                    -2
                } else {
                    (*deadline - now).as_secs() as i64
                }
            }
            Some((_, None)) => -1,
            None => -2,
        }
    }

    async fn keys_matching(&self, pattern: &str) -> Vec<String> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|(key, (_, deadline))| !Self::expired(deadline) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((_, deadline)) if !Self::expired(deadline) => false,
            _ => {
                entries.insert(
                    key.to_string(),
                    (value.as_bytes().to_vec(), Self::deadline(ttl)),
                );
                true
            }
        }
    }

    async fn delete_if_equals(&self, key: &str, value: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((held, deadline)) if !Self::expired(deadline) && held == value.as_bytes() => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }
}
