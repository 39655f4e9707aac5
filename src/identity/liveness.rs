//! Liveness register: identity -> currently sanctioned token, with a TTL
//! mirroring the token lifetime. This is the single source of cross-process
//! session truth; a signed token the register no longer attests is dead no
//! matter what its signature says.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

fn register_key(identity: &str) -> String {
    format!("JWT_TOKEN:{}", identity)
}

/// One live-token slot per identity. `put` overwrites unconditionally and
/// `delete` is idempotent; per-key atomicity comes from the backing store.
#[async_trait]
pub trait LivenessRegister: Send + Sync {
    async fn put(&self, identity: &str, token: &str, ttl: Duration) -> Result<()>;
    /// Returns the attested token, or None when no session is live.
    /// Backend failures degrade to None (fail closed), never to an error.
    async fn get(&self, identity: &str) -> Option<String>;
    async fn delete(&self, identity: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Redis-backed register (shared across processes)
// ---------------------------------------------------------------------------

pub struct RedisRegister {
    client: redis::Client,
    conn: tokio::sync::Mutex<Option<MultiplexedConnection>>,
}

impl RedisRegister {
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).with_context(|| format!("invalid redis url: {}", url))?;
        Ok(Self { client, conn: tokio::sync::Mutex::new(None) })
    }

    // Lazily establish and cache the multiplexed connection; drop the cache
    // on command failure so the next call reconnects.
    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            let conn = self
                .client
                .get_multiplexed_async_connection()
                .await
                .context("redis connection failed")?;
            *guard = Some(conn);
        }
        Ok(guard.as_ref().unwrap().clone())
    }

    async fn invalidate_connection(&self) {
        *self.conn.lock().await = None;
    }
}

#[async_trait]
impl LivenessRegister for RedisRegister {
    async fn put(&self, identity: &str, token: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        let res: redis::RedisResult<()> =
            conn.set_ex(register_key(identity), token, ttl.as_secs().max(1)).await;
        if let Err(e) = res {
            self.invalidate_connection().await;
            return Err(e).context("redis SET EX failed");
        }
        Ok(())
    }

    async fn get(&self, identity: &str) -> Option<String> {
        let mut conn = match self.connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!(identity, error = %e, "liveness register unreachable; treating session as not live");
                return None;
            }
        };
        match conn.get::<_, Option<String>>(register_key(identity)).await {
            Ok(v) => v,
            Err(e) => {
                self.invalidate_connection().await;
                warn!(identity, error = %e, "liveness lookup failed; treating session as not live");
                None
            }
        }
    }

    async fn delete(&self, identity: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let res: redis::RedisResult<()> = conn.del(register_key(identity)).await;
        if let Err(e) = res {
            self.invalidate_connection().await;
            return Err(e).context("redis DEL failed");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-process register (tests, single-node deployments)
// ---------------------------------------------------------------------------

struct Entry {
    token: String,
    expires_at: Instant,
}

/// Instant-based TTL map with prune-on-get. Same observable contract as the
/// redis register, minus cross-process sharing.
#[derive(Default)]
pub struct MemoryRegister {
    map: RwLock<HashMap<String, Entry>>,
}

impl MemoryRegister {
    pub fn new() -> Self { Self { map: RwLock::new(HashMap::new()) } }

    /// Remove expired entries. Returns number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut w = self.map.write();
        let before = w.len();
        w.retain(|_, e| e.expires_at > now);
        before - w.len()
    }

    pub fn len(&self) -> usize { self.map.read().len() }
    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }
}

#[async_trait]
impl LivenessRegister for MemoryRegister {
    async fn put(&self, identity: &str, token: &str, ttl: Duration) -> Result<()> {
        let entry = Entry { token: token.to_string(), expires_at: Instant::now() + ttl };
        self.map.write().insert(register_key(identity), entry);
        Ok(())
    }

    async fn get(&self, identity: &str) -> Option<String> {
        let key = register_key(identity);
        {
            let r = self.map.read();
            match r.get(&key) {
                Some(e) if e.expires_at > Instant::now() => return Some(e.token.clone()),
                Some(_) => {} // expired, prune below
                None => return None,
            }
        }
        // Re-check under the write lock: a concurrent put may have replaced
        // the expired entry between the two lock acquisitions, and that
        // fresh entry must not be pruned.
        let mut w = self.map.write();
        match w.get(&key) {
            Some(e) if e.expires_at > Instant::now() => Some(e.token.clone()),
            Some(_) => {
                w.remove(&key);
                None
            }
            None => None,
        }
    }

    async fn delete(&self, identity: &str) -> Result<()> {
        self.map.write().remove(&register_key(identity));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let reg = MemoryRegister::new();
        reg.put("a@x.com", "tok1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(reg.get("a@x.com").await.as_deref(), Some("tok1"));
        reg.delete("a@x.com").await.unwrap();
        assert_eq!(reg.get("a@x.com").await, None);
        // idempotent delete
        reg.delete("a@x.com").await.unwrap();
    }

    #[tokio::test]
    async fn put_overwrites_prior_entry() {
        let reg = MemoryRegister::new();
        reg.put("a@x.com", "tok1", Duration::from_secs(60)).await.unwrap();
        reg.put("a@x.com", "tok2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(reg.get("a@x.com").await.as_deref(), Some("tok2"));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn entries_expire() {
        let reg = MemoryRegister::new();
        reg.put("a@x.com", "tok1", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(reg.get("a@x.com").await, None);
        assert!(reg.is_empty(), "expired entry should be pruned on get");
    }

    #[tokio::test]
    async fn sweep_drops_only_expired() {
        let reg = MemoryRegister::new();
        reg.put("a@x.com", "t", Duration::from_millis(10)).await.unwrap();
        reg.put("b@x.com", "t", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(reg.sweep(), 1);
        assert_eq!(reg.get("b@x.com").await.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn prune_never_deletes_a_concurrently_refreshed_entry() {
        // A get that observes an expired entry must not delete a fresh entry
        // written between its lock acquisitions; the refreshed token stays
        // attested no matter how the prune interleaves.
        let reg = std::sync::Arc::new(MemoryRegister::new());
        for round in 0..50u32 {
            reg.put("a@x.com", "stale", Duration::from_millis(1)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;

            // Readers racing the refresh below, each likely to see the
            // expired entry first.
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let r = reg.clone();
                    tokio::spawn(async move { r.get("a@x.com").await })
                })
                .collect();

            let fresh = format!("fresh-{}", round);
            reg.put("a@x.com", &fresh, Duration::from_secs(60)).await.unwrap();
            for h in readers {
                h.await.unwrap();
            }
            assert_eq!(
                reg.get("a@x.com").await.as_deref(),
                Some(fresh.as_str()),
                "entry refreshed during pruning must stay attested"
            );
        }
    }

    #[tokio::test]
    async fn unreachable_redis_fails_closed_on_get() {
        // Nothing listens on this port; get must degrade to None, not error.
        let reg = RedisRegister::new("redis://127.0.0.1:1/").unwrap();
        assert_eq!(reg.get("a@x.com").await, None);
        assert!(reg.put("a@x.com", "tok", Duration::from_secs(1)).await.is_err());
    }
}
