//! Minimal async key-value backend abstraction used by the session and
//! ticket stores (components G and H). Kept narrow on purpose: both stores
//! only ever GET/SET-with-TTL/DEL a single opaque blob per key.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Backend errors are never propagated to callers of G/H — they're logged
/// at `warn` and treated as a cache miss, matching the Python original's
/// swallow-and-return-None behavior.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("kv backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;
    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), KvError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError>;
    async fn del(&self, key: &str) -> Result<(), KvError>;
}

/// Redis-backed implementation. Uses `ConnectionManager`, which reconnects
/// and retries transparently, so no manual retry loop is needed here.
pub struct RedisKvBackend {
    conn: ConnectionManager,
}

impl RedisKvBackend {
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url)
            .map_err(|e| KvError::Unavailable(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| KvError::Unavailable(format!("redis connect failed: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvBackend for RedisKvBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| KvError::Unavailable(e.to_string()))
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs)
            .await
            .map_err(|e| KvError::Unavailable(e.to_string()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(|e| KvError::Unavailable(e.to_string()))
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| KvError::Unavailable(e.to_string()))
    }
}

/// In-process fake used by the session/ticket store test suites. TTLs are
/// tracked but never actually expire entries in the background — tests that
/// care about expiry check `expired_at` directly.
#[derive(Default)]
pub struct InMemoryKvBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl KvBackend for InMemoryKvBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, _ttl: Duration) -> Result<(), KvError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), KvError> {
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
