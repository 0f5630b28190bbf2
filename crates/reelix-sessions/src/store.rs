//! Redis-backed session state store (component G).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reelix_core::blob::{gunzip_json, gzip_json};
use reelix_core::config::SessionConfig;
use reelix_core::kv::KvBackend;
use reelix_core::{MemoryDelta, SessionId, SessionState, UserId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::merge::apply_delta_to_payload;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionEnvelope {
    #[serde(rename = "__kind")]
    kind: String,
    #[serde(rename = "__created_at")]
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    state: SessionState,
}

pub struct SessionStore {
    backend: Arc<dyn KvBackend>,
    sliding_ttl: Duration,
    absolute_ttl: Duration,
    seen_ids_cap: usize,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KvBackend>, config: &SessionConfig) -> Self {
        Self {
            backend,
            sliding_ttl: Duration::from_secs(config.sliding_ttl_sec),
            absolute_ttl: Duration::from_secs(config.absolute_ttl_sec),
            seen_ids_cap: config.seen_ids_cap,
        }
    }

    /// Fetch session state. A decode failure (corrupt blob, schema drift) is
    /// logged and treated as an absent session rather than surfaced as an
    /// error — a fresh session is a safe fallback, a hard error is not.
    pub async fn get(&self, session_id: &SessionId) -> Option<SessionState> {
        let key = session_id.store_key();
        let bytes = match self.backend.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "session store read failed");
                return None;
            }
        };

        match gunzip_json::<SessionEnvelope>(&bytes) {
            Ok(envelope) => Some(envelope.state),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "session state decode failed, treating as absent");
                None
            }
        }
    }

    /// Persist session state with a sliding TTL capped by the absolute TTL
    /// measured from the session's `created_at`.
    pub async fn put(&self, session_id: &SessionId, state: &SessionState, now: DateTime<Utc>) {
        let envelope = SessionEnvelope {
            kind: "session".to_string(),
            created_at: state.created_at,
            state: state.clone(),
        };

        let blob = match gzip_json(&envelope) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "failed to encode session state");
                return;
            }
        };

        let elapsed = (now - state.created_at).to_std().unwrap_or_default();
        let absolute_remaining = self.absolute_ttl.saturating_sub(elapsed);
        let ttl = self.sliding_ttl.min(absolute_remaining).max(Duration::from_secs(1));

        if let Err(e) = self.backend.set_ex(&session_id.store_key(), blob, ttl).await {
            warn!(session_id = %session_id, error = %e, "session store write failed");
        }
    }

    pub async fn delete(&self, session_id: &SessionId) {
        if let Err(e) = self.backend.del(&session_id.store_key()).await {
            warn!(session_id = %session_id, error = %e, "session store delete failed");
        }
    }

    /// Renew the sliding TTL without rewriting content — mirrors
    /// `TicketStore::touch`, used by the SSE layer to slide a session's TTL
    /// on load without paying for a full read-merge-write.
    pub async fn touch(&self, session_id: &SessionId, created_at: DateTime<Utc>, now: DateTime<Utc>) {
        let elapsed = (now - created_at).to_std().unwrap_or_default();
        let absolute_remaining = self.absolute_ttl.saturating_sub(elapsed);
        let ttl = self.sliding_ttl.min(absolute_remaining).max(Duration::from_secs(1));
        if let Err(e) = self.backend.expire(&session_id.store_key(), ttl).await {
            warn!(session_id = %session_id, error = %e, "session touch failed");
        }
    }

    /// Read-merge-write a turn's memory delta, returning the merged state.
    pub async fn update(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        delta: &MemoryDelta,
        now: DateTime<Utc>,
    ) -> SessionState {
        let existing = self.get(session_id).await;
        let merged = apply_delta_to_payload(existing, user_id, delta, now, self.seen_ids_cap);
        self.put(session_id, &merged, now).await;
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelix_core::kv::InMemoryKvBackend;

    fn config() -> SessionConfig {
        SessionConfig {
            sliding_ttl_sec: 3600,
            absolute_ttl_sec: 7200,
            ticket_sliding_ttl_sec: 900,
            ticket_absolute_ttl_sec: 3600,
            seen_ids_cap: 200,
        }
    }

    #[tokio::test]
    async fn round_trips_through_backend() {
        let backend = Arc::new(InMemoryKvBackend::new());
        let store = SessionStore::new(backend, &config());
        let session_id = SessionId::from("s1".to_string());
        let user_id = UserId::from("alice");
        let now = Utc::now();

        let mut delta = MemoryDelta::default();
        delta.last_user_message = Some("recommend some sci-fi".to_string());

        let merged = store.update(&user_id, &session_id, &delta, now).await;
        assert_eq!(
            merged.summary.last_user_message.as_deref(),
            Some("recommend some sci-fi")
        );

        let fetched = store.get(&session_id).await.unwrap();
        assert_eq!(fetched.user_id, user_id);
        assert_eq!(
            fetched.summary.last_user_message.as_deref(),
            Some("recommend some sci-fi")
        );
    }

    #[tokio::test]
    async fn missing_session_returns_none() {
        let backend = Arc::new(InMemoryKvBackend::new());
        let store = SessionStore::new(backend, &config());
        let session_id = SessionId::from("missing".to_string());
        assert!(store.get(&session_id).await.is_none());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let backend = Arc::new(InMemoryKvBackend::new());
        let store = SessionStore::new(backend, &config());
        let session_id = SessionId::from("s2".to_string());
        let user_id = UserId::from("alice");
        let now = Utc::now();

        store.update(&user_id, &session_id, &MemoryDelta::default(), now).await;
        assert!(store.get(&session_id).await.is_some());

        store.delete(&session_id).await;
        assert!(store.get(&session_id).await.is_none());
    }
}
