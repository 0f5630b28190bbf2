//! Redis-backed WHY-prompt ticket store (component H).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reelix_core::blob::{gunzip_json, gzip_json};
use reelix_core::config::SessionConfig;
use reelix_core::kv::KvBackend;
use reelix_core::{QueryId, ReelixError, Result, Ticket, UserId};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TicketEnvelope {
    #[serde(rename = "__kind")]
    kind: String,
    #[serde(rename = "__created_at")]
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    ticket: Ticket,
}

pub struct TicketStore {
    backend: Arc<dyn KvBackend>,
    sliding_ttl: Duration,
    absolute_ttl: Duration,
}

impl TicketStore {
    pub fn new(backend: Arc<dyn KvBackend>, config: &SessionConfig) -> Self {
        Self {
            backend,
            sliding_ttl: Duration::from_secs(config.ticket_sliding_ttl_sec),
            absolute_ttl: Duration::from_secs(config.ticket_absolute_ttl_sec),
        }
    }

    fn ttl_for(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let elapsed = (now - created_at).to_std().unwrap_or_default();
        let absolute_remaining = self.absolute_ttl.saturating_sub(elapsed);
        self.sliding_ttl.min(absolute_remaining).max(Duration::from_secs(1))
    }

    pub async fn put(&self, query_id: &QueryId, ticket: &Ticket, now: DateTime<Utc>) {
        let envelope = TicketEnvelope {
            kind: "ticket".to_string(),
            created_at: ticket.created_at,
            ticket: ticket.clone(),
        };

        let blob = match gzip_json(&envelope) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(query_id = %query_id, error = %e, "failed to encode ticket");
                return;
            }
        };

        let ttl = self.ttl_for(ticket.created_at, now);
        if let Err(e) = self.backend.set_ex(&query_id.ticket_key(), blob, ttl).await {
            warn!(query_id = %query_id, error = %e, "ticket store write failed");
        }
    }

    async fn read_envelope(&self, query_id: &QueryId) -> Option<TicketEnvelope> {
        let bytes = match self.backend.get(&query_id.ticket_key()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(query_id = %query_id, error = %e, "ticket store read failed");
                return None;
            }
        };

        match gunzip_json::<TicketEnvelope>(&bytes) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!(query_id = %query_id, error = %e, "ticket decode failed");
                None
            }
        }
    }

    /// Fetch a ticket, enforcing that it belongs to `caller`. Returns
    /// `TicketNotFound` if absent and `TicketForbidden` if owned by someone
    /// else — the two must stay distinguishable for the error policy (§7).
    pub async fn get(&self, query_id: &QueryId, caller: &UserId) -> Result<Ticket> {
        let envelope = self.read_envelope(query_id).await.ok_or_else(|| {
            ReelixError::TicketNotFound {
                query_id: query_id.as_str().to_string(),
            }
        })?;

        if &envelope.ticket.user_id != caller {
            return Err(ReelixError::TicketForbidden {
                query_id: query_id.as_str().to_string(),
            });
        }

        Ok(envelope.ticket)
    }

    /// Renew the sliding TTL without rewriting content.
    pub async fn touch(&self, query_id: &QueryId, now: DateTime<Utc>) {
        let Some(envelope) = self.read_envelope(query_id).await else {
            return;
        };
        let ttl = self.ttl_for(envelope.created_at, now);
        if let Err(e) = self.backend.expire(&query_id.ticket_key(), ttl).await {
            warn!(query_id = %query_id, error = %e, "ticket touch failed");
        }
    }

    pub async fn delete(&self, query_id: &QueryId) {
        if let Err(e) = self.backend.del(&query_id.ticket_key()).await {
            warn!(query_id = %query_id, error = %e, "ticket store delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelix_core::kv::InMemoryKvBackend;
    use reelix_core::{EnvelopeOutput, PromptsEnvelope};
    use serde_json::Map;

    fn config() -> SessionConfig {
        SessionConfig {
            sliding_ttl_sec: 900,
            absolute_ttl_sec: 3600,
            ticket_sliding_ttl_sec: 900,
            ticket_absolute_ttl_sec: 3600,
            seen_ids_cap: 200,
        }
    }

    fn sample_ticket(user_id: UserId, now: DateTime<Utc>) -> Ticket {
        Ticket {
            user_id,
            prompts: PromptsEnvelope {
                model: "gpt-4o-mini".to_string(),
                params: Map::new(),
                output: EnvelopeOutput {
                    format: "jsonl".to_string(),
                    schema_version: "1".to_string(),
                },
                calls: Vec::new(),
                prompt_hash: "deadbeef".to_string(),
                created_at: now,
            },
            created_at: now,
            meta: None,
        }
    }

    #[tokio::test]
    async fn round_trips() {
        let backend = Arc::new(InMemoryKvBackend::new());
        let store = TicketStore::new(backend, &config());
        let now = Utc::now();
        let query_id = QueryId::new();
        let owner = UserId::from("alice");

        store.put(&query_id, &sample_ticket(owner.clone(), now), now).await;

        let fetched = store.get(&query_id, &owner).await.unwrap();
        assert_eq!(fetched.user_id, owner);
    }

    #[tokio::test]
    async fn enforces_ownership() {
        let backend = Arc::new(InMemoryKvBackend::new());
        let store = TicketStore::new(backend, &config());
        let now = Utc::now();
        let query_id = QueryId::new();
        let owner = UserId::from("alice");

        store.put(&query_id, &sample_ticket(owner, now), now).await;

        let err = store.get(&query_id, &UserId::from("mallory")).await.unwrap_err();
        assert_eq!(err.code(), "TICKET_FORBIDDEN");
    }

    #[tokio::test]
    async fn missing_ticket_is_not_found() {
        let backend = Arc::new(InMemoryKvBackend::new());
        let store = TicketStore::new(backend, &config());
        let err = store
            .get(&QueryId::new(), &UserId::from("alice"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TICKET_NOT_FOUND");
    }

    #[tokio::test]
    async fn delete_removes_ticket() {
        let backend = Arc::new(InMemoryKvBackend::new());
        let store = TicketStore::new(backend, &config());
        let now = Utc::now();
        let query_id = QueryId::new();
        let owner = UserId::from("alice");

        store.put(&query_id, &sample_ticket(owner.clone(), now), now).await;
        store.delete(&query_id).await;

        let err = store.get(&query_id, &owner).await.unwrap_err();
        assert_eq!(err.code(), "TICKET_NOT_FOUND");
    }
}
