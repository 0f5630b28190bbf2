//! Shared fixtures for the route-handler test modules (§4.L, §8). Only
//! compiled under `#[cfg(test)]` — never part of the production binary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reelix_core::config::{AuthConfig, AuthMode, ReelixConfig, SessionConfig};
use reelix_core::kv::{InMemoryKvBackend, KvBackend};
use reelix_core::{Candidate, MediaType};
use reelix_curator::CuratorEvaluator;
use reelix_llm::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use reelix_pipeline::RecommendationPipeline;
use reelix_reflection::ReflectionAgent;
use reelix_retrieval::bm25::SparseVector;
use reelix_retrieval::filter::RetrievalFilter;
use reelix_retrieval::{DenseEmbedder, EncodeError, Encoder, RetrievalError, VectorRetriever};
use reelix_runner::RecommendationRunner;
use reelix_sessions::SessionStore;
use reelix_tickets::TicketStore;

use crate::app::AppState;

/// Always errors — enough to exercise the pre-stream setup path without a
/// real model behind it.
pub struct UnavailableProvider;

#[async_trait]
impl LlmProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::Unavailable("stub provider has no backend".to_string()))
    }
}

pub struct UnavailableEmbedder;

#[async_trait]
impl DenseEmbedder for UnavailableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EncodeError> {
        Err(EncodeError::DenseUnavailable("stub embedder has no backend".to_string()))
    }
}

pub struct EmptyRetriever;

#[async_trait]
impl VectorRetriever for EmptyRetriever {
    async fn dense(
        &self,
        _dense_vec: &[f32],
        _media_type: MediaType,
        _filter: &RetrievalFilter,
        _limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        Ok(Vec::new())
    }

    async fn sparse(
        &self,
        _sparse_vec: &SparseVector,
        _media_type: MediaType,
        _filter: &RetrievalFilter,
        _limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        Ok(Vec::new())
    }
}

/// Builds a fully-wired `AppState` over in-memory/stub collaborators — no
/// Redis, no network. Good enough to drive auth and pre-stream error paths;
/// anything touching a real model or vector store is covered by unit tests
/// in the crates that own those collaborators.
pub fn test_app_state(auth_mode: AuthMode) -> Arc<AppState> {
    let config = ReelixConfig {
        server: reelix_core::config::ServerConfig {
            auth: AuthConfig { mode: auth_mode, token: Some("test-token".to_string()) },
            ..Default::default()
        },
        ..Default::default()
    };

    let session_config = SessionConfig::default();
    let kv: Arc<dyn KvBackend> = Arc::new(InMemoryKvBackend::new());
    let sessions = SessionStore::new(kv.clone(), &session_config);
    let tickets = TicketStore::new(kv, &session_config);

    let provider: Arc<dyn LlmProvider> = Arc::new(UnavailableProvider);
    let encoder = Arc::new(Encoder::new(Arc::new(UnavailableEmbedder), HashMap::new()));
    let pipeline = Arc::new(RecommendationPipeline::new(Arc::new(EmptyRetriever), config.ranking.clone()));
    let runner = RecommendationRunner::new(encoder, pipeline);

    let orchestrator =
        reelix_agent::OrchestratorAgent::new(provider.clone(), config.llm.orchestrator_model.clone());
    let curator = CuratorEvaluator::new(provider.clone(), config.llm.support_model.clone());
    let reflection = ReflectionAgent::new(provider.clone(), config.llm.support_model.clone());
    let support_model = config.llm.support_model.clone();

    Arc::new(AppState {
        config,
        sessions,
        tickets,
        orchestrator,
        runner,
        curator,
        reflection,
        support_provider: provider,
        support_model,
    })
}
