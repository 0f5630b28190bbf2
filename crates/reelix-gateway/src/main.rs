use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use reelix_core::config::ReelixConfig;
use reelix_core::kv::{KvBackend, RedisKvBackend};
use reelix_core::MediaType;
use reelix_curator::CuratorEvaluator;
use reelix_llm::provider::LlmProvider;
use reelix_llm::anthropic::AnthropicProvider;
use reelix_llm::openai::OpenAiProvider;
use reelix_llm::router::{ProviderRouter, ProviderSlot};
use reelix_pipeline::RecommendationPipeline;
use reelix_reflection::ReflectionAgent;
use reelix_retrieval::{Bm25Model, Encoder, OpenAiEmbedder, QdrantRetriever};
use reelix_runner::RecommendationRunner;
use reelix_sessions::SessionStore;
use reelix_tickets::TicketStore;
use tracing::{info, warn};

mod app;
mod auth;
mod http;
mod shared;
mod sse;
#[cfg(test)]
mod test_support;

/// Retries per provider before the router moves to the next slot (§6).
const PROVIDER_MAX_RETRIES: u32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelix_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("REELIX_CONFIG").ok();
    let config = ReelixConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        ReelixConfig::default()
    });

    let kv: Arc<dyn KvBackend> = Arc::new(RedisKvBackend::connect(&config.redis.url).await?);
    let sessions = SessionStore::new(kv.clone(), &config.session);
    let tickets = TicketStore::new(kv, &config.session);

    let bm25_models = load_bm25_models();

    let openai_embed_config = config
        .llm
        .openai
        .clone()
        .ok_or_else(|| anyhow::anyhow!("llm.openai config is required for dense embeddings"))?;
    let dense = Arc::new(OpenAiEmbedder::new(
        openai_embed_config.api_key,
        openai_embed_config.base_url,
        "text-embedding-3-small",
    ));
    let encoder = Arc::new(Encoder::new(dense, bm25_models));

    let retriever = Arc::new(QdrantRetriever::new(
        config.qdrant.url.clone(),
        config.qdrant.movie_collection.clone(),
        config.qdrant.tv_collection.clone(),
        config.qdrant.dense_vector_name.clone(),
        config.qdrant.sparse_vector_name.clone(),
    ));
    let pipeline = Arc::new(RecommendationPipeline::new(retriever, config.ranking.clone()));
    let runner = RecommendationRunner::new(encoder, pipeline);

    let orchestrator_provider = build_orchestrator_provider(&config)?;
    let support_provider = build_support_provider(&config)?;

    let orchestrator = reelix_agent::OrchestratorAgent::new(
        orchestrator_provider,
        config.llm.orchestrator_model.clone(),
    );
    let curator = CuratorEvaluator::new(support_provider.clone(), config.llm.support_model.clone());
    let reflection = ReflectionAgent::new(support_provider.clone(), config.llm.support_model.clone());

    let bind = config.server.bind.clone();
    let port = config.server.port;
    let support_model = config.llm.support_model.clone();

    let state = Arc::new(app::AppState {
        config,
        sessions,
        tickets,
        orchestrator,
        runner,
        curator,
        reflection,
        support_provider,
        support_model,
    });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("reelix gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Builds the provider that drives the orchestrator's tool-calling turn loop
/// — Anthropic is preferred when configured, since the orchestrator prompt
/// relies on Claude-style tool use (§4.H).
fn build_orchestrator_provider(config: &ReelixConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let raw: Box<dyn LlmProvider> = if let Some(anthropic) = &config.llm.anthropic {
        Box::new(AnthropicProvider::new(anthropic.api_key.clone(), Some(anthropic.base_url.clone())))
    } else if let Some(openai) = &config.llm.openai {
        Box::new(OpenAiProvider::new(openai.api_key.clone(), Some(openai.base_url.clone())))
    } else {
        anyhow::bail!("no orchestrator LLM provider configured (llm.anthropic or llm.openai)");
    };
    Ok(Arc::new(ProviderRouter::new(vec![ProviderSlot::new(raw, PROVIDER_MAX_RETRIES)])))
}

/// Builds the provider behind the curator, why-explanation and reflection
/// calls — cheap, high-volume calls that default to OpenAI (§4.H).
fn build_support_provider(config: &ReelixConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let raw: Box<dyn LlmProvider> = if let Some(openai) = &config.llm.openai {
        Box::new(OpenAiProvider::new(openai.api_key.clone(), Some(openai.base_url.clone())))
    } else if let Some(anthropic) = &config.llm.anthropic {
        Box::new(AnthropicProvider::new(anthropic.api_key.clone(), Some(anthropic.base_url.clone())))
    } else {
        anyhow::bail!("no support LLM provider configured (llm.anthropic or llm.openai)");
    };
    Ok(Arc::new(ProviderRouter::new(vec![ProviderSlot::new(raw, PROVIDER_MAX_RETRIES)])))
}

/// Corpus statistics are produced offline by the indexing pipeline (out of
/// scope here, §1) and loaded read-only at startup. A missing or malformed
/// file degrades to an empty model — sparse scoring returns zero vectors for
/// that media type rather than failing the whole gateway.
fn load_bm25_models() -> HashMap<MediaType, Bm25Model> {
    let mut models = HashMap::new();
    for (media_type, env_var, default_path) in [
        (MediaType::Movie, "REELIX_BM25_MOVIE_PATH", "bm25_movie.json"),
        (MediaType::Tv, "REELIX_BM25_TV_PATH", "bm25_tv.json"),
    ] {
        let path = std::env::var(env_var).unwrap_or_else(|_| default_path.to_string());
        match Bm25Model::load_from_file(&path) {
            Ok(model) => {
                models.insert(media_type, model);
            }
            Err(e) => {
                warn!("failed to load bm25 model for {media_type} from {path}: {e}");
                models.insert(
                    media_type,
                    Bm25Model { vocab: HashMap::new(), idf: HashMap::new(), avgdl: 0.0, k1: 1.5 },
                );
            }
        }
    }
    models
}
