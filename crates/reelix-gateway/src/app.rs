use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use reelix_agent::OrchestratorAgent;
use reelix_core::ReelixConfig;
use reelix_curator::CuratorEvaluator;
use reelix_llm::provider::LlmProvider;
use reelix_reflection::ReflectionAgent;
use reelix_runner::RecommendationRunner;
use reelix_sessions::SessionStore;
use reelix_tickets::TicketStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Central shared state — passed as `Arc<AppState>` to every handler.
pub struct AppState {
    pub config: ReelixConfig,
    pub sessions: SessionStore,
    pub tickets: TicketStore,
    pub orchestrator: OrchestratorAgent,
    pub runner: RecommendationRunner,
    pub curator: CuratorEvaluator,
    pub reflection: ReflectionAgent,
    /// Same provider backing the curator/reflection model — used directly
    /// by `/discovery/explore/why` to drive the streaming JSONL call (§4.J).
    pub support_provider: Arc<dyn LlmProvider>,
    pub support_model: String,
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/discovery/explore", post(crate::http::explore::explore_handler))
        .route(
            "/discovery/explore/rerun",
            post(crate::http::rerun::rerun_handler),
        )
        .route("/discovery/explore/why", get(crate::http::why::why_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
