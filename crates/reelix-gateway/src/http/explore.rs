//! `POST /discovery/explore` — the SSE recs/chat turn (§4.L, §6).
//!
//! Event sequence for a recs turn: `started` → `opening` → (heartbeats
//! while the runner works) → `recs` → (optional `next_steps`) → `done`.
//! For a chat turn: `started` → `chat` → `done`. Any uncaught error
//! collapses to a single `error` frame — no partial slate ever leaks.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::{Datelike, Utc};
use futures_util::Stream;
use reelix_agent::{ActiveSpec, AgentState, Decision};
use reelix_core::config::HEARTBEAT_SEC;
use reelix_core::{MediaType, MemoryDelta, QueryId, SessionId, TurnKind};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::shared::{build_slot_map, error_response, neutral_taste_context, reflection_strategy_str};
use crate::sse::ExploreEvent;

#[derive(Debug, Deserialize)]
pub struct ExploreRequest {
    pub media_type: MediaType,
    pub query_text: String,
    pub session_id: String,
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub device_info: Option<Value>,
    #[serde(default)]
    #[allow(dead_code)]
    pub history: Option<Value>,
    #[serde(default)]
    #[allow(dead_code)]
    pub query_filters: Option<Value>,
    /// Items per WHY-envelope call (§6); defaults to 20 to match the
    /// original router's default batch size.
    #[serde(default)]
    pub batch_size: Option<usize>,
}

#[tracing::instrument(skip(state, headers, req), fields(session_id = %req.session_id))]
pub async fn explore_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ExploreRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (axum::http::StatusCode, Json<Value>)> {
    let caller = crate::auth::resolve_caller(&state.config.server.auth, &headers).map_err(error_response)?;

    let session_id = SessionId::from(req.session_id.clone());
    let query_id = req
        .query_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| QueryId::from(s.to_string()))
        .unwrap_or_else(QueryId::new);

    // The `#[instrument]` span above only covers this synchronous setup —
    // polling (and thus the rest of the turn) happens after the handler
    // returns, so events emitted inside the generator carry their own
    // query_id/user_id fields explicitly rather than relying on span nesting.
    let batch_size = req.batch_size;
    let stream = stream! {
        let now = Utc::now();
        yield Ok(ExploreEvent::Started.into_sse());

        let session_memory = state.sessions.get(&session_id).await;
        if let Some(existing) = &session_memory {
            state.sessions.touch(&session_id, existing.created_at, now).await;
        }

        let mut agent_state = AgentState::new(caller.clone(), session_id.clone(), query_id.clone(), session_memory.clone());
        let current_year = now.year();

        let decision = state
            .orchestrator
            .decide(&mut agent_state, &req.query_text, req.media_type, current_year)
            .await;

        match decision {
            Err(err) => {
                let error_id = Uuid::new_v4().to_string();
                tracing::error!(error_id, error = %err, "orchestrator turn failed");
                yield Ok(ExploreEvent::Error { message: "recommendation turn failed".to_string(), error_id }.into_sse());
                return;
            }
            Ok(Decision::Chat { message }) => {
                yield Ok(ExploreEvent::Chat { message: message.clone() }.into_sse());
                let mut delta = agent_state.turn_memory.clone();
                delta.last_user_message = Some(req.query_text.clone());
                state.sessions.update(&caller, &session_id, &delta, Utc::now()).await;
                yield Ok(ExploreEvent::Done.into_sse());
            }
            Ok(Decision::Recs { spec, memory_delta, opening_summary }) => {
                yield Ok(ExploreEvent::Opening {
                    active_spec: ActiveSpec::from(&spec),
                    opening_summary,
                }.into_sse());

                let taste = neutral_taste_context(caller.clone());
                let seen_media_ids = session_memory.as_ref().map(|s| s.seen_media_ids.clone()).unwrap_or_default();
                let turn_kind = memory_delta.turn_kind.unwrap_or(TurnKind::New);

                let (tx, mut rx) = tokio::sync::oneshot::channel();
                let spec_for_task = spec.clone();
                let runner_state = state.clone();
                let join = tokio::spawn(async move {
                    let outcome = reelix_agent::run_recs(
                        &runner_state.runner,
                        &runner_state.curator,
                        &taste,
                        &spec_for_task,
                        &seen_media_ids,
                        turn_kind,
                        current_year,
                    )
                    .await;
                    let _ = tx.send(outcome);
                });
                let _guard = AbortOnDrop(join);

                let outcome = loop {
                    tokio::select! {
                        res = &mut rx => {
                            break res;
                        }
                        _ = tokio::time::sleep(Duration::from_secs(HEARTBEAT_SEC)) => {
                            yield Ok(ExploreEvent::Heartbeat.into_sse());
                        }
                    }
                };

                let outcome = match outcome {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(err)) => {
                        let error_id = Uuid::new_v4().to_string();
                        tracing::error!(error_id, error = %err, "recs turn failed");
                        yield Ok(ExploreEvent::Error { message: "recommendation turn failed".to_string(), error_id }.into_sse());
                        return;
                    }
                    Err(_recv_err) => {
                        // Channel dropped without a send: the task was aborted
                        // (client disconnected) — nothing left to emit.
                        return;
                    }
                };

                tracing::info!(
                    query_id = %query_id,
                    session_id = %session_id,
                    user_id = %caller,
                    turn_kind = ?turn_kind,
                    candidate_count = outcome.final_recs.len(),
                    strong = outcome.tier_stats.strong_count,
                    moderate = outcome.tier_stats.moderate_count,
                    no_match = outcome.tier_stats.no_match_count,
                    "recommendation turn completed"
                );

                let ticket = reelix_core::Ticket {
                    user_id: caller.clone(),
                    prompts: reelix_explain::build_why_prompt_envelope(
                        &outcome.final_recs,
                        &spec,
                        state.support_model.clone(),
                        batch_size,
                    ),
                    created_at: Utc::now(),
                    meta: None,
                };
                state.tickets.put(&query_id, &ticket, Utc::now()).await;

                let stream_url = format!("/discovery/explore/why?query_id={query_id}");
                yield Ok(ExploreEvent::Recs {
                    items: outcome.final_recs.clone(),
                    stream_url,
                }.into_sse());

                let previous_strategy = session_memory
                    .as_ref()
                    .and_then(|s| s.summary.last_reflection_strategy.clone());
                let suggestion = state
                    .reflection
                    .reflect(&spec, &outcome.final_recs, Some(&outcome.tier_stats), previous_strategy.as_deref())
                    .await;

                let mut delta: MemoryDelta = memory_delta;
                delta.last_spec = Some(spec.clone());
                delta.slot_map = Some(build_slot_map(&outcome.final_recs));
                delta.seen_media_ids = outcome.final_recs.iter().map(|c| c.media_id).collect();

                if let Some(suggestion) = &suggestion {
                    delta.last_admin_message = Some(suggestion.suggestion.clone());
                    delta.last_reflection_strategy = Some(reflection_strategy_str(suggestion.strategy).to_string());
                    yield Ok(ExploreEvent::NextSteps {
                        strategy: suggestion.strategy,
                        suggestion: suggestion.suggestion.clone(),
                    }.into_sse());
                }

                let write_state = state.clone();
                let write_caller = caller.clone();
                let write_session = session_id.clone();
                tokio::spawn(async move {
                    write_state.sessions.update(&write_caller, &write_session, &delta, Utc::now()).await;
                });

                yield Ok(ExploreEvent::Done.into_sse());
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::new().interval(Duration::from_secs(HEARTBEAT_SEC))))
}

/// Aborts the spawned runner task when the SSE generator is dropped — the
/// client-disconnect cancellation path (§5, §7 `ClientDisconnect`).
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use reelix_core::config::AuthMode;
    use tower::ServiceExt;

    use crate::app::build_router;
    use crate::test_support::test_app_state;

    #[tokio::test]
    async fn missing_auth_is_rejected_before_any_stream_opens() {
        let state = test_app_state(AuthMode::Token);
        let router = build_router(state);

        let body = serde_json::json!({
            "media_type": "movie",
            "query_text": "something cozy",
            "session_id": "s-1",
        })
        .to_string();

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/discovery/explore")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
