//! `POST /discovery/explore/rerun` — plain-JSON chip-patch refine (§4.L, §6).
//!
//! Bypasses the orchestrator LLM entirely: patches the session's last
//! `RecQuerySpec` and drives the runner/curator directly via `run_recs`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Datelike, Utc};
use reelix_core::{MemoryDelta, QueryId, RerunPatch, SessionId, TurnKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::shared::{build_slot_map, error_response, neutral_taste_context};

#[derive(Debug, Deserialize)]
pub struct RerunRequest {
    pub query_id: String,
    pub session_id: String,
    #[serde(default)]
    pub patch: RerunPatch,
    #[serde(default)]
    #[allow(dead_code)]
    pub device_info: Option<Value>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RerunResponse {
    pub items: Vec<reelix_core::Candidate>,
    pub stream_url: String,
}

#[tracing::instrument(skip(state, headers, req), fields(session_id = %req.session_id, query_id = %req.query_id))]
pub async fn rerun_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RerunRequest>,
) -> Result<Json<RerunResponse>, (StatusCode, Json<Value>)> {
    let caller = crate::auth::resolve_caller(&state.config.server.auth, &headers).map_err(error_response)?;

    let session_id = SessionId::from(req.session_id.clone());
    let query_id = QueryId::from(req.query_id.clone());
    let now = Utc::now();

    let session = state.sessions.get(&session_id).await.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "session not found", "code": "SESSION_NOT_FOUND" })),
        )
    })?;

    let mut spec = session.last_spec.clone().ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            Json(json!({ "error": "session has no prior spec to refine", "code": "NO_PRIOR_SPEC" })),
        )
    })?;
    spec.apply_patch(&req.patch);

    let taste = neutral_taste_context(caller.clone());
    let current_year = now.year();

    let outcome = reelix_agent::run_recs(
        &state.runner,
        &state.curator,
        &taste,
        &spec,
        &session.seen_media_ids,
        TurnKind::Refine,
        current_year,
    )
    .await
    .map_err(|e| {
        (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string(), "code": "RETRIEVAL_UNAVAILABLE" })),
        )
    })?;

    tracing::info!(
        query_id = %query_id,
        session_id = %session_id,
        user_id = %caller,
        candidate_count = outcome.final_recs.len(),
        strong = outcome.tier_stats.strong_count,
        moderate = outcome.tier_stats.moderate_count,
        no_match = outcome.tier_stats.no_match_count,
        "rerun turn completed"
    );

    let ticket = reelix_core::Ticket {
        user_id: caller.clone(),
        prompts: reelix_explain::build_why_prompt_envelope(
            &outcome.final_recs,
            &spec,
            state.support_model.clone(),
            req.batch_size,
        ),
        created_at: now,
        meta: None,
    };
    state.tickets.put(&query_id, &ticket, now).await;

    let delta = MemoryDelta {
        turn_kind: Some(TurnKind::Refine),
        last_spec: Some(spec.clone()),
        slot_map: Some(build_slot_map(&outcome.final_recs)),
        seen_media_ids: outcome.final_recs.iter().map(|c| c.media_id).collect(),
        ..Default::default()
    };

    // `update` re-reads the stored session and merges `constraints`/`prefs`
    // additively (see `apply_summary_delta`), so an empty delta here leaves
    // them untouched.
    state.sessions.update(&caller, &session_id, &delta, Utc::now()).await;

    Ok(Json(RerunResponse {
        items: outcome.final_recs,
        stream_url: format!("/discovery/explore/why?query_id={query_id}"),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use reelix_core::config::AuthMode;
    use tower::ServiceExt;

    use crate::app::build_router;
    use crate::test_support::test_app_state;

    fn rerun_body() -> Body {
        Body::from(
            serde_json::json!({
                "query_id": "q-1",
                "session_id": "s-1",
            })
            .to_string(),
        )
    }

    #[tokio::test]
    async fn missing_auth_is_rejected() {
        let state = test_app_state(AuthMode::Token);
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/discovery/explore/rerun")
                    .header("content-type", "application/json")
                    .body(rerun_body())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let state = test_app_state(AuthMode::Token);
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/discovery/explore/rerun")
                    .header("content-type", "application/json")
                    .header("authorization", "Bearer test-token")
                    .header("x-user-id", "alice")
                    .body(rerun_body())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "SESSION_NOT_FOUND");
    }
}
