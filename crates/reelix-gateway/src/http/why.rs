//! `GET /discovery/explore/why` — streams the "why you might enjoy it"
//! explanations for a previously-served slate (§4.J, §4.L, §6).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use reelix_core::config::HEARTBEAT_SEC;
use reelix_core::QueryId;
use reelix_explain::{pick_call, stream_why_events, WhyEvent};
use reelix_llm::provider::{ChatRequest, Message, Role};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::shared::error_response;
use crate::sse::WhyStreamEvent;

#[derive(Debug, Deserialize)]
pub struct WhyQuery {
    pub query_id: String,
    pub batch: Option<u32>,
}

#[tracing::instrument(skip(state, headers, q), fields(query_id = %q.query_id, batch = q.batch))]
pub async fn why_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<WhyQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (axum::http::StatusCode, Json<Value>)> {
    let caller = crate::auth::resolve_caller(&state.config.server.auth, &headers).map_err(error_response)?;

    let query_id = QueryId::from(q.query_id.clone());
    let ticket = state.tickets.get(&query_id, &caller).await.map_err(error_response)?;
    state.tickets.touch(&query_id, Utc::now()).await;

    let call = pick_call(&ticket.prompts, q.batch).cloned();
    let provider = state.support_provider.clone();
    let model = ticket.prompts.model.clone();

    let stream = stream! {
        yield Ok(WhyStreamEvent::Started.into_sse());

        let Some(call) = call else {
            yield Ok(WhyStreamEvent::Done.into_sse());
            return;
        };

        let chat_request = match build_chat_request(&model, &call.messages) {
            Some(req) => req,
            None => {
                let error_id = Uuid::new_v4().to_string();
                tracing::error!(error_id, "why-ticket call had an unexpected message shape");
                yield Ok(WhyStreamEvent::Error { message: "malformed prompt envelope".to_string(), error_id }.into_sse());
                return;
            }
        };

        let mut events = Box::pin(stream_why_events(provider, chat_request, Duration::from_secs(HEARTBEAT_SEC)));
        while let Some(event) = events.next().await {
            match event {
                WhyEvent::Item(item) => {
                    yield Ok(WhyStreamEvent::WhyDelta {
                        media_id: item.media_id,
                        why_you_might_enjoy_it: item.why,
                    }.into_sse());
                }
                WhyEvent::Heartbeat => yield Ok(WhyStreamEvent::Heartbeat.into_sse()),
            }
        }

        yield Ok(WhyStreamEvent::Done.into_sse());
    };

    Ok(Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::new().interval(Duration::from_secs(HEARTBEAT_SEC))))
}

/// A ticket call's `messages` are `[{"role":"system",...}, {"role":"user",...}]`
/// (see `reelix_explain::envelope::build_call`) — reconstruct a `ChatRequest`
/// from that fixed shape.
fn build_chat_request(model: &str, messages: &[Value]) -> Option<ChatRequest> {
    let system = messages.first()?.get("content")?.as_str()?.to_string();
    let user = messages.get(1)?.get("content")?.as_str()?.to_string();

    Some(ChatRequest {
        model: model.to_string(),
        system,
        messages: vec![Message {
            role: Role::User,
            content: user,
        }],
        max_tokens: 2048,
        stream: true,
        temperature: Some(0.7),
        top_p: Some(1.0),
        tools: Vec::new(),
        raw_messages: None,
    })
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
    async fn missing_auth_is_rejected() {
        let state = test_app_state(AuthMode::Token);
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/discovery/explore/why?query_id=q-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_ticket_is_not_found() {
        let state = test_app_state(AuthMode::Token);
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/discovery/explore/why?query_id=q-1")
                    .header("authorization", "Bearer test-token")
                    .header("x-user-id", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
