//! Typed SSE event model for the endpoint layer (§4.L, §6, §9).
//!
//! Per the design note in §9 — "model as a stream of typed events ... the
//! core should never build a string with raw `event:` framing outside the
//! transport" — every handler produces one of these enums and only this
//! module (the transport boundary) turns a variant into an
//! `axum::response::sse::Event`.

use axum::response::sse::Event;
use reelix_agent::ActiveSpec;
use reelix_core::Candidate;
use reelix_reflection::ReflectionStrategy;
use serde_json::json;

/// Event sequence for `POST /discovery/explore` (and the synchronous
/// equivalent exposed through `/discovery/explore/rerun`'s JSON response).
pub enum ExploreEvent {
    Started,
    Opening {
        active_spec: ActiveSpec,
        opening_summary: String,
    },
    Heartbeat,
    Recs {
        items: Vec<Candidate>,
        stream_url: String,
    },
    NextSteps {
        strategy: ReflectionStrategy,
        suggestion: String,
    },
    Chat {
        message: String,
    },
    Done,
    Error {
        message: String,
        error_id: String,
    },
}

impl ExploreEvent {
    pub fn into_sse(self) -> Event {
        match self {
            ExploreEvent::Started => named("started", json!({})),
            ExploreEvent::Opening { active_spec, opening_summary } => named(
                "opening",
                json!({ "active_spec": active_spec, "opening_summary": opening_summary }),
            ),
            ExploreEvent::Heartbeat => Event::default().comment(""),
            ExploreEvent::Recs { items, stream_url } => {
                named("recs", json!({ "items": items, "stream_url": stream_url }))
            }
            ExploreEvent::NextSteps { strategy, suggestion } => {
                named("next_steps", json!({ "strategy": strategy, "suggestion": suggestion }))
            }
            ExploreEvent::Chat { message } => named("chat", json!({ "message": message })),
            ExploreEvent::Done => named("done", json!({})),
            ExploreEvent::Error { message, error_id } => {
                named("error", json!({ "message": message, "error_id": error_id }))
            }
        }
    }
}

/// Event sequence for `GET /discovery/explore/why`.
pub enum WhyStreamEvent {
    Started,
    WhyDelta { media_id: i64, why_you_might_enjoy_it: String },
    Heartbeat,
    Done,
    Error { message: String, error_id: String },
}

impl WhyStreamEvent {
    pub fn into_sse(self) -> Event {
        match self {
            WhyStreamEvent::Started => named("started", json!({})),
            WhyStreamEvent::WhyDelta { media_id, why_you_might_enjoy_it } => named(
                "why_delta",
                json!({ "media_id": media_id, "why_you_might_enjoy_it": why_you_might_enjoy_it }),
            ),
            WhyStreamEvent::Heartbeat => Event::default().comment(""),
            WhyStreamEvent::Done => named("done", json!({})),
            WhyStreamEvent::Error { message, error_id } => {
                named("error", json!({ "message": message, "error_id": error_id }))
            }
        }
    }
}

fn named(name: &'static str, data: serde_json::Value) -> Event {
    Event::default().event(name).data(data.to_string())
}
