//! Helpers shared between the `/discovery/explore` and
//! `/discovery/explore/rerun` handlers (§4.L).

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::Json;
use reelix_core::{Candidate, ProviderFilterMode, ReelixError, SlotEntry, UserId, UserTasteContext};
use reelix_reflection::ReflectionStrategy;
use serde_json::json;

/// Maps a pre-stream `ReelixError` to its status code (§7) and a JSON body.
/// Only used for failures that happen before any SSE/JSON body has started
/// — once a response has begun, errors are reported as an in-band frame
/// instead (see `sse::ExploreEvent::Error` / `WhyStreamEvent::Error`).
pub fn error_response(err: ReelixError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        ReelixError::AuthMissing => StatusCode::UNAUTHORIZED,
        ReelixError::AuthInvalid => StatusCode::FORBIDDEN,
        ReelixError::TicketNotFound { .. } => StatusCode::NOT_FOUND,
        ReelixError::TicketForbidden { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = Json(json!({ "error": err.to_string(), "code": err.code() }));
    (status, body)
}

/// The taste-profile service is an external collaborator out of scope here
/// (§1 Non-goals) — every turn runs against this neutral stand-in rather
/// than a live profile, documented in DESIGN.md.
pub fn neutral_taste_context(user_id: UserId) -> UserTasteContext {
    UserTasteContext {
        user_id,
        taste_vector: None,
        positive_count: 0,
        negative_count: 0,
        liked_genres: Vec::new(),
        liked_keywords: Vec::new(),
        recent_interactions: Vec::new(),
        active_provider_ids: Vec::new(),
        provider_filter_mode: ProviderFilterMode::Off,
    }
}

/// Builds the 1-based slot map recorded onto session memory so a later turn
/// can resolve "more like #3" against a stable slate (§3 `SlotEntry`).
pub fn build_slot_map(final_recs: &[Candidate]) -> HashMap<String, SlotEntry> {
    final_recs
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let entry = SlotEntry {
                media_id: c.media_id,
                title: c.title(),
                release_year: c.payload.get("release_year").and_then(|v| v.as_i64()).map(|v| v as i32),
            };
            ((idx + 1).to_string(), entry)
        })
        .collect()
}

pub fn reflection_strategy_str(strategy: ReflectionStrategy) -> &'static str {
    match strategy {
        ReflectionStrategy::MoreLikeTitle => "more_like_title",
        ReflectionStrategy::ExploreAdjacent => "explore_adjacent",
        ReflectionStrategy::ShiftEra => "shift_era",
    }
}
