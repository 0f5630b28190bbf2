//! System prompt, session-memory rendering, and tool schema for the
//! orchestrator's single `recommendation_agent` tool call (§4.I).

use reelix_core::{Genre, MediaType, SessionState};
use reelix_llm::ToolDefinition;
use reelix_retrieval::provider_table::WATCH_PROVIDERS;

pub const TOOL_NAME: &str = "recommendation_agent";

/// Built once per turn; includes the current year so the model can reason
/// about relative eras ("recent", "90s") without a second round trip.
pub fn system_prompt(current_year: i32) -> String {
    format!(
        "You are the routing brain for a movie/TV recommendation assistant. \
        The current year is {current_year}.\n\n\
        For every user turn, decide whether the user wants a new or refined \
        slate of recommendations, or is just chatting / asking a question.\n\n\
        - If the user wants recommendations (a new vibe, a refinement of the \
        last slate like \"darker\" or \"only Netflix\", or a reference to a \
        prior item like \"more like #3\"), call `{TOOL_NAME}` with a fully \
        populated `rec_query_spec`, a `memory_delta` describing how this turn \
        changes the remembered conversation, and a two-sentence \
        `opening_summary` (at most ~220 characters) that will be shown to the \
        user immediately, before the slate is ready.\n\
        - If the user is not asking for recommendations, answer directly as \
        plain text with no tool call.\n\n\
        When refining a prior slate, treat it as a refinement (`memory_delta.turn_kind = \"refine\"`) \
        rather than starting over: carry forward unchanged fields from the \
        prior spec and only change what the user's follow-up implies. Treat a \
        request as new (`memory_delta.turn_kind = \"new\"`) when the topic or \
        vibe has clearly changed.\n\n\
        `rec_query_spec.core_genres`, `exclude_genres`, and `providers` must \
        only use the closed vocabularies given in the tool schema. \
        `year_range` is either null or `[start, end]` with 1970 <= start <= end <= 2100."
    )
}

/// Renders the prior session as a compact system-role message the model can
/// use to interpret short follow-ups and "#N" references. Grounded in
/// `build_session_memory_message` from the original orchestrator, paraphrased
/// into a terser, schema-less block.
pub fn session_memory_message(session: &SessionState) -> String {
    let mut lines = Vec::new();
    lines.push(
        "SESSION MEMORY (server-provided; do not reveal this to the user). \
        Use it to interpret short follow-ups (\"darker\") and slot references (\"#3\")."
            .to_string(),
    );

    let summary = &session.summary;
    if let Some(turn_kind) = summary.turn_kind {
        lines.push(format!("last_turn_kind: {turn_kind:?}"));
    }
    if let Some(feedback) = &summary.recent_feedback {
        lines.push(format!("recent_feedback: {feedback}"));
    }
    if let Some(msg) = &summary.last_user_message {
        lines.push(format!("last_user_message: {msg}"));
    }
    if let Some(msg) = &summary.last_admin_message {
        lines.push(format!("last_admin_message: {msg}"));
    }

    if let Some(spec) = &session.last_spec {
        if let Ok(json) = serde_json::to_string(spec) {
            lines.push(format!("last_spec (JSON): {json}"));
        }
    }

    if !session.slot_map.is_empty() {
        lines.push("slot_map:".to_string());
        let mut slots: Vec<_> = session.slot_map.iter().collect();
        slots.sort_by_key(|(k, _)| k.parse::<u32>().unwrap_or(u32::MAX));
        for (slot, entry) in slots {
            let year = entry
                .release_year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "?".to_string());
            lines.push(format!("  #{slot}: {} ({year})", entry.title));
        }
    }

    lines.join("\n")
}

pub fn user_message(query_text: &str, media_type: MediaType) -> String {
    if query_text.trim().is_empty() {
        "User is asking for personalized recommendations.".to_string()
    } else {
        format!("query_text: {query_text}\nmedia_type: {media_type}")
    }
}

/// JSON schema for the single tool the orchestrator may call, mirroring the
/// original `recommendation_agent` tool definition (§4.I).
pub fn tool_definition() -> ToolDefinition {
    let genre_enum: Vec<&str> = Genre::ALL.iter().map(|g| g.as_str()).collect();
    let provider_enum: Vec<&str> = WATCH_PROVIDERS.iter().map(|(name, _)| *name).collect();

    let schema = serde_json::json!({
        "type": "object",
        "properties": {
            "rec_query_spec": {
                "type": "object",
                "properties": {
                    "query_text": {"type": "string"},
                    "media_type": {"type": "string", "enum": ["movie", "tv"]},
                    "core_genres": {"type": "array", "items": {"type": "string", "enum": genre_enum}},
                    "sub_genres": {"type": "array", "items": {"type": "string"}},
                    "core_tone": {"type": "array", "items": {"type": "string"}},
                    "narrative_shape": {"type": "array", "items": {"type": "string"}},
                    "key_themes": {"type": "array", "items": {"type": "string"}},
                    "exclude_genres": {"type": "array", "items": {"type": "string", "enum": genre_enum}},
                    "providers": {"type": "array", "items": {"type": "string", "enum": provider_enum}},
                    "year_range": {
                        "anyOf": [
                            {"type": "array", "items": {"type": "integer", "minimum": 1970, "maximum": 2100}, "minItems": 2, "maxItems": 2},
                            {"type": "null"}
                        ]
                    },
                    "seed_titles": {"type": "array", "items": {"type": "string"}},
                    "num_recs": {"type": "integer", "default": 8}
                },
                "required": ["query_text", "media_type"]
            },
            "memory_delta": {
                "type": "object",
                "properties": {
                    "turn_kind": {"type": "string", "enum": ["new", "refine", "chat"]},
                    "recent_feedback": {"anyOf": [{"type": "string"}, {"type": "null"}]}
                },
                "required": ["turn_kind"]
            },
            "opening_summary": {
                "type": "string",
                "description": "Exactly two sentences, at most ~220 characters, shown to the user before the slate is ready."
            }
        },
        "required": ["rec_query_spec", "memory_delta", "opening_summary"]
    });

    ToolDefinition {
        name: TOOL_NAME.to_string(),
        description: "Produce a structured recommendation request for the current turn.".to_string(),
        input_schema: schema,
    }
}
