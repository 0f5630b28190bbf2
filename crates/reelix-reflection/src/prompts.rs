//! System prompt and user-prompt construction for the reflection call (§4.K).

use reelix_core::{Candidate, RecQuerySpec};
use reelix_curator::tiers::CuratorStats;

pub const REFLECTION_SYSTEM_PROMPT: &str = "You are a professional film curator suggesting one \
    next step after a slate has just been delivered. Pick exactly one of these three strategies:\n\n\
    - more_like_title: anchor on one specific title from the results and suggest narrowing \
    toward things like it.\n\
    - explore_adjacent: suggest a neighboring genre, tone, or theme the results only partly covered.\n\
    - shift_era: suggest trying a different decade or release window than what was served.\n\n\
    Write exactly one to two sentences: a short observation about the results, then a concrete, \
    specific proposal ending in a question. Name an actual title, genre, or era rather than a \
    vague category. Don't tell the user to search elsewhere, and don't hedge. Avoid repeating a \
    strategy you already used last turn if one is given.\n\n\
    Respond with ONLY valid JSON, no markdown fences: \
    {\"strategy\":\"<more_like_title|explore_adjacent|shift_era>\",\"suggestion\":\"<1-2 sentences>\"}";

/// Renders the served slate plus tier counts into the user turn of the
/// reflection call, grounded in the original `build_reflection_user_prompt`.
pub fn build_reflection_user_prompt(
    spec: &RecQuerySpec,
    final_recs: &[Candidate],
    tier_stats: Option<&CuratorStats>,
    previous_strategy: Option<&str>,
) -> String {
    let mut genres = spec.core_genres.iter().map(|g| g.as_str()).collect::<Vec<_>>();
    genres.extend(spec.sub_genres.iter().map(|s| s.as_str()));

    let mut out = String::new();
    out.push_str("USER REQUEST\n");
    out.push_str(&format!("query_text: {}\n", spec.query_text));
    out.push_str(&format!("genres: {}\n", genres.join(", ")));
    out.push_str(&format!("tone: {}\n", spec.core_tone.join(", ")));
    out.push_str(&format!("themes: {}\n\n", spec.key_themes.join(", ")));

    out.push_str("RESULTS RETURNED\n");
    if let Some(stats) = tier_stats {
        out.push_str(&format!(
            "served: {} titles ({} strong matches, {} moderate matches)\n",
            final_recs.len(),
            stats.strong_count,
            stats.moderate_count,
        ));
    } else {
        out.push_str(&format!("served: {} titles\n", final_recs.len()));
    }
    for c in final_recs {
        let genres = c.genres().join(", ");
        let overview = c
            .payload
            .get("overview")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let overview: String = overview.chars().take(120).collect();
        out.push_str(&format!("- {} | genres: {} | overview: {}\n", c.title(), genres, overview));
    }

    if let Some(prev) = previous_strategy {
        out.push_str(&format!("\nprevious_strategy (avoid repeating this): {prev}\n"));
    }

    out.push_str("\nWrite 1-2 sentences suggesting a specific, actionable next step.");
    out
}
