//! Prompt envelope construction for the "why you might enjoy it" call (§4.J).
//!
//! A slate is split into chunks of `batch_size` candidates; each chunk gets
//! its own [`reelix_core::LlmCall`] inside the envelope so `/explore/why` can
//! stream one batch at a time via its `batch` query parameter.

use chrono::Utc;
use reelix_core::{Candidate, EnvelopeOutput, ItemBrief, LlmCall, PromptsEnvelope, RecQuerySpec};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

const DEFAULT_BATCH_SIZE: usize = 8;

const WHY_SYSTEM_PROMPT: &str = "You are a professional film and TV critic writing short, \
    spoiler-light blurbs. For every candidate given below, in the same order, write one \
    sentence or two explaining why someone with the stated taste might enjoy it. Never reveal \
    plot twists or endings.\n\n\
    Respond with JSON Lines: one JSON object per line, no blank lines, no markdown fences, in \
    the exact order the candidates were given. Each line must be exactly:\n\
    {\"media_id\":\"<id>\",\"why\":\"<spoiler-light markdown, single line, no literal newlines>\"}";

/// Build the full prompt envelope for a slate, chunked into batches of
/// `batch_size` (8 when `None`).
pub fn build_why_prompt_envelope(
    candidates: &[Candidate],
    spec: &RecQuerySpec,
    model: impl Into<String>,
    batch_size: Option<usize>,
) -> PromptsEnvelope {
    let model = model.into();
    let batch_size = batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1);
    let mut params = Map::new();
    params.insert("temperature".to_string(), json!(0.7));
    params.insert("top_p".to_string(), json!(1.0));

    let calls: Vec<LlmCall> = candidates
        .chunks(batch_size)
        .enumerate()
        .map(|(idx, chunk)| build_call(idx as u32 + 1, chunk, spec))
        .collect();

    let output = EnvelopeOutput {
        format: "jsonl".to_string(),
        schema_version: "1".to_string(),
    };

    let prompt_hash = hash_envelope(&model, &params, &output, &calls);

    PromptsEnvelope {
        model,
        params,
        output,
        calls,
        prompt_hash,
        created_at: Utc::now(),
    }
}

fn build_call(call_id: u32, chunk: &[Candidate], spec: &RecQuerySpec) -> LlmCall {
    let user_prompt = build_user_prompt(chunk, spec);
    let messages = vec![
        json!({"role": "system", "content": WHY_SYSTEM_PROMPT}),
        json!({"role": "user", "content": user_prompt}),
    ];
    let items_brief = chunk
        .iter()
        .map(|c| ItemBrief {
            media_id: c.media_id,
            title: c.title(),
        })
        .collect();

    LlmCall {
        call_id,
        messages,
        items_brief,
    }
}

fn build_user_prompt(chunk: &[Candidate], spec: &RecQuerySpec) -> String {
    let mut genres = spec.core_genres.iter().map(|g| g.as_str()).collect::<Vec<_>>();
    genres.extend(spec.sub_genres.iter().map(|s| s.as_str()));

    let mut out = String::new();
    out.push_str("USER REQUEST\n");
    out.push_str(&format!("query_text: {}\n", spec.query_text));
    out.push_str(&format!("genres: {}\n", genres.join(", ")));
    out.push_str(&format!("tone: {}\n", spec.core_tone.join(", ")));
    out.push_str(&format!("key_themes: {}\n", spec.key_themes.join(", ")));
    out.push_str(&format!("narrative_shape: {}\n\n", spec.narrative_shape.join(", ")));

    out.push_str(&format!("CANDIDATES (use all, keep order, total={})\n", chunk.len()));
    for c in chunk {
        out.push_str("```\n");
        out.push_str(&format!("media_id: {}\n", c.media_id));
        out.push_str(&sanitize_code_block(&c.embedding_text()));
        out.push_str("\n```\n");
    }

    out.push_str(&format!(
        "\nINSTRUCTIONS\nOutput exactly {} JSONL objects, one per candidate above, in the same order.",
        chunk.len()
    ));
    out
}

/// Escapes a literal ``` ``` `` ``` sequence inside candidate text so it
/// can't prematurely close the fenced block it's embedded in.
fn sanitize_code_block(block: &str) -> String {
    block.replace("```", "``\u{200b}`")
}

fn hash_envelope(model: &str, params: &Map<String, Value>, output: &EnvelopeOutput, calls: &[LlmCall]) -> String {
    let canon = json!({
        "model": model,
        "params": params,
        "output": {"format": output.format, "schema_version": output.schema_version},
        "calls": calls.iter().map(|c| json!({"messages": c.messages})).collect::<Vec<_>>(),
    });
    // serde_json::Map is a BTreeMap by default, so keys serialize sorted —
    // matching the original's `sort_keys=True` canonicalization.
    let bytes = serde_json::to_vec(&canon).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    format!("sha256:{digest:x}")
}

/// Selects the call for `/explore/why`'s `batch` query parameter (1-based,
/// defaulting to the first call).
pub fn pick_call(envelope: &PromptsEnvelope, batch: Option<u32>) -> Option<&LlmCall> {
    let wanted = batch.unwrap_or(1);
    envelope
        .calls
        .iter()
        .find(|c| c.call_id == wanted)
        .or_else(|| envelope.calls.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelix_core::MediaType;
    use std::collections::HashMap;

    fn candidate(id: i64, title: &str) -> Candidate {
        let mut payload = HashMap::new();
        payload.insert("title".to_string(), json!(title));
        payload.insert("embedding_text".to_string(), json!(format!("{title} synopsis")));
        Candidate {
            media_id: id,
            media_type: MediaType::Movie,
            payload,
            dense_score: None,
            sparse_score: None,
        }
    }

    fn spec() -> RecQuerySpec {
        RecQuerySpec {
            query_text: "moody sci-fi".to_string(),
            media_type: MediaType::Movie,
            core_genres: Vec::new(),
            sub_genres: Vec::new(),
            core_tone: Vec::new(),
            narrative_shape: Vec::new(),
            key_themes: Vec::new(),
            exclude_genres: Vec::new(),
            providers: Vec::new(),
            year_range: None,
            seed_titles: Vec::new(),
            num_recs: 8,
        }
    }

    #[test]
    fn chunks_candidates_into_one_call_per_batch() {
        let candidates: Vec<Candidate> = (1..=10).map(|i| candidate(i, &format!("Movie {i}"))).collect();
        let envelope = build_why_prompt_envelope(&candidates, &spec(), "gpt-4o-mini", Some(8));

        assert_eq!(envelope.calls.len(), 2);
        assert_eq!(envelope.calls[0].items_brief.len(), 8);
        assert_eq!(envelope.calls[1].items_brief.len(), 2);
        assert_eq!(envelope.calls[0].call_id, 1);
        assert_eq!(envelope.calls[1].call_id, 2);
    }

    #[test]
    fn prompt_hash_is_stable_for_identical_input() {
        let candidates = vec![candidate(1, "Movie 1")];
        let a = build_why_prompt_envelope(&candidates, &spec(), "gpt-4o-mini", None);
        let b = build_why_prompt_envelope(&candidates, &spec(), "gpt-4o-mini", None);
        assert_eq!(a.prompt_hash, b.prompt_hash);
        assert!(a.prompt_hash.starts_with("sha256:"));
    }

    #[test]
    fn sanitizes_triple_backticks_in_embedding_text() {
        let sanitized = sanitize_code_block("```danger```");
        assert!(!sanitized.contains("```"));
    }

    #[test]
    fn pick_call_defaults_to_first_batch() {
        let candidates: Vec<Candidate> = (1..=10).map(|i| candidate(i, &format!("Movie {i}"))).collect();
        let envelope = build_why_prompt_envelope(&candidates, &spec(), "gpt-4o-mini", Some(8));

        assert_eq!(pick_call(&envelope, None).unwrap().call_id, 1);
        assert_eq!(pick_call(&envelope, Some(2)).unwrap().call_id, 2);
        assert_eq!(pick_call(&envelope, Some(99)).unwrap().call_id, 1);
    }
}
