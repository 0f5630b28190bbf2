//! Curator evaluation call (§4.E): a single strict JSON-only LLM call that
//! scores every candidate along four fit dimensions.

use std::collections::HashMap;
use std::sync::Arc;

use reelix_core::{Candidate, CuratorEvaluation, RecQuerySpec};
use reelix_llm::provider::{ChatRequest, LlmProvider, ProviderError};
use serde::Deserialize;

use crate::tiers::{apply_curator_tiers, CuratorStats};

#[derive(Debug, thiserror::Error)]
pub enum CuratorError {
    #[error("curator LLM call failed: {0}")]
    Llm(#[from] ProviderError),

    #[error("curator response was not valid JSON: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct EvaluationResponse {
    evaluation_results: Vec<EvaluationRow>,
}

#[derive(Debug, Deserialize)]
struct EvaluationRow {
    media_id: i64,
    genre_fit: u8,
    tone_fit: u8,
    structure_fit: u8,
    theme_fit: u8,
}

pub struct CuratorEvaluator {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl CuratorEvaluator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Score `candidates` against `spec`, then apply the deterministic
    /// tiering rule to select a final slate targeting `spec.num_recs`.
    pub async fn evaluate(
        &self,
        spec: &RecQuerySpec,
        candidates: Vec<Candidate>,
    ) -> Result<(Vec<Candidate>, HashMap<i64, CuratorEvaluation>, CuratorStats), CuratorError> {
        if candidates.is_empty() {
            return Ok((Vec::new(), HashMap::new(), CuratorStats::default()));
        }

        let request = build_request(&self.model, spec, &candidates);
        let response = self.provider.send(&request).await?;
        let evaluations = parse_evaluations(&response.content)?;

        let (selected, stats) = apply_curator_tiers(candidates, &evaluations, spec.num_recs);
        Ok((selected, evaluations, stats))
    }
}

fn build_request(model: &str, spec: &RecQuerySpec, candidates: &[Candidate]) -> ChatRequest {
    let system = "You are a strict JSON-only scoring function. For every candidate, \
        score genre_fit, tone_fit, structure_fit, and theme_fit on a 0-2 scale \
        against the requested intent. Respond with exactly one JSON object: \
        {\"evaluation_results\":[{\"media_id\":<int>,\"genre_fit\":<0-2>,\"tone_fit\":<0-2>,\
        \"structure_fit\":<0-2>,\"theme_fit\":<0-2>}, ...]}. No prose, no markdown fences."
        .to_string();

    let mut user = format!(
        "query: {}\ncore_genres: {:?}\ncore_tone: {:?}\nnarrative_shape: {:?}\nkey_themes: {:?}\n\ncandidates:\n",
        spec.query_text, spec.core_genres, spec.core_tone, spec.narrative_shape, spec.key_themes,
    );
    for c in candidates {
        user.push_str(&format!(
            "- media_id={} title={:?} embedding_text={}\n",
            c.media_id,
            c.title(),
            c.embedding_text(),
        ));
    }

    let mut req = ChatRequest::simple(model, system, user);
    req.max_tokens = 2048;
    req
}

fn parse_evaluations(content: &str) -> Result<HashMap<i64, CuratorEvaluation>, CuratorError> {
    let trimmed = strip_markdown_fence(content);
    let parsed: EvaluationResponse = serde_json::from_str(trimmed)
        .map_err(|e| CuratorError::InvalidResponse(e.to_string()))?;

    Ok(parsed
        .evaluation_results
        .into_iter()
        .map(|row| {
            (
                row.media_id,
                CuratorEvaluation {
                    genre_fit: row.genre_fit,
                    tone_fit: row.tone_fit,
                    structure_fit: row.structure_fit,
                    theme_fit: row.theme_fit,
                },
            )
        })
        .collect())
}

fn strip_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .unwrap_or(trimmed)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_response() {
        let body = r#"{"evaluation_results":[{"media_id":1,"genre_fit":2,"tone_fit":2,"structure_fit":1,"theme_fit":1}]}"#;
        let evals = parse_evaluations(body).unwrap();
        assert_eq!(evals[&1].genre_fit, 2);
    }

    #[test]
    fn strips_markdown_fence() {
        let body = "```json\n{\"evaluation_results\":[]}\n```";
        let evals = parse_evaluations(body).unwrap();
        assert!(evals.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_evaluations("not json").is_err());
    }
}
