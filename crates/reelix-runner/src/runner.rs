//! Recommendation Runner (component F): encode → filter → pipeline →
//! novelty penalty → ctx_log.

use std::collections::HashSet;
use std::sync::Arc;

use reelix_core::config::RerankWeights;
use reelix_core::{Candidate, ProviderFilterMode, RecQuerySpec, ScoreTrace, TurnKind, UserTasteContext};
use reelix_pipeline::{PipelineError, RecommendationPipeline};
use reelix_retrieval::encoder::{Encoder, EncodeError};
use reelix_retrieval::filter::RetrievalFilter;
use reelix_retrieval::provider_table::provider_ids_from_names;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("query encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Retrieval/taste context audit record (§4.F step 5).
#[derive(Debug, Clone, serde::Serialize)]
pub struct CtxLog {
    pub user_genres: Vec<String>,
    pub user_keywords: Vec<String>,
    pub active_provider_ids: Vec<u32>,
    pub provider_filter_mode: ProviderFilterMode,
}

pub struct RunnerOutput {
    pub candidates: Vec<Candidate>,
    pub traces: Vec<ScoreTrace>,
    pub ctx_log: CtxLog,
}

pub struct RecommendationRunner {
    encoder: Arc<Encoder>,
    pipeline: Arc<RecommendationPipeline>,
}

impl RecommendationRunner {
    pub fn new(encoder: Arc<Encoder>, pipeline: Arc<RecommendationPipeline>) -> Self {
        Self { encoder, pipeline }
    }

    pub async fn run(
        &self,
        taste: &UserTasteContext,
        spec: &RecQuerySpec,
        seen_media_ids: &[i64],
        turn_kind: TurnKind,
        current_year: i32,
        weights: Option<RerankWeights>,
    ) -> Result<RunnerOutput, RunnerError> {
        // Stage 1: encode query (A).
        let (dense_vec, sparse_vec) = self
            .encoder
            .dense_and_sparse(&spec.query_text, spec.media_type)
            .await?;

        // Stage 2: build filter.
        let provider_names: Vec<&str> = spec.providers.iter().map(|s| s.as_str()).collect();
        let mut provider_ids = provider_ids_from_names(provider_names);
        if provider_ids.is_empty() && taste.provider_filter_mode == ProviderFilterMode::Strict {
            provider_ids = taste.active_provider_ids.clone();
        }

        let year_range = spec.year_range.unwrap_or((1970, current_year));
        let genres_any_of: Vec<String> =
            spec.core_genres.iter().map(|g| g.as_str().to_string()).collect();

        let filter = RetrievalFilter {
            genres_any_of,
            provider_ids_any_of: provider_ids.clone(),
            year_range: None,
            exclude_media_ids: Vec::new(),
        }
        .with_year_range(Some(year_range));

        // Stage 3: run pipeline D with per-turn weight overrides.
        let user_genres: HashSet<String> = taste.liked_genres.iter().cloned().collect();
        let result = self
            .pipeline
            .run(
                &dense_vec,
                &sparse_vec,
                spec.media_type,
                &filter,
                &user_genres,
                weights,
            )
            .await?;

        let mut candidates = result.candidates;
        let mut traces = result.traces;

        // Stage 4: novelty penalty on refine turns.
        if turn_kind == TurnKind::Refine {
            apply_novelty_penalty(&mut candidates, &mut traces, seen_media_ids);
        }

        // Stage 5: ctx_log.
        let ctx_log = CtxLog {
            user_genres: taste.liked_genres.clone(),
            user_keywords: taste.liked_keywords.clone(),
            active_provider_ids: provider_ids,
            provider_filter_mode: taste.provider_filter_mode,
        };

        Ok(RunnerOutput {
            candidates,
            traces,
            ctx_log,
        })
    }
}

/// Multiply `final_score` by 0.9 for every already-seen candidate, then
/// re-sort candidates and traces together by the updated score (§4.F step 4).
fn apply_novelty_penalty(candidates: &mut Vec<Candidate>, traces: &mut Vec<ScoreTrace>, seen: &[i64]) {
    let seen_set: HashSet<i64> = seen.iter().copied().collect();

    for trace in traces.iter_mut() {
        if seen_set.contains(&trace.media_id) {
            trace.final_score *= 0.9;
        }
    }

    let mut pairs: Vec<(Candidate, ScoreTrace)> = candidates.drain(..).zip(traces.drain(..)).collect();
    pairs.sort_by(|a, b| b.1.final_score.partial_cmp(&a.1.final_score).unwrap());

    for (candidate, trace) in pairs {
        candidates.push(candidate);
        traces.push(trace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelix_core::{MediaType, RerankWeightsSnapshot};
    use std::collections::HashMap;

    fn trace(media_id: i64, score: f64) -> ScoreTrace {
        ScoreTrace {
            media_id,
            title: format!("Title {media_id}"),
            dense_rank: None,
            sparse_rank: None,
            dense_score: None,
            sparse_score: None,
            meta_score: score,
            meta_breakdown: None,
            curator_evaluation: None,
            final_score: score,
            weights_used: RerankWeightsSnapshot {
                dense: 0.0,
                sparse: 0.0,
                rating: 0.0,
                popularity: 0.0,
                genre: 0.0,
                recency: 0.0,
            },
        }
    }

    fn candidate(media_id: i64) -> Candidate {
        Candidate {
            media_id,
            media_type: MediaType::Movie,
            payload: HashMap::new(),
            dense_score: None,
            sparse_score: None,
        }
    }

    #[test]
    fn novelty_penalty_demotes_seen_items_and_resorts() {
        let mut candidates = vec![candidate(1), candidate(2), candidate(3)];
        let mut traces = vec![trace(1, 1.0), trace(2, 0.95), trace(3, 0.5)];

        apply_novelty_penalty(&mut candidates, &mut traces, &[1]);

        // item 1 drops to 0.9, so item 2 (0.95) now leads.
        assert_eq!(traces[0].media_id, 2);
        assert_eq!(candidates[0].media_id, 2);
        assert!((traces[1].final_score - 0.9).abs() < 1e-9);
    }
}
