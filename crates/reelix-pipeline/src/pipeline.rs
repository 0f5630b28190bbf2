//! Recommendation Pipeline (component D): orchestrates A–C into a ranked
//! candidate list with per-candidate traces.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use reelix_core::config::{RankingConfig, RerankWeights};
use reelix_core::{Candidate, MediaType, RerankWeightsSnapshot, ScoreTrace};
use reelix_ranking::{diversify_by_collection, metadata_rerank, rrf, NormAnchors};
use reelix_retrieval::bm25::SparseVector;
use reelix_retrieval::{RetrievalError, RetrievalFilter, VectorRetriever};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
}

pub struct PipelineResult {
    pub candidates: Vec<Candidate>,
    pub traces: Vec<ScoreTrace>,
}

/// Stateless once constructed: safe to share across concurrent turns (§4.D
/// — "concurrency-safe because no shared mutable state").
pub struct RecommendationPipeline {
    retriever: Arc<dyn VectorRetriever>,
    config: RankingConfig,
}

impl RecommendationPipeline {
    pub fn new(retriever: Arc<dyn VectorRetriever>, config: RankingConfig) -> Self {
        Self { retriever, config }
    }

    pub async fn run(
        &self,
        dense_vec: &[f32],
        sparse_vec: &SparseVector,
        media_type: MediaType,
        filter: &RetrievalFilter,
        user_genres: &HashSet<String>,
        weights: Option<RerankWeights>,
    ) -> Result<PipelineResult, PipelineError> {
        let weights = weights.unwrap_or(self.config.weights);

        // Stage 1: parallel dense + sparse retrieval. Dense failing is fatal
        // (there is nothing to rank); sparse failing degrades to an empty
        // sparse list with a warning so the turn still produces a slate
        // (§4.B — "Partial results (dense OK, sparse failed) proceed").
        let (dense_result, sparse_result) = tokio::join!(
            self.retriever
                .dense(dense_vec, media_type, filter, self.config.dense_limit),
            self.retriever
                .sparse(sparse_vec, media_type, filter, self.config.sparse_limit),
        );
        let dense_hits = dense_result?;
        let sparse_hits = sparse_result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "sparse retrieval failed, proceeding with dense-only pool");
            Vec::new()
        });

        // Stage 2: RRF pool (rank-ordered id lists, already sorted by score
        // on the way out of the retriever).
        let dense_order: Vec<i64> = dense_hits.iter().map(|c| c.media_id).collect();
        let sparse_order: Vec<i64> = sparse_hits.iter().map(|c| c.media_id).collect();
        let pool_scores = rrf(&[dense_order.clone(), sparse_order.clone()], self.config.rrf_k);
        let pool_ids: HashSet<i64> = pool_scores.iter().map(|(id, _)| *id).collect();

        let dense_rank: HashMap<i64, usize> = dense_order
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i + 1))
            .collect();
        let sparse_rank: HashMap<i64, usize> = sparse_order
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i + 1))
            .collect();

        // Stage 3: merge into Candidate objects keeping both score sources.
        let mut merged: HashMap<i64, Candidate> = HashMap::new();
        for c in dense_hits {
            merged.entry(c.media_id).or_insert(c);
        }
        for c in sparse_hits {
            merged
                .entry(c.media_id)
                .and_modify(|existing| existing.sparse_score = c.sparse_score)
                .or_insert(c);
        }
        let pooled: Vec<Candidate> = merged
            .into_iter()
            .filter(|(id, _)| pool_ids.contains(id))
            .map(|(_, c)| c)
            .collect();

        // Stage 4: metadata rerank, keep top meta_top_n.
        let anchors = NormAnchors::for_media_type(media_type);
        let mut ranked = metadata_rerank(pooled, user_genres, media_type, &weights, Some(anchors));
        ranked.truncate(self.config.meta_top_n);

        let meta_lookup: HashMap<i64, f64> =
            ranked.iter().map(|(c, score, _)| (c.media_id, *score)).collect();
        let breakdown_lookup: HashMap<i64, reelix_core::ScoreBreakdown> = ranked
            .iter()
            .map(|(c, _, breakdown)| (c.media_id, breakdown.clone()))
            .collect();

        let meta_ordered: Vec<Candidate> = ranked.into_iter().map(|(c, _, _)| c).collect();

        // Stage 5: diversify by collection.
        let (diversified, _pruned) =
            diversify_by_collection(meta_ordered, self.config.diversify_per_collection_cap);

        // Stage 6: truncate to final_top_k; cross-encoder/final-fusion RRF
        // are gated off by default, so final_score == meta score.
        let mut candidates = diversified;
        candidates.truncate(self.config.final_top_k);

        let weights_snapshot = RerankWeightsSnapshot {
            dense: weights.dense,
            sparse: weights.sparse,
            rating: weights.rating,
            popularity: weights.popularity,
            genre: weights.genre,
            recency: weights.recency,
        };

        let traces = candidates
            .iter()
            .map(|c| {
                let meta_score = meta_lookup.get(&c.media_id).copied().unwrap_or(0.0);
                ScoreTrace {
                    media_id: c.media_id,
                    title: c.title(),
                    dense_rank: dense_rank.get(&c.media_id).copied(),
                    sparse_rank: sparse_rank.get(&c.media_id).copied(),
                    dense_score: c.dense_score,
                    sparse_score: c.sparse_score,
                    meta_score,
                    meta_breakdown: breakdown_lookup.get(&c.media_id).cloned(),
                    curator_evaluation: None,
                    final_score: meta_score,
                    weights_used: weights_snapshot,
                }
            })
            .collect();

        Ok(PipelineResult { candidates, traces })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap as Map;

    struct FakeRetriever;

    fn candidate(id: i64, dense: Option<f64>, sparse: Option<f64>) -> Candidate {
        let mut payload = Map::new();
        payload.insert("title".to_string(), serde_json::json!(format!("Title {id}")));
        Candidate {
            media_id: id,
            media_type: MediaType::Movie,
            payload,
            dense_score: dense,
            sparse_score: sparse,
        }
    }

    #[async_trait]
    impl VectorRetriever for FakeRetriever {
        async fn dense(
            &self,
            _dense_vec: &[f32],
            _media_type: MediaType,
            _filter: &RetrievalFilter,
            _limit: usize,
        ) -> Result<Vec<Candidate>, RetrievalError> {
            Ok(vec![
                candidate(1, Some(0.9), None),
                candidate(2, Some(0.8), None),
                candidate(3, Some(0.1), None),
            ])
        }

        async fn sparse(
            &self,
            _sparse_vec: &SparseVector,
            _media_type: MediaType,
            _filter: &RetrievalFilter,
            _limit: usize,
        ) -> Result<Vec<Candidate>, RetrievalError> {
            Ok(vec![candidate(2, None, Some(5.0)), candidate(4, None, Some(1.0))])
        }
    }

    #[tokio::test]
    async fn merges_and_ranks_candidates() {
        let pipeline = RecommendationPipeline::new(Arc::new(FakeRetriever), RankingConfig::default());
        let filter = RetrievalFilter::default();
        let result = pipeline
            .run(&[0.0; 4], &SparseVector::default(), MediaType::Movie, &filter, &HashSet::new(), None)
            .await
            .unwrap();

        assert!(!result.candidates.is_empty());
        let ids: HashSet<i64> = result.candidates.iter().map(|c| c.media_id).collect();
        assert!(ids.contains(&2), "candidate present in both lists should survive the pool");
        for trace in &result.traces {
            assert!(trace.final_score.is_finite());
        }
    }
}
