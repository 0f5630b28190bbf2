//! Metadata reranking (§4.C metadata rerank substage).

use std::collections::HashSet;

use reelix_core::config::RerankWeights;
use reelix_core::{Candidate, FeatureContribution, MediaType, ScoreBreakdown};

#[derive(Debug, Clone, Copy)]
pub struct NormAnchors {
    pub rating_floor: f64,
    pub rating_ceil: f64,
    pub pop_anchor: f64,
}

impl NormAnchors {
    pub fn for_media_type(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Movie => Self {
                rating_floor: 6.0,
                rating_ceil: 9.0,
                pop_anchor: 31.0,
            },
            MediaType::Tv => Self {
                rating_floor: 7.0,
                rating_ceil: 9.0,
                pop_anchor: 58.0,
            },
        }
    }
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Bayesian-smoothed rating: pulls sparsely-rated items toward the global
/// prior `mu` so a handful of 10/10 votes can't outrank a well-established title.
pub fn bayes_quality(avg: f64, cnt: f64, mu: f64, m: f64) -> f64 {
    (mu * m + avg * cnt) / (m + cnt)
}

pub fn norm_rating(x: Option<f64>, floor: f64, ceil: f64) -> f64 {
    match x {
        None => 0.0,
        Some(v) => clamp01((v - floor) / (ceil - floor).max(1e-6)),
    }
}

pub fn norm_popularity(pop: Option<f64>, anchor: f64, alpha: f64) -> f64 {
    match pop {
        None => 0.0,
        Some(p) => clamp01((p.ln_1p() / anchor.ln_1p()).powf(alpha)),
    }
}

/// Only rewards overlap; cold-start users with no recorded genre preference
/// get no penalty from it either way.
pub fn genre_boost(user_genres: &HashSet<String>, item_genres: &HashSet<String>) -> f64 {
    if user_genres.is_empty() || item_genres.is_empty() {
        return 0.0;
    }
    let inter = user_genres.intersection(item_genres).count() as f64;
    inter / user_genres.len() as f64
}

/// Rerank `candidates` by weighted, normalized per-feature metadata score.
/// Returns `(candidate, score, breakdown)` sorted by descending score.
pub fn metadata_rerank(
    candidates: Vec<Candidate>,
    user_genres: &HashSet<String>,
    media_type: MediaType,
    weights: &RerankWeights,
    anchors: Option<NormAnchors>,
) -> Vec<(Candidate, f64, ScoreBreakdown)> {
    let anchors = anchors.unwrap_or_else(|| NormAnchors::for_media_type(media_type));

    let mut sparse_vals: Vec<f64> = candidates
        .iter()
        .filter_map(|c| c.sparse_score)
        .filter(|&v| v > 0.0)
        .collect();
    sparse_vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let p95 = if sparse_vals.is_empty() {
        1e-6
    } else {
        let idx = (0.95 * (sparse_vals.len() - 1) as f64) as usize;
        sparse_vals[idx]
    };
    let den = p95.ln_1p().max(1e-6);

    let mut out = Vec::with_capacity(candidates.len());
    for c in candidates {
        let dense = clamp01(c.dense_score.unwrap_or(0.0));
        let raw_sparse = c.sparse_score.unwrap_or(0.0).max(0.0);
        let sparse = clamp01(raw_sparse.ln_1p() / den);

        let raw_avg = c.payload.get("vote_average").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let raw_cnt = c.payload.get("vote_count").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let smoothed = bayes_quality(raw_avg, raw_cnt, 7.0, 2000.0);
        let rating = norm_rating(Some(smoothed), anchors.rating_floor, anchors.rating_ceil);

        let popularity = norm_popularity(
            c.payload.get("popularity").and_then(|v| v.as_f64()),
            anchors.pop_anchor,
            0.6,
        );

        let item_genres: HashSet<String> = c.genres().into_iter().collect();
        let genre = genre_boost(user_genres, &item_genres);

        let mut breakdown = ScoreBreakdown::default();
        breakdown.features.insert("dense".into(), FeatureContribution::new(dense, weights.dense));
        breakdown.features.insert("sparse".into(), FeatureContribution::new(sparse, weights.sparse));
        breakdown.features.insert("rating".into(), FeatureContribution::new(rating, weights.rating));
        breakdown
            .features
            .insert("popularity".into(), FeatureContribution::new(popularity, weights.popularity));
        breakdown.features.insert("genre".into(), FeatureContribution::new(genre, weights.genre));

        let score = breakdown.total();
        out.push((c, score, breakdown));
    }

    out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelix_core::config::RerankWeights;
    use std::collections::HashMap as Map;

    fn candidate(dense: Option<f64>, sparse: Option<f64>, popularity: f64) -> Candidate {
        let mut payload = Map::new();
        payload.insert("popularity".into(), serde_json::json!(popularity));
        Candidate {
            media_id: 1,
            media_type: MediaType::Movie,
            payload,
            dense_score: dense,
            sparse_score: sparse,
        }
    }

    /// §4.C: "all clamped to [0, 1]" — raw cosine can dip slightly negative.
    #[test]
    fn dense_feature_is_clamped_non_negative() {
        let out = metadata_rerank(
            vec![candidate(Some(-0.2), None, 0.0)],
            &HashSet::new(),
            MediaType::Movie,
            &RerankWeights::default(),
            None,
        );
        assert_eq!(out[0].2.features["dense"].value, 0.0);
    }

    /// A popularity figure far above the P99 anchor must not push the
    /// normalized feature above 1.0.
    #[test]
    fn popularity_feature_is_clamped_to_one() {
        let anchors = NormAnchors {
            rating_floor: 6.0,
            rating_ceil: 9.0,
            pop_anchor: 10.0,
        };
        let out = metadata_rerank(
            vec![candidate(None, None, 10_000.0)],
            &HashSet::new(),
            MediaType::Movie,
            &RerankWeights::default(),
            Some(anchors),
        );
        assert_eq!(out[0].2.features["popularity"].value, 1.0);
    }

    #[test]
    fn empty_sparse_pool_yields_zero_sparse_feature() {
        let out = metadata_rerank(
            vec![candidate(None, None, 0.0)],
            &HashSet::new(),
            MediaType::Movie,
            &RerankWeights::default(),
            None,
        );
        assert_eq!(out[0].2.features["sparse"].value, 0.0);
    }
}
