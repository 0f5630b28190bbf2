//! Deterministic curator tiering (§4.E). Operates on the pipeline's
//! already-ranked candidate list; never re-sorts within a tier.

use std::collections::HashMap;

use reelix_core::{Candidate, CuratorEvaluation};

/// Missing candidates (the LLM scored everything else but dropped one) get
/// this default rather than being excluded — `total_fit = 4`, `genre_fit = 1`
/// lands them in `moderate_match`.
pub const DEFAULT_EVALUATION: CuratorEvaluation = CuratorEvaluation {
    genre_fit: 1,
    tone_fit: 1,
    structure_fit: 1,
    theme_fit: 1,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Strong,
    Moderate,
    NoMatch,
}

pub fn classify(eval: CuratorEvaluation) -> Tier {
    let total = eval.total_fit();
    if (eval.genre_fit == 2 && eval.tone_fit == 2) || (total >= 5 && eval.genre_fit >= 1) {
        Tier::Strong
    } else if (3..=4).contains(&total) && eval.genre_fit >= 1 {
        Tier::Moderate
    } else {
        Tier::NoMatch
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CuratorStats {
    pub strong_count: usize,
    pub moderate_count: usize,
    pub no_match_count: usize,
    pub selected_count: usize,
}

/// Partition `candidates` (in pipeline order) into tiers, then select a
/// final slate targeting `limit` per the five-case rule in §4.E.
pub fn apply_curator_tiers(
    candidates: Vec<Candidate>,
    evaluations: &HashMap<i64, CuratorEvaluation>,
    limit: usize,
) -> (Vec<Candidate>, CuratorStats) {
    let mut strongs = Vec::new();
    let mut moderates = Vec::new();
    let mut no_matches = 0usize;

    for candidate in candidates {
        let eval = evaluations
            .get(&candidate.media_id)
            .copied()
            .unwrap_or(DEFAULT_EVALUATION);
        match classify(eval) {
            Tier::Strong => strongs.push(candidate),
            Tier::Moderate => moderates.push(candidate),
            Tier::NoMatch => no_matches += 1,
        }
    }

    let stats_pre = CuratorStats {
        strong_count: strongs.len(),
        moderate_count: moderates.len(),
        no_match_count: no_matches,
        selected_count: 0,
    };

    let s = strongs.len();
    let mut selected: Vec<Candidate> = Vec::new();
    if s >= limit {
        selected.extend(strongs.into_iter().take(limit));
    } else if s >= 5 {
        selected.extend(strongs);
    } else if (3..=4).contains(&s) {
        selected.extend(strongs);
        let room = limit.saturating_sub(selected.len()).min(2);
        selected.extend(moderates.into_iter().take(room));
    } else if s == 1 || s == 2 {
        selected.extend(strongs);
        let room = limit.saturating_sub(selected.len()).min(4);
        selected.extend(moderates.into_iter().take(room));
    } else {
        let room = limit.min(5);
        selected.extend(moderates.into_iter().take(room));
    }

    let stats = CuratorStats {
        selected_count: selected.len(),
        ..stats_pre
    };

    (selected, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn candidate(id: i64) -> Candidate {
        Candidate {
            media_id: id,
            media_type: reelix_core::MediaType::Movie,
            payload: Map::new(),
            dense_score: None,
            sparse_score: None,
        }
    }

    fn eval(genre: u8, tone: u8, structure: u8, theme: u8) -> CuratorEvaluation {
        CuratorEvaluation {
            genre_fit: genre,
            tone_fit: tone,
            structure_fit: structure,
            theme_fit: theme,
        }
    }

    #[test]
    fn classifies_strong_via_genre_and_tone() {
        assert_eq!(classify(eval(2, 2, 0, 0)), Tier::Strong);
    }

    #[test]
    fn classifies_strong_via_total_fit() {
        assert_eq!(classify(eval(1, 2, 2, 1)), Tier::Strong);
    }

    #[test]
    fn classifies_moderate() {
        assert_eq!(classify(eval(1, 1, 1, 0)), Tier::Moderate);
    }

    #[test]
    fn classifies_no_match_without_genre_fit() {
        assert_eq!(classify(eval(0, 2, 2, 2)), Tier::NoMatch);
    }

    #[test]
    fn enough_strongs_fills_limit_alone() {
        let candidates: Vec<Candidate> = (1..=10).map(candidate).collect();
        let evals: Map<i64, CuratorEvaluation> =
            candidates.iter().map(|c| (c.media_id, eval(2, 2, 2, 2))).collect();

        let (selected, stats) = apply_curator_tiers(candidates, &evals, 8);
        assert_eq!(selected.len(), 8);
        assert_eq!(stats.strong_count, 10);
    }

    #[test]
    fn zero_strongs_falls_back_to_moderates() {
        let candidates: Vec<Candidate> = (1..=10).map(candidate).collect();
        let evals: Map<i64, CuratorEvaluation> =
            candidates.iter().map(|c| (c.media_id, eval(1, 1, 1, 0))).collect();

        let (selected, stats) = apply_curator_tiers(candidates, &evals, 8);
        assert_eq!(selected.len(), 5);
        assert_eq!(stats.strong_count, 0);
        assert_eq!(stats.moderate_count, 10);
    }

    #[test]
    fn missing_evaluation_defaults_to_moderate() {
        let candidates = vec![candidate(1)];
        let (selected, stats) = apply_curator_tiers(candidates, &Map::new(), 8);
        assert_eq!(selected.len(), 1);
        assert_eq!(stats.moderate_count, 1);
    }

    #[test]
    fn two_to_four_strongs_cap_moderates() {
        let mut candidates: Vec<Candidate> = (1..=3).map(candidate).collect();
        candidates.extend((4..=10).map(candidate));
        let mut evals = Map::new();
        for c in candidates.iter().take(3) {
            evals.insert(c.media_id, eval(2, 2, 2, 2));
        }
        for c in candidates.iter().skip(3) {
            evals.insert(c.media_id, eval(1, 1, 1, 0));
        }

        let (selected, stats) = apply_curator_tiers(candidates, &evals, 8);
        assert_eq!(stats.strong_count, 3);
        assert_eq!(selected.len(), 3 + 2);
    }
}
