//! Reciprocal Rank Fusion (§4.C pool formation).

use std::collections::HashMap;

/// `score(id) = Σ 1/(k + rank_in_list)`, ranks 1-based. Returns ids sorted
/// by descending score; ties keep the order ids first appeared in.
pub fn rrf(rankings: &[Vec<i64>], k: f64) -> Vec<(i64, f64)> {
    let mut scores: HashMap<i64, f64> = HashMap::new();
    let mut order: Vec<i64> = Vec::new();

    for ranking in rankings {
        for (idx, &id) in ranking.iter().enumerate() {
            let rank = (idx + 1) as f64;
            let entry = scores.entry(id).or_insert_with(|| {
                order.push(id);
                0.0
            });
            *entry += 1.0 / (k + rank);
        }
    }

    let mut out: Vec<(i64, f64)> = order.into_iter().map(|id| (id, scores[&id])).collect();
    out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// §8 property 2.
    #[test]
    fn matches_the_spec_worked_example() {
        let l1 = vec![1, 2, 3]; // a, b, c
        let l2 = vec![2, 4, 1]; // b, d, a
        let scores = rrf(&[l1, l2], 60.0);
        let lookup: HashMap<i64, f64> = scores.iter().copied().collect();

        let score_a = 1.0 / 61.0 + 1.0 / 63.0;
        let score_b = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((lookup[&1] - score_a).abs() < 1e-12);
        assert!((lookup[&2] - score_b).abs() < 1e-12);

        let descending = scores.windows(2).all(|w| w[0].1 >= w[1].1);
        assert!(descending);
    }

    #[test]
    fn empty_rankings_yield_empty_pool() {
        assert!(rrf(&[], 60.0).is_empty());
    }
}
