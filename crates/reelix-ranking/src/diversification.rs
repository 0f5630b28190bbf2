//! Collection-based diversification (§4.C diversification substage).

use serde::Serialize;

use reelix_core::Candidate;

#[derive(Debug, Clone, Serialize)]
pub struct PrunedEntry {
    pub media_id: i64,
    pub collection: String,
    pub title: String,
}

/// Cap candidates sharing the same `collection` field to `per_collection_cap`,
/// processing in the caller's (descending metadata score) order. Items with
/// no collection get a synthetic unique key so solo titles never collide
/// (§8 property 3).
pub fn diversify_by_collection(
    candidates: Vec<Candidate>,
    per_collection_cap: usize,
) -> (Vec<Candidate>, Vec<PrunedEntry>) {
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut kept = Vec::with_capacity(candidates.len());
    let mut pruned = Vec::new();

    for c in candidates {
        let key = c
            .collection()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("__solo__:{}", c.media_id));

        let count = counts.entry(key.clone()).or_insert(0);
        if *count >= per_collection_cap {
            pruned.push(PrunedEntry {
                media_id: c.media_id,
                collection: key,
                title: c.title(),
            });
            continue;
        }
        *count += 1;
        kept.push(c);
    }

    (kept, pruned)
}
