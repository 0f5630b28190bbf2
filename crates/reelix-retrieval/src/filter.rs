//! Retrieval filter shared by dense and sparse search (§4.B).

use serde::Serialize;

/// Conjunction of genre/provider/year/exclusion conditions. Built by the
/// runner (F) from a `RecQuerySpec`, consumed unchanged by the retriever (B).
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilter {
    pub genres_any_of: Vec<String>,
    pub provider_ids_any_of: Vec<u32>,
    /// Inclusive, auto-swapped if `start > end`.
    pub year_range: Option<(i32, i32)>,
    pub exclude_media_ids: Vec<i64>,
}

impl RetrievalFilter {
    pub fn with_year_range(mut self, range: Option<(i32, i32)>) -> Self {
        self.year_range = range.map(|(start, end)| if start > end { (end, start) } else { (start, end) });
        self
    }

    /// Render as a Qdrant `Filter` JSON body.
    pub fn to_qdrant_json(&self) -> serde_json::Value {
        let mut must: Vec<serde_json::Value> = Vec::new();
        let mut must_not: Vec<serde_json::Value> = Vec::new();

        if !self.genres_any_of.is_empty() {
            must.push(serde_json::json!({
                "key": "genres",
                "match": { "any": self.genres_any_of },
            }));
        }
        if !self.provider_ids_any_of.is_empty() {
            must.push(serde_json::json!({
                "key": "watch_providers",
                "match": { "any": self.provider_ids_any_of },
            }));
        }
        if let Some((start, end)) = self.year_range {
            must.push(serde_json::json!({
                "key": "release_year",
                "range": { "gte": start, "lte": end },
            }));
        }
        if !self.exclude_media_ids.is_empty() {
            must_not.push(serde_json::json!({
                "key": "media_id",
                "match": { "any": self.exclude_media_ids },
            }));
        }

        let mut filter = serde_json::Map::new();
        if !must.is_empty() {
            filter.insert("must".to_string(), serde_json::Value::Array(must));
        }
        if !must_not.is_empty() {
            filter.insert("must_not".to_string(), serde_json::Value::Array(must_not));
        }
        serde_json::Value::Object(filter)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Bm25TermVector {
    pub indices: Vec<u32>,
    pub values: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_reversed_year_range() {
        let f = RetrievalFilter::default().with_year_range(Some((2020, 1990)));
        assert_eq!(f.year_range, Some((1990, 2020)));
    }

    /// §8 property 1: widening the year range must only ever add candidates.
    #[test]
    fn widening_year_range_is_a_superset_filter() {
        let narrow = RetrievalFilter::default().with_year_range(Some((2000, 2010)));
        let wide = RetrievalFilter::default().with_year_range(Some((1999, 2011)));
        let (ns, ne) = narrow.year_range.unwrap();
        let (ws, we) = wide.year_range.unwrap();
        assert!(ws <= ns && we >= ne);
    }
}
