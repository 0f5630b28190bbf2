//! Query-time BM25 sparse encoding (§4.A).
//!
//! Corpus statistics (`idf`, `avgdl`, `k1`) and the term→index vocabulary are
//! built offline by the indexing pipeline and loaded here read-only; this
//! module only turns a query string into a sparse `(indices, values)` vector
//! against that fixed vocabulary.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tokenizer::tokenize_for_bm25;

/// Corpus-level BM25 statistics for one media type, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Model {
    pub vocab: HashMap<String, u32>,
    pub idf: HashMap<String, f64>,
    pub avgdl: f64,
    pub k1: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum Bm25LoadError {
    #[error("failed to read bm25 model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse bm25 model file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Bm25Model {
    /// Load corpus statistics produced offline by the indexing pipeline.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, Bm25LoadError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// A sparse vector as qdrant expects it: indices sorted ascending, `values`
/// aligned 1:1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f64>,
}

/// Query-time term-frequency clip — repeated terms in a short query should
/// not dominate the weight.
const TF_CLIP: u32 = 3;
/// Disables document-length normalization for the query: the query's own
/// length must not penalize it.
const B_QUERY: f64 = 0.0;

impl Bm25Model {
    /// Encode `text` against this model's vocabulary (§4.A).
    pub fn encode(&self, text: &str) -> SparseVector {
        let tokens = tokenize_for_bm25(text);
        if tokens.is_empty() {
            return SparseVector::default();
        }

        let mut term_counts: HashMap<&str, u32> = HashMap::new();
        for t in &tokens {
            *term_counts.entry(t.as_str()).or_insert(0) += 1;
        }
        let unique_len = term_counts.len() as f64;

        let mut pairs: Vec<(u32, f64)> = Vec::with_capacity(term_counts.len());
        for (term, raw_tf) in &term_counts {
            let Some(&idx) = self.vocab.get(*term) else {
                continue;
            };
            let tf = (*raw_tf).min(TF_CLIP) as f64;
            let idf = *self.idf.get(*term).unwrap_or(&0.0);

            let denom = tf + self.k1 * (1.0 - B_QUERY + B_QUERY * (unique_len / self.avgdl));
            if denom <= 0.0 {
                continue;
            }
            let weight = idf * tf * (self.k1 + 1.0) / denom;
            pairs.push((idx, weight));
        }

        pairs.sort_by_key(|(idx, _)| *idx);
        let (indices, values) = pairs.into_iter().unzip();
        SparseVector { indices, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_model() -> Bm25Model {
        let mut vocab = HashMap::new();
        vocab.insert("mind".to_string(), 0);
        vocab.insert("bend".to_string(), 1);
        vocab.insert("sci".to_string(), 2);
        let mut idf = HashMap::new();
        idf.insert("mind".to_string(), 2.0);
        idf.insert("bend".to_string(), 1.5);
        idf.insert("sci".to_string(), 1.0);
        Bm25Model {
            vocab,
            idf,
            avgdl: 20.0,
            k1: 1.2,
        }
    }

    #[test]
    fn idempotent_encoding() {
        let model = toy_model();
        let text = "mind-bending sci-fi, mind blowing";
        assert_eq!(model.encode(text), model.encode(text));
    }

    #[test]
    fn drops_out_of_vocabulary_terms() {
        let model = toy_model();
        let v = model.encode("a completely unrelated phrase");
        assert!(v.indices.is_empty());
    }

    #[test]
    fn indices_are_sorted() {
        let model = toy_model();
        let v = model.encode("sci mind bend");
        let mut sorted = v.indices.clone();
        sorted.sort();
        assert_eq!(v.indices, sorted);
    }
}
