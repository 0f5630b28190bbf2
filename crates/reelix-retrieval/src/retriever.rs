//! Vector Retriever (component B): dense and sparse top-K search.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reelix_core::{Candidate, MediaType};
use serde_json::Value;

use crate::bm25::SparseVector;
use crate::filter::RetrievalFilter;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("vector store unavailable: {0}")]
    Unavailable(String),
}

/// The two search operations the pipeline needs. Dense and sparse are
/// deliberately symmetric so `D` can join them with `tokio::join!`.
#[async_trait]
pub trait VectorRetriever: Send + Sync {
    async fn dense(
        &self,
        dense_vec: &[f32],
        media_type: MediaType,
        filter: &RetrievalFilter,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError>;

    async fn sparse(
        &self,
        sparse_vec: &SparseVector,
        media_type: MediaType,
        filter: &RetrievalFilter,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError>;
}

/// Retriever backed by a Qdrant collection pair (`movies`, `tv`), each with
/// named dense + sparse vectors, addressed over Qdrant's REST API.
pub struct QdrantRetriever {
    client: reqwest::Client,
    base_url: String,
    movie_collection: String,
    tv_collection: String,
    dense_vector_name: String,
    sparse_vector_name: String,
    /// Per-call budget (§4.B): exceeding this maps to `RetrievalUnavailable`.
    call_budget: Duration,
}

impl QdrantRetriever {
    pub fn new(
        base_url: impl Into<String>,
        movie_collection: impl Into<String>,
        tv_collection: impl Into<String>,
        dense_vector_name: impl Into<String>,
        sparse_vector_name: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            movie_collection: movie_collection.into(),
            tv_collection: tv_collection.into(),
            dense_vector_name: dense_vector_name.into(),
            sparse_vector_name: sparse_vector_name.into(),
            call_budget: Duration::from_secs(3),
        }
    }

    fn collection_for(&self, media_type: MediaType) -> &str {
        match media_type {
            MediaType::Movie => &self.movie_collection,
            MediaType::Tv => &self.tv_collection,
        }
    }

    async fn search(
        &self,
        media_type: MediaType,
        body: Value,
        limit: usize,
        score_kind: ScoreKind,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let url = format!(
            "{}/collections/{}/points/query",
            self.base_url,
            self.collection_for(media_type)
        );

        let resp = self
            .client
            .post(&url)
            .timeout(self.call_budget)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(RetrievalError::Unavailable(format!("qdrant returned {status}")));
        }

        let parsed: QdrantQueryResponse = resp
            .json()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let candidates = parsed
            .result
            .points
            .into_iter()
            .take(limit)
            .map(|p| point_to_candidate(p, media_type, score_kind))
            .collect();
        Ok(candidates)
    }
}

#[derive(Debug, Clone, Copy)]
enum ScoreKind {
    Dense,
    Sparse,
}

#[async_trait]
impl VectorRetriever for QdrantRetriever {
    async fn dense(
        &self,
        dense_vec: &[f32],
        media_type: MediaType,
        filter: &RetrievalFilter,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let body = serde_json::json!({
            "query": dense_vec,
            "using": self.dense_vector_name,
            "filter": filter.to_qdrant_json(),
            "limit": limit,
            "with_payload": true,
        });
        self.search(media_type, body, limit, ScoreKind::Dense).await
    }

    async fn sparse(
        &self,
        sparse_vec: &SparseVector,
        media_type: MediaType,
        filter: &RetrievalFilter,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let body = serde_json::json!({
            "query": { "indices": sparse_vec.indices, "values": sparse_vec.values },
            "using": self.sparse_vector_name,
            "filter": filter.to_qdrant_json(),
            "limit": limit,
            "with_payload": true,
        });
        self.search(media_type, body, limit, ScoreKind::Sparse).await
    }
}

#[derive(Debug, serde::Deserialize)]
struct QdrantQueryResponse {
    result: QdrantQueryResult,
}

#[derive(Debug, serde::Deserialize)]
struct QdrantQueryResult {
    points: Vec<QdrantPoint>,
}

#[derive(Debug, serde::Deserialize)]
struct QdrantPoint {
    id: Value,
    score: Option<f64>,
    payload: Option<HashMap<String, Value>>,
}

fn point_to_candidate(point: QdrantPoint, media_type: MediaType, score_kind: ScoreKind) -> Candidate {
    let payload = point.payload.unwrap_or_default();
    let media_id = payload
        .get("media_id")
        .and_then(|v| v.as_i64())
        .or_else(|| point.id.as_i64())
        .unwrap_or(0);

    let (dense_score, sparse_score) = match score_kind {
        ScoreKind::Dense => (point.score, None),
        ScoreKind::Sparse => (None, point.score),
    };

    Candidate {
        media_id,
        media_type,
        payload,
        dense_score,
        sparse_score,
    }
}
