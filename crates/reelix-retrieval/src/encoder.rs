//! Query Encoder (component A): dense embedding + BM25 sparse vector.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reelix_core::MediaType;

use crate::bm25::{Bm25Model, SparseVector};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("dense embedding backend unavailable: {0}")]
    DenseUnavailable(String),
}

/// Produces a fixed-dimension, L2-normalized dense embedding for a piece of
/// text. Implemented against whatever embedding model the deployment runs;
/// the core only depends on this trait.
#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EncodeError>;
}

#[derive(serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(serde::Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

/// Dense embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint.
/// Reuses the same `api_key`/`base_url` configured for the support LLM calls
/// since both ride the same account.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, base_url: String, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model: model.into(),
        }
    }
}

#[async_trait]
impl DenseEmbedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EncodeError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| EncodeError::DenseUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(EncodeError::DenseUnavailable(format!(
                "embeddings endpoint returned {}",
                resp.status()
            )));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| EncodeError::DenseUnavailable(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| EncodeError::DenseUnavailable("empty embeddings response".to_string()))
    }
}

/// Query encoder: dense + BM25 sparse, run concurrently (§4.A — "result
/// ordering is irrelevant").
pub struct Encoder {
    dense: Arc<dyn DenseEmbedder>,
    bm25_models: HashMap<MediaType, Bm25Model>,
}

impl Encoder {
    pub fn new(dense: Arc<dyn DenseEmbedder>, bm25_models: HashMap<MediaType, Bm25Model>) -> Self {
        Self { dense, bm25_models }
    }

    pub fn encode_sparse(&self, text: &str, media_type: MediaType) -> SparseVector {
        match self.bm25_models.get(&media_type) {
            Some(model) => model.encode(text),
            None => SparseVector::default(),
        }
    }

    pub async fn encode_dense(&self, text: &str) -> Result<Vec<f32>, EncodeError> {
        self.dense.embed(text).await
    }

    /// Encode both concurrently; the sparse half is pure CPU work so it runs
    /// synchronously on this task while the dense half suspends on the
    /// embedding backend's RPC.
    pub async fn dense_and_sparse(
        &self,
        text: &str,
        media_type: MediaType,
    ) -> Result<(Vec<f32>, SparseVector), EncodeError> {
        let dense_fut = self.encode_dense(text);
        let sparse = self.encode_sparse(text, media_type);
        let dense = dense_fut.await?;
        Ok((dense, sparse))
    }
}
