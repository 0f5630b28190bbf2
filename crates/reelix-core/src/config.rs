use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ReelixError;

pub const DEFAULT_PORT: u16 = 8088;
pub const DEFAULT_BIND: &str = "0.0.0.0";
/// Client idle budget for one `/explore` turn before the server gives up on it.
pub const IDLE_TTL_SEC: u64 = 900;
/// SSE heartbeat cadence — both `/explore` and `/explore/why` use this comment
/// frame interval while waiting on the model.
pub const HEARTBEAT_SEC: u64 = 15;

/// Top-level config (reelix.toml + REELIX_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReelixConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub qdrant: QdrantConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for ReelixConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379/0".to_string(),
            },
            qdrant: QdrantConfig {
                url: "http://127.0.0.1:6334".to_string(),
                movie_collection: "movies".to_string(),
                tv_collection: "tv".to_string(),
                dense_vector_name: default_dense_vector_name(),
                sparse_vector_name: default_sparse_vector_name(),
            },
            llm: LlmConfig::default(),
            ranking: RankingConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth: AuthConfig {
                mode: AuthMode::Token,
                token: Some("change-me".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub token: Option<String>,
}

/// Authorization is delegated upstream (§6): the caller's `user_id` has
/// already been resolved by the time a request reaches this core. This mode
/// only governs the bearer token this core itself checks before trusting
/// the `user_id` the caller claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    Token,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub url: String,
    #[serde(default = "default_movie_collection")]
    pub movie_collection: String,
    #[serde(default = "default_tv_collection")]
    pub tv_collection: String,
    #[serde(default = "default_dense_vector_name")]
    pub dense_vector_name: String,
    #[serde(default = "default_sparse_vector_name")]
    pub sparse_vector_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiProviderConfig>,
    /// Model used by the orchestrator's tool-calling turn loop.
    #[serde(default = "default_orchestrator_model")]
    pub orchestrator_model: String,
    /// Model used by the curator, why-explanation, and reflection calls —
    /// these are cheap, high-volume, low-latency calls by design.
    #[serde(default = "default_support_model")]
    pub support_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            anthropic: None,
            openai: None,
            orchestrator_model: default_orchestrator_model(),
            support_model: default_support_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

/// Tunables for components C/D/E — every field has a spec-mandated default
/// and may be overridden per-deployment without a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
    #[serde(default = "default_meta_top_n")]
    pub meta_top_n: usize,
    #[serde(default = "default_final_top_k")]
    pub final_top_k: usize,
    #[serde(default = "default_dense_limit")]
    pub dense_limit: usize,
    #[serde(default = "default_sparse_limit")]
    pub sparse_limit: usize,
    #[serde(default = "default_diversify_cap")]
    pub diversify_per_collection_cap: usize,
    #[serde(default)]
    pub weights: RerankWeights,
    /// Cross-encoder rerank and final-fusion RRF — gated off by default (§4.D).
    #[serde(default)]
    pub cross_encoder_enabled: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            meta_top_n: default_meta_top_n(),
            final_top_k: default_final_top_k(),
            dense_limit: default_dense_limit(),
            sparse_limit: default_sparse_limit(),
            diversify_per_collection_cap: default_diversify_cap(),
            weights: RerankWeights::default(),
            cross_encoder_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RerankWeights {
    pub dense: f64,
    pub sparse: f64,
    pub rating: f64,
    pub popularity: f64,
    pub genre: f64,
    pub recency: f64,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            dense: 0.60,
            sparse: 0.10,
            rating: 0.18,
            popularity: 0.12,
            genre: 0.00,
            recency: 0.00,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl")]
    pub sliding_ttl_sec: u64,
    #[serde(default = "default_session_absolute_ttl")]
    pub absolute_ttl_sec: u64,
    #[serde(default = "default_ticket_ttl")]
    pub ticket_sliding_ttl_sec: u64,
    #[serde(default = "default_ticket_absolute_ttl")]
    pub ticket_absolute_ttl_sec: u64,
    #[serde(default = "default_seen_ids_cap")]
    pub seen_ids_cap: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sliding_ttl_sec: default_session_ttl(),
            absolute_ttl_sec: default_session_absolute_ttl(),
            ticket_sliding_ttl_sec: default_ticket_ttl(),
            ticket_absolute_ttl_sec: default_ticket_absolute_ttl(),
            seen_ids_cap: default_seen_ids_cap(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_movie_collection() -> String {
    "movies".to_string()
}
fn default_tv_collection() -> String {
    "tv".to_string()
}
fn default_dense_vector_name() -> String {
    "dense_vector".to_string()
}
fn default_sparse_vector_name() -> String {
    "sparse_vector".to_string()
}
fn default_orchestrator_model() -> String {
    "claude-sonnet-4-5".to_string()
}
fn default_support_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_rrf_k() -> f64 {
    60.0
}
fn default_meta_top_n() -> usize {
    100
}
fn default_final_top_k() -> usize {
    12
}
fn default_dense_limit() -> usize {
    300
}
fn default_sparse_limit() -> usize {
    20
}
fn default_diversify_cap() -> usize {
    1
}
fn default_session_ttl() -> u64 {
    24 * 3600
}
fn default_session_absolute_ttl() -> u64 {
    7 * 24 * 3600
}
fn default_ticket_ttl() -> u64 {
    15 * 60
}
fn default_ticket_absolute_ttl() -> u64 {
    3600
}
fn default_seen_ids_cap() -> usize {
    200
}

impl ReelixConfig {
    /// Load config from a TOML file with REELIX_* env var overrides.
    ///
    /// Checks, in order: explicit path argument, then `REELIX_CONFIG`, then
    /// `./reelix.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("REELIX_CONFIG").ok())
            .unwrap_or_else(|| "reelix.toml".to_string());

        let config: ReelixConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("REELIX_").split("__"))
            .extract()
            .map_err(|e| ReelixError::Config(e.to_string()))?;

        Ok(config)
    }
}
