use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Resolved caller identity. Authentication itself happens upstream (§6); by
/// the time a request reaches this core the `user_id` is already trusted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Caller-supplied session identifier — scopes one conversational thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Redis key this session's state lives under — `reelix:agent:session:{id}`.
    pub fn store_key(&self) -> String {
        format!("reelix:agent:session:{}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Per-query identifier minted by the caller (or generated by the layer)
/// that ties a `/explore` turn to its WHY ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub String);

impl QueryId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Redis key this query's ticket lives under — `reelix:ticket:{id}`.
    pub fn ticket_key(&self) -> String {
        format!("reelix:ticket:{}", self.0)
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for QueryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Media type — the system covers exactly these two (§1 Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// Canonical genre enumeration (§6) — closed set, used for both filter
/// construction and `RecQuerySpec.core_genres`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Action,
    Comedy,
    Drama,
    Romance,
    #[serde(rename = "Science Fiction")]
    ScienceFiction,
    Thriller,
    Adventure,
    Animation,
    Crime,
    Documentary,
    Family,
    Fantasy,
    History,
    Horror,
    Music,
    Mystery,
    War,
    Western,
}

impl Genre {
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Comedy => "Comedy",
            Genre::Drama => "Drama",
            Genre::Romance => "Romance",
            Genre::ScienceFiction => "Science Fiction",
            Genre::Thriller => "Thriller",
            Genre::Adventure => "Adventure",
            Genre::Animation => "Animation",
            Genre::Crime => "Crime",
            Genre::Documentary => "Documentary",
            Genre::Family => "Family",
            Genre::Fantasy => "Fantasy",
            Genre::History => "History",
            Genre::Horror => "Horror",
            Genre::Music => "Music",
            Genre::Mystery => "Mystery",
            Genre::War => "War",
            Genre::Western => "Western",
        }
    }

    pub const ALL: [Genre; 18] = [
        Genre::Action,
        Genre::Comedy,
        Genre::Drama,
        Genre::Romance,
        Genre::ScienceFiction,
        Genre::Thriller,
        Genre::Adventure,
        Genre::Animation,
        Genre::Crime,
        Genre::Documentary,
        Genre::Family,
        Genre::Fantasy,
        Genre::History,
        Genre::Horror,
        Genre::Music,
        Genre::Mystery,
        Genre::War,
        Genre::Western,
    ];
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Genre {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genre::ALL
            .iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown genre: {s}"))
    }
}

// ---------------------------------------------------------------------
// Candidate / ScoreTrace — component C/D output
// ---------------------------------------------------------------------

/// A retrieved item, owned by the pipeline for the duration of one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub media_id: i64,
    pub media_type: MediaType,
    /// title, release_year, genres, overview, providers, ratings,
    /// embedding_text, collection, and any other payload fields the vector
    /// store returns. Kept as an open map so the reranker and curator tiers
    /// can stamp extra fields onto it without a schema change.
    pub payload: HashMap<String, Value>,
    pub dense_score: Option<f64>,
    pub sparse_score: Option<f64>,
}

impl Candidate {
    pub fn title(&self) -> String {
        self.payload
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string()
    }

    pub fn collection(&self) -> Option<String> {
        self.payload
            .get("collection")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    pub fn embedding_text(&self) -> String {
        self.payload
            .get("embedding_text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    pub fn genres(&self) -> Vec<String> {
        self.payload
            .get("genres")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|g| g.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A single normalized feature's contribution to the metadata score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

impl FeatureContribution {
    pub fn new(value: f64, weight: f64) -> Self {
        Self {
            value,
            weight,
            contribution: value * weight,
        }
    }
}

/// All per-feature contributions that sum to a candidate's metadata score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub features: HashMap<String, FeatureContribution>,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.features.values().map(|f| f.contribution).sum()
    }
}

/// Curator evaluation recorded onto a candidate's trace once component E runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CuratorEvaluation {
    pub genre_fit: u8,
    pub tone_fit: u8,
    pub structure_fit: u8,
    pub theme_fit: u8,
}

impl CuratorEvaluation {
    pub fn total_fit(&self) -> u8 {
        self.genre_fit + self.tone_fit + self.structure_fit + self.theme_fit
    }
}

/// Per-candidate audit record produced by the pipeline (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreTrace {
    pub media_id: i64,
    pub title: String,
    pub dense_rank: Option<usize>,
    pub sparse_rank: Option<usize>,
    pub dense_score: Option<f64>,
    pub sparse_score: Option<f64>,
    pub meta_score: f64,
    pub meta_breakdown: Option<ScoreBreakdown>,
    pub curator_evaluation: Option<CuratorEvaluation>,
    pub final_score: f64,
    pub weights_used: RerankWeightsSnapshot,
}

/// Frozen copy of the weights a trace was produced under — traces must
/// remain interpretable even if `RankingConfig` changes between requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RerankWeightsSnapshot {
    pub dense: f64,
    pub sparse: f64,
    pub rating: f64,
    pub popularity: f64,
    pub genre: f64,
    pub recency: f64,
}

// ---------------------------------------------------------------------
// RecQuerySpec — component I output, component F input
// ---------------------------------------------------------------------

/// Structured representation of the current user intent (§3). Built once per
/// turn by the orchestrator; immutable once passed to the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecQuerySpec {
    pub query_text: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub core_genres: Vec<Genre>,
    #[serde(default)]
    pub sub_genres: Vec<String>,
    #[serde(default)]
    pub core_tone: Vec<String>,
    #[serde(default)]
    pub narrative_shape: Vec<String>,
    #[serde(default)]
    pub key_themes: Vec<String>,
    #[serde(default)]
    pub exclude_genres: Vec<Genre>,
    #[serde(default)]
    pub providers: Vec<String>,
    /// Inclusive `[start, end]`, or `None` meaning the default `[1970, current_year]`.
    #[serde(default)]
    pub year_range: Option<(i32, i32)>,
    #[serde(default)]
    pub seed_titles: Vec<String>,
    #[serde(default = "default_num_recs")]
    pub num_recs: usize,
}

fn default_num_recs() -> usize {
    8
}

impl RecQuerySpec {
    /// Apply a `/explore/rerun` chip patch (§6): `providers: null` clears,
    /// a list replaces; `year_range: null` clears, a 2-tuple replaces.
    /// Only fields explicitly present in `patch` are touched.
    pub fn apply_patch(&mut self, patch: &RerunPatch) {
        if let Some(providers) = &patch.providers {
            self.providers = providers.clone().unwrap_or_default();
        }
        if let Some(year_range) = &patch.year_range {
            self.year_range = *year_range;
        }
    }
}

/// `/explore/rerun` patch body. Each field is `Option<Option<T>>` so that
/// "field absent" (leave untouched), "field explicitly null" (clear), and
/// "field present" (replace) are all distinguishable, mirroring the
/// explicit-field-set tracking the original implementation does with
/// pydantic's `model_fields_set`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RerunPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Option<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_range: Option<Option<(i32, i32)>>,
}

// ---------------------------------------------------------------------
// UserTasteContext — external collaborator output, read-only to F
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionSignal {
    pub kind: String,
    pub value: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFilterMode {
    /// Only titles on the user's active subscriptions are eligible.
    Strict,
    /// Active subscriptions are a soft preference signal, not a hard filter.
    Soft,
    /// No provider filtering from taste context (spec-level providers still apply).
    Off,
}

/// Read-only snapshot of a user's long-term preferences (§3). Produced by an
/// external taste-profile service; consumed, never mutated, by F.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTasteContext {
    pub user_id: UserId,
    pub taste_vector: Option<Vec<f32>>,
    pub positive_count: u32,
    pub negative_count: u32,
    pub liked_genres: Vec<String>,
    pub liked_keywords: Vec<String>,
    pub recent_interactions: Vec<InteractionSignal>,
    pub active_provider_ids: Vec<u32>,
    pub provider_filter_mode: ProviderFilterMode,
}

// ---------------------------------------------------------------------
// SessionState — component G
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    New,
    Refine,
    Chat,
}

/// Rolling, intentionally-small per-session summary (§3/§4.G).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub turn_kind: Option<TurnKind>,
    pub recent_feedback: Option<String>,
    pub last_user_message: Option<String>,
    pub last_admin_message: Option<String>,
    pub last_reflection_strategy: Option<String>,
    /// Free-form stable constraints (e.g. `year_range`) — merged recursively
    /// except `year_range`, which is always replaced as a unit (§4.G).
    #[serde(default)]
    pub constraints: serde_json::Map<String, Value>,
    /// Free-form stable prefs — merged recursively like `constraints`.
    #[serde(default)]
    pub prefs: serde_json::Map<String, Value>,
}

/// A resolved slate entry, addressable by its 1-based position for
/// follow-ups like "more like #3".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotEntry {
    pub media_id: i64,
    pub title: String,
    pub release_year: Option<i32>,
}

/// Per-session durable memory (§3). Ownership, intent-scoping, and TTL
/// invariants live on the store (component G), not on this value type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub user_id: UserId,
    #[serde(default)]
    pub summary: SessionSummary,
    pub last_spec: Option<RecQuerySpec>,
    #[serde(default)]
    pub slot_map: HashMap<String, SlotEntry>,
    #[serde(default)]
    pub seen_media_ids: Vec<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl SessionState {
    pub fn empty(user_id: UserId, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            user_id,
            summary: SessionSummary::default(),
            last_spec: None,
            slot_map: HashMap::new(),
            seen_media_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Delta the orchestrator (or `/explore/rerun`) wants merged into session
/// state for the current turn — component G's `apply_delta_to_payload` input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryDelta {
    pub turn_kind: Option<TurnKind>,
    pub recent_feedback: Option<String>,
    pub last_user_message: Option<String>,
    pub last_admin_message: Option<String>,
    pub last_reflection_strategy: Option<String>,
    #[serde(default)]
    pub constraints: serde_json::Map<String, Value>,
    #[serde(default)]
    pub prefs: serde_json::Map<String, Value>,
    pub last_spec: Option<RecQuerySpec>,
    pub slot_map: Option<HashMap<String, SlotEntry>>,
    #[serde(default)]
    pub seen_media_ids: Vec<i64>,
}

// ---------------------------------------------------------------------
// Ticket / PromptsEnvelope — components H/J
// ---------------------------------------------------------------------

/// One LLM call inside a prompt envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCall {
    pub call_id: u32,
    pub messages: Vec<serde_json::Value>,
    /// Lightweight per-item index so `/explore/why` can label items without
    /// re-deriving them from the full candidate payloads.
    pub items_brief: Vec<ItemBrief>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemBrief {
    pub media_id: i64,
    pub title: String,
}

/// A single-source-of-truth representation of one or more LLM calls (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsEnvelope {
    pub model: String,
    pub params: serde_json::Map<String, Value>,
    pub output: EnvelopeOutput,
    pub calls: Vec<LlmCall>,
    pub prompt_hash: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeOutput {
    pub format: String,
    pub schema_version: String,
}

/// Per-query prompt envelope, keyed by `query_id` (§3/§4.H).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub user_id: UserId,
    pub prompts: PromptsEnvelope,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub meta: Option<serde_json::Map<String, Value>>,
}

// ---------------------------------------------------------------------
// AgentState — component I's per-turn working memory
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnMode {
    Recs,
    Chat,
}

/// Maximum orchestrator loop iterations per turn (§4.I, §5).
pub const MAX_ORCHESTRATOR_STEPS: u32 = 3;
