//! Reflection agent (component K): one best-effort LLM call proposing a next
//! step after a slate is served. Any failure — timeout, provider error, or a
//! malformed response — degrades to `None`; reflection is never allowed to
//! fail the turn it rides along with.

use std::sync::Arc;
use std::time::Duration;

use reelix_core::{Candidate, RecQuerySpec};
use reelix_curator::tiers::CuratorStats;
use reelix_llm::provider::{ChatRequest, LlmProvider, Message, Role};
use serde::{Deserialize, Serialize};

use crate::prompts::{build_reflection_user_prompt, REFLECTION_SYSTEM_PROMPT};

const REFLECTION_TIMEOUT: Duration = Duration::from_secs(10);
const REFLECTION_MAX_TOKENS: u32 = 200;
const REFLECTION_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionStrategy {
    MoreLikeTitle,
    ExploreAdjacent,
    ShiftEra,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReflectionSuggestion {
    pub strategy: ReflectionStrategy,
    pub suggestion: String,
}

pub struct ReflectionAgent {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl ReflectionAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Attempts one reflection call, bounded by a hard 10s timeout. Never
    /// returns an `Err`: every failure mode collapses to `None` and is
    /// logged at `warn` by the caller if it cares to.
    pub async fn reflect(
        &self,
        spec: &RecQuerySpec,
        final_recs: &[Candidate],
        tier_stats: Option<&CuratorStats>,
        previous_strategy: Option<&str>,
    ) -> Option<ReflectionSuggestion> {
        let user_prompt = build_reflection_user_prompt(spec, final_recs, tier_stats, previous_strategy);
        let req = ChatRequest {
            model: self.model.clone(),
            system: REFLECTION_SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: Role::User,
                content: user_prompt,
            }],
            max_tokens: REFLECTION_MAX_TOKENS,
            stream: false,
            temperature: Some(REFLECTION_TEMPERATURE),
            top_p: None,
            tools: Vec::new(),
            raw_messages: None,
        };

        let outcome = tokio::time::timeout(REFLECTION_TIMEOUT, self.provider.send(&req)).await;

        match outcome {
            Err(_elapsed) => {
                tracing::warn!("reflection call timed out after {REFLECTION_TIMEOUT:?}");
                None
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "reflection call failed");
                None
            }
            Ok(Ok(resp)) => match parse_suggestion(&resp.content) {
                Some(suggestion) => Some(suggestion),
                None => {
                    tracing::warn!("reflection response did not parse as a suggestion");
                    None
                }
            },
        }
    }
}

fn parse_suggestion(content: &str) -> Option<ReflectionSuggestion> {
    let trimmed = strip_markdown_fence(content);
    serde_json::from_str(trimmed).ok()
}

fn strip_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .unwrap_or(trimmed)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelix_core::MediaType;
    use reelix_llm::provider::{ChatResponse, ProviderError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn spec() -> RecQuerySpec {
        RecQuerySpec {
            query_text: "moody sci-fi".to_string(),
            media_type: MediaType::Movie,
            core_genres: Vec::new(),
            sub_genres: Vec::new(),
            core_tone: Vec::new(),
            narrative_shape: Vec::new(),
            key_themes: Vec::new(),
            exclude_genres: Vec::new(),
            providers: Vec::new(),
            year_range: None,
            seed_titles: Vec::new(),
            num_recs: 8,
        }
    }

    fn candidate(id: i64, title: &str) -> Candidate {
        let mut payload = HashMap::new();
        payload.insert("title".to_string(), serde_json::json!(title));
        Candidate {
            media_id: id,
            media_type: MediaType::Movie,
            payload,
            dense_score: None,
            sparse_score: None,
        }
    }

    struct FixedProvider {
        content: String,
    }

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: self.content.clone(),
                model: "test-model".to_string(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "end_turn".to_string(),
                tool_calls: Vec::new(),
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Unavailable("down".to_string()))
        }
    }

    struct HangingProvider {
        called: AtomicBool,
    }

    #[async_trait]
    impl LlmProvider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.called.store(true, Ordering::SeqCst);
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn parses_well_formed_json_response() {
        let provider = Arc::new(FixedProvider {
            content: r#"{"strategy":"more_like_title","suggestion":"More like Arrival?"}"#.to_string(),
        });
        let agent = ReflectionAgent::new(provider, "test-model");
        let result = agent
            .reflect(&spec(), &[candidate(1, "Arrival")], None, None)
            .await
            .unwrap();

        assert_eq!(result.strategy, ReflectionStrategy::MoreLikeTitle);
        assert_eq!(result.suggestion, "More like Arrival?");
    }

    #[tokio::test]
    async fn strips_markdown_fence_before_parsing() {
        let provider = Arc::new(FixedProvider {
            content: "```json\n{\"strategy\":\"shift_era\",\"suggestion\":\"Try the 90s?\"}\n```".to_string(),
        });
        let agent = ReflectionAgent::new(provider, "test-model");
        let result = agent.reflect(&spec(), &[], None, None).await.unwrap();
        assert_eq!(result.strategy, ReflectionStrategy::ShiftEra);
    }

    #[tokio::test]
    async fn malformed_json_degrades_to_none() {
        let provider = Arc::new(FixedProvider {
            content: "not json at all".to_string(),
        });
        let agent = ReflectionAgent::new(provider, "test-model");
        assert!(agent.reflect(&spec(), &[], None, None).await.is_none());
    }

    #[tokio::test]
    async fn provider_error_degrades_to_none() {
        let agent = ReflectionAgent::new(Arc::new(FailingProvider), "test-model");
        assert!(agent.reflect(&spec(), &[], None, None).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_degrades_to_none() {
        let provider = Arc::new(HangingProvider {
            called: AtomicBool::new(false),
        });
        let agent = ReflectionAgent::new(provider, "test-model");
        assert!(agent.reflect(&spec(), &[], None, None).await.is_none());
    }
}
