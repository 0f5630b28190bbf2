//! Orchestrator turn loop (§4.I): a tool-calling state machine bounded by
//! `MAX_ORCHESTRATOR_STEPS`, represented as a tagged `Decision` outcome per
//! the tool-call-vs-final-text distinction called for in the design notes (§9).

use std::sync::Arc;

use reelix_core::{
    Candidate, MediaType, MemoryDelta, RecQuerySpec, ScoreTrace, TurnKind, TurnMode,
    UserTasteContext, MAX_ORCHESTRATOR_STEPS,
};
use reelix_curator::evaluator::{CuratorError, CuratorEvaluator};
use reelix_curator::tiers::CuratorStats;
use reelix_llm::provider::{ChatRequest, LlmProvider, Message, ProviderError, Role};
use reelix_runner::runner::{CtxLog, RecommendationRunner, RunnerError};
use serde::Deserialize;

use crate::prompts::{session_memory_message, system_prompt, tool_definition, user_message, TOOL_NAME};
use crate::state::AgentState;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("orchestrator llm call failed: {0}")]
    Llm(#[from] ProviderError),

    #[error("tool arguments were not valid: {0}")]
    InvalidToolArgs(String),

    #[error("orchestrator reached max_steps without a terminal decision")]
    StepsExhausted,
}

/// Tagged outcome of a turn's tool-calling loop (§9: `{ToolCall | FinalText}`).
pub enum Decision {
    Chat {
        message: String,
    },
    Recs {
        spec: RecQuerySpec,
        memory_delta: MemoryDelta,
        opening_summary: String,
    },
}

#[derive(Debug, Deserialize)]
struct ToolArgs {
    rec_query_spec: RecQuerySpec,
    memory_delta: MemoryDelta,
    opening_summary: String,
}

pub struct OrchestratorAgent {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl OrchestratorAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Runs the tool-calling loop for one turn (§4.I steps 1-5) and records
    /// `turn_mode`/`step_count` onto `state` as it goes.
    pub async fn decide(
        &self,
        state: &mut AgentState,
        query_text: &str,
        media_type: MediaType,
        current_year: i32,
    ) -> Result<Decision, OrchestratorError> {
        let mut messages = Vec::new();
        if let Some(session) = &state.session_memory {
            messages.push(Message {
                role: Role::System,
                content: session_memory_message(session),
            });
        }
        messages.push(Message {
            role: Role::User,
            content: user_message(query_text, media_type),
        });
        state.messages = messages;

        let tool = tool_definition();
        let system = system_prompt(current_year);

        loop {
            state.step_count += 1;
            if state.step_count > MAX_ORCHESTRATOR_STEPS {
                return Err(OrchestratorError::StepsExhausted);
            }

            let req = ChatRequest {
                model: self.model.clone(),
                system: system.clone(),
                messages: state.messages.clone(),
                max_tokens: 1024,
                stream: false,
                temperature: None,
                top_p: None,
                tools: vec![tool.clone()],
                raw_messages: None,
            };

            let resp = self.provider.send(&req).await?;

            if resp.tool_calls.is_empty() {
                state.turn_mode = TurnMode::Chat;
                state.turn_kind = TurnKind::Chat;
                state.turn_memory = MemoryDelta {
                    turn_kind: Some(TurnKind::Chat),
                    last_user_message: Some(query_text.to_string()),
                    ..Default::default()
                };
                return Ok(Decision::Chat { message: resp.content });
            }

            let call = &resp.tool_calls[0];
            if call.name == TOOL_NAME {
                let args: ToolArgs = serde_json::from_value(call.input.clone())
                    .map_err(|e| OrchestratorError::InvalidToolArgs(e.to_string()))?;

                state.turn_mode = TurnMode::Recs;
                state.turn_kind = args.memory_delta.turn_kind.unwrap_or(TurnKind::New);
                state.turn_memory = args.memory_delta.clone();

                return Ok(Decision::Recs {
                    spec: args.rec_query_spec,
                    memory_delta: args.memory_delta,
                    opening_summary: truncate_opening_summary(&args.opening_summary),
                });
            }

            // Unknown tool name: not terminal (§4.I point 5) — record an
            // error and loop again.
            state.messages.push(Message {
                role: Role::Assistant,
                content: format!("(called unknown tool `{}`)", call.name),
            });
            state.messages.push(Message {
                role: Role::User,
                content: format!(
                    "Error: unknown tool `{}`. The only tool available is `{TOOL_NAME}`.",
                    call.name
                ),
            });
        }
    }
}

/// Defensive clamp — the model is instructed to keep this ≤ ~220 chars but
/// nothing stops it from ignoring the instruction.
fn truncate_opening_summary(summary: &str) -> String {
    if summary.chars().count() <= 220 {
        summary.to_string()
    } else {
        summary.chars().take(220).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunRecsError {
    #[error("runner failed: {0}")]
    Runner(#[from] RunnerError),

    #[error("curator failed: {0}")]
    Curator(#[from] CuratorError),
}

pub struct RecsOutcome {
    pub candidates: Vec<Candidate>,
    pub final_recs: Vec<Candidate>,
    pub traces: Vec<ScoreTrace>,
    pub ctx_log: CtxLog,
    pub tier_stats: CuratorStats,
}

/// Invokes F (runner) then E (curator) to produce a final slate — §4.I step 4
/// and, equally, the direct-invocation path `/explore/rerun` uses to bypass
/// the orchestrator LLM entirely (grounded in `run_rec_engine_direct`).
pub async fn run_recs(
    runner: &RecommendationRunner,
    curator: &CuratorEvaluator,
    taste: &UserTasteContext,
    spec: &RecQuerySpec,
    seen_media_ids: &[i64],
    turn_kind: TurnKind,
    current_year: i32,
) -> Result<RecsOutcome, RunRecsError> {
    let runner_output = runner
        .run(taste, spec, seen_media_ids, turn_kind, current_year, None)
        .await?;

    let (final_recs, evaluations, tier_stats) =
        curator.evaluate(spec, runner_output.candidates.clone()).await?;

    let mut traces = runner_output.traces;
    for trace in traces.iter_mut() {
        if let Some(eval) = evaluations.get(&trace.media_id) {
            trace.curator_evaluation = Some(*eval);
        }
    }

    Ok(RecsOutcome {
        candidates: runner_output.candidates,
        final_recs,
        traces,
        ctx_log: runner_output.ctx_log,
        tier_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelix_core::{QueryId, SessionId, UserId};
    use reelix_llm::provider::{ChatResponse, ToolCall};

    struct FakeProvider {
        responses: std::sync::Mutex<Vec<ChatResponse>>,
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(self.responses.lock().unwrap().remove(0))
        }
    }

    fn base_state() -> AgentState {
        AgentState::new(
            UserId::from("u1"),
            SessionId::from("s1".to_string()),
            QueryId::new(),
            None,
        )
    }

    #[tokio::test]
    async fn chat_response_with_no_tool_call_terminates_as_chat() {
        let provider = Arc::new(FakeProvider {
            responses: std::sync::Mutex::new(vec![ChatResponse {
                content: "It works like this...".to_string(),
                model: "test-model".to_string(),
                tokens_in: 10,
                tokens_out: 10,
                stop_reason: "end_turn".to_string(),
                tool_calls: Vec::new(),
            }]),
        });

        let agent = OrchestratorAgent::new(provider, "test-model");
        let mut state = base_state();
        let decision = agent
            .decide(&mut state, "how does this work?", MediaType::Movie, 2026)
            .await
            .unwrap();

        match decision {
            Decision::Chat { message } => assert_eq!(message, "It works like this..."),
            Decision::Recs { .. } => panic!("expected chat decision"),
        }
        assert_eq!(state.turn_mode, TurnMode::Chat);
    }

    #[tokio::test]
    async fn unknown_tool_loops_then_terminal_tool_call_resolves_to_recs() {
        let unknown_call = ChatResponse {
            content: String::new(),
            model: "test-model".to_string(),
            tokens_in: 5,
            tokens_out: 5,
            stop_reason: "tool_use".to_string(),
            tool_calls: vec![ToolCall {
                id: "1".to_string(),
                name: "not_a_real_tool".to_string(),
                input: serde_json::json!({}),
            }],
        };
        let real_call = ChatResponse {
            content: String::new(),
            model: "test-model".to_string(),
            tokens_in: 5,
            tokens_out: 5,
            stop_reason: "tool_use".to_string(),
            tool_calls: vec![ToolCall {
                id: "2".to_string(),
                name: TOOL_NAME.to_string(),
                input: serde_json::json!({
                    "rec_query_spec": {"query_text": "sci-fi", "media_type": "movie"},
                    "memory_delta": {"turn_kind": "new"},
                    "opening_summary": "Here are some picks. Enjoy exploring them."
                }),
            }],
        };

        let provider = Arc::new(FakeProvider {
            responses: std::sync::Mutex::new(vec![unknown_call, real_call]),
        });

        let agent = OrchestratorAgent::new(provider, "test-model");
        let mut state = base_state();
        let decision = agent
            .decide(&mut state, "sci-fi please", MediaType::Movie, 2026)
            .await
            .unwrap();

        match decision {
            Decision::Recs { spec, .. } => assert_eq!(spec.query_text, "sci-fi"),
            Decision::Chat { .. } => panic!("expected recs decision"),
        }
        assert_eq!(state.step_count, 2);
    }
}
