use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::stream::StreamEvent;

/// Classification of a provider's authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    ApiKey,
    OAuth,
    Exchange,
    None,
}

/// Snapshot of a provider's current authentication state.
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub token_type: TokenType,
    pub expires_at: Option<i64>,
    pub refreshable: bool,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Tool definition sent to the LLM API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A tool call extracted from the LLM response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub stream: bool,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Tools to expose to the LLM. Empty when the call needs no tool.
    pub tools: Vec<ToolDefinition>,
    /// Raw JSON messages for the tool loop (overrides `messages` when set).
    /// Lets the tool loop build structured content blocks (tool_use,
    /// tool_result) that a plain string can't represent.
    pub raw_messages: Option<Vec<serde_json::Value>>,
}

impl ChatRequest {
    /// A plain single-turn request with no tools and no history.
    pub fn simple(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            messages: vec![Message {
                role: Role::User,
                content: user.into(),
            }],
            max_tokens: 1024,
            stream: false,
            temperature: None,
            top_p: None,
            tools: Vec::new(),
            raw_messages: None,
        }
    }
}

/// Response from an LLM provider (non-streaming).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
    /// Tool calls requested by the LLM. Empty when no tools are called.
    pub tool_calls: Vec<ToolCall>,
}

/// Common interface for all LLM providers (Anthropic, OpenAI-compatible, ...).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a non-streaming chat request, wait for the full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Stream response events through a channel.
    /// Default: falls back to non-streaming send, emits TextDelta + Done.
    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let resp = self.send(req).await?;
        let _ = tx.send(StreamEvent::TextDelta { text: resp.content }).await;
        let _ = tx
            .send(StreamEvent::Done {
                model: resp.model,
                tokens_in: resp.tokens_in,
                tokens_out: resp.tokens_out,
                stop_reason: resp.stop_reason,
            })
            .await;
        Ok(())
    }

    /// Return current authentication state. Providers without tokens return `None`.
    fn token_info(&self) -> Option<TokenInfo> {
        None
    }

    /// Attempt to refresh authentication credentials.
    /// Providers that don't support refresh return `Ok(())` (no-op).
    async fn refresh_auth(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}
