// ABOUTME: Defines the ModelClient trait that every LLM provider adapter implements.
// ABOUTME: Also defines the provider-neutral request, message, completion, and error types.

use std::ops::AddAssign;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use huddle_core::{ChatMessage, Role};

use crate::providers::ProviderOptions;
use crate::tools::ToolSpec;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Errors that can occur while talking to a model provider.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("No client configured for model namespace: {0}")]
    NotConfigured(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry of the conversation sent to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptMessage {
    User {
        text: String,
    },
    Assistant {
        text: String,
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        call_id: String,
        name: String,
        content: Value,
        is_error: bool,
    },
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        PromptMessage::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        PromptMessage::Assistant {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Convert transcript messages into prompt messages. System messages are
    /// dropped; the system prompt is carried separately.
    pub fn from_history(history: &[ChatMessage]) -> Vec<PromptMessage> {
        history
            .iter()
            .filter_map(|msg| match msg.role {
                Role::User => Some(PromptMessage::user(msg.text())),
                Role::Assistant => Some(PromptMessage::assistant(msg.text())),
                Role::System => None,
            })
            .collect()
    }
}

/// Render a tool result payload as the plain string most APIs expect.
pub(crate) fn tool_content_string(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A provider-neutral completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<PromptMessage>,
    pub tools: Vec<ToolSpec>,
    pub provider_options: ProviderOptions,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            messages: Vec::new(),
            tools: Vec::new(),
            provider_options: ProviderOptions::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// The result of one non-streaming model call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    TextDelta(String),
    Usage(Usage),
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ModelError>> + Send>>;

/// Trait that all model provider adapters implement. Each adapter translates
/// a CompletionRequest into its API's wire format and back.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one completion and return the full result.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError>;

    /// Stream a completion token by token. Adapters without a streaming
    /// implementation deliver the completed text as a single delta.
    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ModelError> {
        let completion = self.complete(request).await?;
        let chunks = vec![
            Ok(StreamChunk::TextDelta(completion.text)),
            Ok(StreamChunk::Usage(completion.usage)),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    /// Provider name for logging (e.g. "anthropic", "openai").
    fn provider_name(&self) -> &str;
}
