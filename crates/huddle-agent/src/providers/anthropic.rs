// ABOUTME: Anthropic Claude adapter implementing ModelClient over the Messages API.
// ABOUTME: Maps tool calls to tool_use/tool_result blocks and streams text via content_block_delta events.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};

use crate::model::{
    ChunkStream, Completion, CompletionRequest, ModelClient, ModelError, PromptMessage,
    StreamChunk, ToolCall, Usage, tool_content_string,
};
use crate::providers::{ModelNamespace, check_status, coalesce_by_role, http_error, json_error};
use crate::sse::{SseFrame, sse_frames};
use crate::tools::ToolSpec;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Anthropic Claude client. The model name comes from each request.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    /// Create a new AnthropicClient reading configuration from environment variables.
    /// Required: `ANTHROPIC_API_KEY`
    /// Optional: `ANTHROPIC_BASE_URL` (defaults to https://api.anthropic.com)
    pub fn from_env() -> Result<Self, ModelError> {
        let api_key = std::env::var(KEY_VAR)
            .map_err(|_| ModelError::NotConfigured(format!("{} not set", KEY_VAR)))?;

        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(api_key, base_url))
    }

    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    /// Build the JSON request body for the Anthropic Messages API.
    pub fn build_request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(to_anthropic_message).collect();
        let messages = coalesce_by_role(messages, "content");

        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": messages,
        });

        let tools = build_anthropic_tools(&request.tools);
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        if stream {
            body["stream"] = Value::Bool(true);
        }
        body
    }

    /// Parse a Messages API response into a Completion.
    pub fn parse_response(response_body: &Value) -> Result<Completion, ModelError> {
        let content = response_body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                ModelError::InvalidResponse("missing content array in response".to_string())
            })?;

        let mut completion = Completion::default();
        for block in content {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        completion.text.push_str(text);
                    }
                }
                Some("tool_use") => completion.tool_calls.push(parse_tool_use(block)?),
                _ => {}
            }
        }

        if let Some(usage) = response_body.get("usage") {
            completion.usage = Usage {
                input_tokens: usage["input_tokens"].as_u64().unwrap_or(0),
                output_tokens: usage["output_tokens"].as_u64().unwrap_or(0),
            };
        }

        Ok(completion)
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ModelError> {
        let body = self.build_request_body(request, stream);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        check_status(response, KEY_VAR).await
    }
}

fn to_anthropic_message(message: &PromptMessage) -> Value {
    match message {
        PromptMessage::User { text } => json!({
            "role": "user",
            "content": text_blocks(text),
        }),
        PromptMessage::Assistant { text, tool_calls } => {
            let mut content = text_blocks(text);
            content.extend(tool_calls.iter().map(|call| {
                json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": call.arguments,
                })
            }));
            json!({ "role": "assistant", "content": content })
        }
        PromptMessage::ToolResult {
            call_id,
            content,
            is_error,
            ..
        } => json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": call_id,
                "content": tool_content_string(content),
                "is_error": is_error,
            }],
        }),
    }
}

/// The API rejects empty text blocks.
fn text_blocks(text: &str) -> Vec<Value> {
    if text.trim().is_empty() {
        Vec::new()
    } else {
        vec![json!({ "type": "text", "text": text })]
    }
}

fn build_anthropic_tools(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .filter_map(|tool| match tool {
            ToolSpec::Function {
                name,
                description,
                parameters,
            } => Some(json!({
                "name": name,
                "description": description,
                "input_schema": parameters,
            })),
            ToolSpec::Native {
                namespace: ModelNamespace::Anthropic,
                config,
                ..
            } => Some(config.clone()),
            ToolSpec::Native { .. } => None,
        })
        .collect()
}

fn parse_tool_use(block: &Value) -> Result<ToolCall, ModelError> {
    let name = block
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| ModelError::InvalidResponse("tool_use block missing name".to_string()))?;
    let id = block
        .get("id")
        .and_then(|i| i.as_str())
        .ok_or_else(|| ModelError::InvalidResponse("tool_use block missing id".to_string()))?;

    Ok(ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: block.get("input").cloned().unwrap_or(json!({})),
    })
}

/// Translate one streaming event into a chunk. Events that carry neither
/// text nor usage yield `None`.
pub fn parse_stream_event(frame: &SseFrame) -> Result<Option<StreamChunk>, ModelError> {
    if frame.data.is_empty() {
        return Ok(None);
    }
    let event: Value = serde_json::from_str(&frame.data)
        .map_err(|e| ModelError::InvalidResponse(format!("bad stream event: {}", e)))?;

    match event.get("type").and_then(|t| t.as_str()) {
        Some("content_block_delta") => {
            let delta = &event["delta"];
            if delta["type"] == "text_delta"
                && let Some(text) = delta["text"].as_str()
            {
                return Ok(Some(StreamChunk::TextDelta(text.to_string())));
            }
            Ok(None)
        }
        Some("message_start") => {
            let usage = &event["message"]["usage"];
            Ok(Some(StreamChunk::Usage(Usage {
                input_tokens: usage["input_tokens"].as_u64().unwrap_or(0),
                output_tokens: usage["output_tokens"].as_u64().unwrap_or(0),
            })))
        }
        Some("message_delta") => {
            let output_tokens = event["usage"]["output_tokens"].as_u64().unwrap_or(0);
            Ok(Some(StreamChunk::Usage(Usage {
                input_tokens: 0,
                output_tokens,
            })))
        }
        Some("error") => Err(ModelError::Provider(
            event["error"]["message"]
                .as_str()
                .unwrap_or("stream error")
                .to_string(),
        )),
        _ => Ok(None),
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError> {
        let response = self.send(request, false).await?;
        let response_body: Value = response.json().await.map_err(json_error)?;
        Self::parse_response(&response_body)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ModelError> {
        let response = self.send(request, true).await?;
        let chunks = sse_frames(response).filter_map(|frame| async move {
            match frame {
                Ok(frame) => parse_stream_event(&frame).transpose(),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::pin(chunks))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnthropicClient {
        AnthropicClient::new(
            "test-key".to_string(),
            "https://api.anthropic.com".to_string(),
        )
    }

    fn frame(data: Value) -> SseFrame {
        SseFrame {
            event: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn anthropic_builds_request_body() {
        let mut request = CompletionRequest::new("claude-sonnet-4-5-20250929", "Be helpful.");
        request.messages = vec![
            PromptMessage::user("What's on my calendar?"),
            PromptMessage::Assistant {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: "toolu_1".to_string(),
                    name: "list_calendar_events".to_string(),
                    arguments: json!({"day": "today"}),
                }],
            },
            PromptMessage::ToolResult {
                call_id: "toolu_1".to_string(),
                name: "list_calendar_events".to_string(),
                content: json!({"events": []}),
                is_error: false,
            },
        ];
        request.tools = vec![ToolSpec::Function {
            name: "list_calendar_events".to_string(),
            description: "List events".to_string(),
            parameters: json!({"type": "object"}),
        }];

        let body = client().build_request_body(&request, false);

        assert_eq!(body["model"], "claude-sonnet-4-5-20250929");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["system"], "Be helpful.");
        assert!(body.get("stream").is_none());

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        // Empty assistant text produces no text block, only the tool_use.
        assert_eq!(messages[1]["content"].as_array().unwrap().len(), 1);
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(messages[2]["content"][0]["content"], "{\"events\":[]}");

        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert!(tools[0].get("input_schema").is_some());
    }

    #[test]
    fn foreign_native_tools_are_skipped() {
        let mut request = CompletionRequest::new("claude-haiku", "sys");
        request.messages = vec![PromptMessage::user("hi")];
        request.tools = vec![ToolSpec::Native {
            namespace: ModelNamespace::OpenAi,
            name: "knowledge_base_search".to_string(),
            config: json!({"type": "file_search"}),
        }];

        let body = client().build_request_body(&request, true);
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn anthropic_parses_text_and_tool_use() {
        let response = json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_9", "name": "search_web", "input": {"query": "rust"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 7}
        });

        let completion = AnthropicClient::parse_response(&response).unwrap();
        assert_eq!(completion.text, "Let me check.");
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "toolu_9");
        assert_eq!(completion.tool_calls[0].arguments["query"], "rust");
        assert_eq!(completion.usage.input_tokens, 12);
        assert_eq!(completion.usage.output_tokens, 7);
    }

    #[test]
    fn anthropic_rejects_missing_content() {
        let err = AnthropicClient::parse_response(&json!({"id": "msg"})).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn stream_events_map_to_chunks() {
        let delta = frame(json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": "Hel"}
        }));
        assert_eq!(
            parse_stream_event(&delta).unwrap(),
            Some(StreamChunk::TextDelta("Hel".to_string()))
        );

        let start = frame(json!({
            "type": "message_start",
            "message": {"usage": {"input_tokens": 25, "output_tokens": 1}}
        }));
        assert!(matches!(
            parse_stream_event(&start).unwrap(),
            Some(StreamChunk::Usage(Usage { input_tokens: 25, .. }))
        ));

        let ping = frame(json!({"type": "ping"}));
        assert_eq!(parse_stream_event(&ping).unwrap(), None);

        let error = frame(json!({"type": "error", "error": {"message": "overloaded"}}));
        assert!(matches!(
            parse_stream_event(&error),
            Err(ModelError::Provider(ref m)) if m == "overloaded"
        ));
    }

    #[tokio::test]
    #[cfg(feature = "live-test")]
    async fn anthropic_adapter_basic() {
        let client = AnthropicClient::from_env().expect("ANTHROPIC_API_KEY must be set");
        let mut request = CompletionRequest::new("claude-sonnet-4-5-20250929", "Answer briefly.");
        request.messages = vec![PromptMessage::user("Say hello.")];

        let result = client.complete(&request).await;
        assert!(result.is_ok(), "live test failed: {:?}", result.err());
    }
}
