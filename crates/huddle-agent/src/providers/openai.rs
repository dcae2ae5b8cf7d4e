// ABOUTME: OpenAI adapter implementing ModelClient over the Responses API.
// ABOUTME: Applies reasoning options and native file search, and streams output_text delta events.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};

use crate::model::{
    ChunkStream, Completion, CompletionRequest, ModelClient, ModelError, PromptMessage,
    StreamChunk, ToolCall, Usage, tool_content_string,
};
use crate::providers::{ModelNamespace, NamespaceOptions, check_status, http_error, json_error};
use crate::sse::{SseFrame, sse_frames};
use crate::tools::ToolSpec;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const KEY_VAR: &str = "OPENAI_API_KEY";

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// Create a new OpenAiClient reading configuration from environment variables.
    /// Required: `OPENAI_API_KEY`
    /// Optional: `OPENAI_BASE_URL` (defaults to https://api.openai.com)
    pub fn from_env() -> Result<Self, ModelError> {
        let api_key = std::env::var(KEY_VAR)
            .map_err(|_| ModelError::NotConfigured(format!("{} not set", KEY_VAR)))?;

        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(api_key, base_url))
    }

    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    /// Build the JSON request body for the Responses API.
    pub fn build_request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let input: Vec<Value> = request.messages.iter().flat_map(to_input_items).collect();

        let mut body = json!({
            "model": request.model,
            "instructions": request.system,
            "input": input,
            "max_output_tokens": request.max_tokens,
            "store": false,
        });

        let tools = build_openai_tools(&request.tools);
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        if let Some(NamespaceOptions::Reasoning {
            reasoning_effort,
            include,
        }) = request.provider_options.get(ModelNamespace::OpenAi)
        {
            body["reasoning"] = json!({ "effort": reasoning_effort.as_str() });
            body["include"] = json!(include);
        }

        if stream {
            body["stream"] = Value::Bool(true);
        }
        body
    }

    /// Parse a Responses API response into a Completion.
    pub fn parse_response(response_body: &Value) -> Result<Completion, ModelError> {
        let output = response_body
            .get("output")
            .and_then(|o| o.as_array())
            .ok_or_else(|| {
                ModelError::InvalidResponse("missing output array in response".to_string())
            })?;

        let mut completion = Completion::default();
        for item in output {
            match item.get("type").and_then(|t| t.as_str()) {
                Some("message") => {
                    let parts = item["content"].as_array().into_iter().flatten();
                    for part in parts {
                        if part["type"] == "output_text"
                            && let Some(text) = part["text"].as_str()
                        {
                            completion.text.push_str(text);
                        }
                    }
                }
                Some("function_call") => completion.tool_calls.push(parse_function_call(item)?),
                _ => {}
            }
        }

        completion.usage = parse_usage(&response_body["usage"]);
        Ok(completion)
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ModelError> {
        let body = self.build_request_body(request, stream);
        let url = format!("{}/v1/responses", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        check_status(response, KEY_VAR).await
    }
}

fn to_input_items(message: &PromptMessage) -> Vec<Value> {
    match message {
        PromptMessage::User { text } => vec![json!({ "role": "user", "content": text })],
        PromptMessage::Assistant { text, tool_calls } => {
            let mut items = Vec::new();
            if !text.is_empty() {
                items.push(json!({ "role": "assistant", "content": text }));
            }
            items.extend(tool_calls.iter().map(|call| {
                json!({
                    "type": "function_call",
                    "call_id": call.id,
                    "name": call.name,
                    "arguments": call.arguments.to_string(),
                })
            }));
            items
        }
        PromptMessage::ToolResult {
            call_id, content, ..
        } => vec![json!({
            "type": "function_call_output",
            "call_id": call_id,
            "output": tool_content_string(content),
        })],
    }
}

fn build_openai_tools(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .filter_map(|tool| match tool {
            ToolSpec::Function {
                name,
                description,
                parameters,
            } => Some(json!({
                "type": "function",
                "name": name,
                "description": description,
                "parameters": parameters,
            })),
            ToolSpec::Native {
                namespace: ModelNamespace::OpenAi,
                config,
                ..
            } => Some(config.clone()),
            ToolSpec::Native { .. } => None,
        })
        .collect()
}

fn parse_function_call(item: &Value) -> Result<ToolCall, ModelError> {
    let name = item["name"]
        .as_str()
        .ok_or_else(|| ModelError::InvalidResponse("function_call missing name".to_string()))?;
    let call_id = item["call_id"]
        .as_str()
        .ok_or_else(|| ModelError::InvalidResponse("function_call missing call_id".to_string()))?;

    // Arguments arrive as a JSON-encoded string.
    let arguments = match &item["arguments"] {
        Value::String(raw) => serde_json::from_str(raw).map_err(|e| {
            ModelError::InvalidResponse(format!("bad arguments for {}: {}", name, e))
        })?,
        Value::Null => json!({}),
        other => other.clone(),
    };

    Ok(ToolCall {
        id: call_id.to_string(),
        name: name.to_string(),
        arguments,
    })
}

fn parse_usage(usage: &Value) -> Usage {
    Usage {
        input_tokens: usage["input_tokens"].as_u64().unwrap_or(0),
        output_tokens: usage["output_tokens"].as_u64().unwrap_or(0),
    }
}

/// Translate one streaming event into a chunk.
pub fn parse_stream_event(frame: &SseFrame) -> Result<Option<StreamChunk>, ModelError> {
    if frame.data.is_empty() || frame.data == "[DONE]" {
        return Ok(None);
    }
    let event: Value = serde_json::from_str(&frame.data)
        .map_err(|e| ModelError::InvalidResponse(format!("bad stream event: {}", e)))?;

    match event.get("type").and_then(|t| t.as_str()) {
        Some("response.output_text.delta") => Ok(event["delta"]
            .as_str()
            .map(|delta| StreamChunk::TextDelta(delta.to_string()))),
        Some("response.completed") => Ok(Some(StreamChunk::Usage(parse_usage(
            &event["response"]["usage"],
        )))),
        Some("response.failed") => Err(ModelError::Provider(
            event["response"]["error"]["message"]
                .as_str()
                .unwrap_or("response failed")
                .to_string(),
        )),
        Some("error") => Err(ModelError::Provider(
            event["message"].as_str().unwrap_or("stream error").to_string(),
        )),
        _ => Ok(None),
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
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
        "openai"
    }
}
