// ABOUTME: xAI Grok adapter implementing ModelClient over the OpenAI-compatible chat completions API.
// ABOUTME: Translates search provider options into live-search parameters.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::model::{
    Completion, CompletionRequest, ModelClient, ModelError, PromptMessage, ToolCall, Usage,
    tool_content_string,
};
use crate::providers::{ModelNamespace, NamespaceOptions, check_status, http_error, json_error};
use crate::tools::ToolSpec;

const DEFAULT_BASE_URL: &str = "https://api.x.ai";
const KEY_VAR: &str = "XAI_API_KEY";

pub struct XaiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl XaiClient {
    /// Create a new XaiClient reading configuration from environment variables.
    /// Required: `XAI_API_KEY`
    /// Optional: `XAI_BASE_URL` (defaults to https://api.x.ai)
    pub fn from_env() -> Result<Self, ModelError> {
        let api_key = std::env::var(KEY_VAR)
            .map_err(|_| ModelError::NotConfigured(format!("{} not set", KEY_VAR)))?;

        let base_url =
            std::env::var("XAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(api_key, base_url))
    }

    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    pub fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": request.system })];
        messages.extend(request.messages.iter().map(to_chat_message));

        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": messages,
        });

        let tools: Vec<Value> = request
            .tools
            .iter()
            .filter_map(|tool| match tool {
                ToolSpec::Function {
                    name,
                    description,
                    parameters,
                } => Some(json!({
                    "type": "function",
                    "function": {
                        "name": name,
                        "description": description,
                        "parameters": parameters,
                    }
                })),
                ToolSpec::Native {
                    namespace: ModelNamespace::Xai,
                    config,
                    ..
                } => Some(config.clone()),
                ToolSpec::Native { .. } => None,
            })
            .collect();
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        if let Some(NamespaceOptions::Search {
            mode,
            return_citations,
            max_search_results,
        }) = request.provider_options.get(ModelNamespace::Xai)
        {
            body["search_parameters"] = json!({
                "mode": mode,
                "return_citations": return_citations,
                "max_search_results": max_search_results,
            });
        }

        body
    }

    pub fn parse_response(response_body: &Value) -> Result<Completion, ModelError> {
        let message = response_body
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .ok_or_else(|| ModelError::InvalidResponse("missing choices in response".to_string()))?;

        let mut completion = Completion {
            text: message["content"].as_str().unwrap_or_default().to_string(),
            ..Completion::default()
        };

        for call in message["tool_calls"].as_array().into_iter().flatten() {
            let function = &call["function"];
            let name = function["name"].as_str().ok_or_else(|| {
                ModelError::InvalidResponse("tool call missing function name".to_string())
            })?;
            let arguments = match function["arguments"].as_str() {
                Some(raw) => serde_json::from_str(raw).map_err(|e| {
                    ModelError::InvalidResponse(format!("bad arguments for {}: {}", name, e))
                })?,
                None => json!({}),
            };
            completion.tool_calls.push(ToolCall {
                id: call["id"].as_str().unwrap_or(name).to_string(),
                name: name.to_string(),
                arguments,
            });
        }

        let usage = &response_body["usage"];
        completion.usage = Usage {
            input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
            output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
        };

        Ok(completion)
    }
}

fn to_chat_message(message: &PromptMessage) -> Value {
    match message {
        PromptMessage::User { text } => json!({ "role": "user", "content": text }),
        PromptMessage::Assistant { text, tool_calls } if tool_calls.is_empty() => {
            json!({ "role": "assistant", "content": text })
        }
        PromptMessage::Assistant { text, tool_calls } => {
            let calls: Vec<Value> = tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string(),
                        }
                    })
                })
                .collect();
            json!({ "role": "assistant", "content": text, "tool_calls": calls })
        }
        PromptMessage::ToolResult {
            call_id, content, ..
        } => json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": tool_content_string(content),
        }),
    }
}

#[async_trait]
impl ModelClient for XaiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError> {
        let body = self.build_request_body(request);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;
        let response = check_status(response, KEY_VAR).await?;

        let response_body: Value = response.json().await.map_err(json_error)?;
        Self::parse_response(&response_body)
    }

    fn provider_name(&self) -> &str {
        "xai"
    }
}
