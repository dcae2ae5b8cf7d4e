// ABOUTME: Google Gemini adapter implementing ModelClient over the generateContent API.
// ABOUTME: Maps tool calls to functionCall/functionResponse parts; streaming uses the single-delta fallback.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::model::{
    Completion, CompletionRequest, ModelClient, ModelError, PromptMessage, ToolCall, Usage,
};
use crate::providers::{ModelNamespace, check_status, coalesce_by_role, http_error, json_error};
use crate::tools::ToolSpec;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const KEY_VAR: &str = "GEMINI_API_KEY";

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new GeminiClient reading configuration from environment variables.
    /// Required: `GEMINI_API_KEY`
    /// Optional: `GEMINI_BASE_URL` (defaults to https://generativelanguage.googleapis.com)
    pub fn from_env() -> Result<Self, ModelError> {
        let api_key = std::env::var(KEY_VAR)
            .map_err(|_| ModelError::NotConfigured(format!("{} not set", KEY_VAR)))?;

        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(api_key, base_url))
    }

    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    /// Build the JSON request body for generateContent. The model goes in the URL.
    pub fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let contents: Vec<Value> = request.messages.iter().map(to_gemini_content).collect();
        let contents = coalesce_by_role(contents, "parts");

        let mut body = json!({
            "system_instruction": {
                "parts": [{"text": request.system}]
            },
            "contents": contents,
            "generation_config": {
                "max_output_tokens": request.max_tokens
            }
        });

        let declarations = build_function_declarations(&request.tools);
        if !declarations.is_empty() {
            body["tools"] = json!([{ "function_declarations": declarations }]);
        }
        body
    }

    /// Parse a generateContent response into a Completion.
    pub fn parse_response(response_body: &Value) -> Result<Completion, ModelError> {
        let candidate = response_body
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| {
                ModelError::InvalidResponse("missing candidates in response".to_string())
            })?;

        let parts = candidate["content"]["parts"].as_array().into_iter().flatten();

        let mut completion = Completion::default();
        for (index, part) in parts.enumerate() {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                completion.text.push_str(text);
            } else if let Some(call) = part.get("functionCall") {
                let name = call["name"].as_str().ok_or_else(|| {
                    ModelError::InvalidResponse("functionCall missing name".to_string())
                })?;
                // Gemini has no call ids; synthesize stable ones so results can be matched.
                completion.tool_calls.push(ToolCall {
                    id: format!("{}-{}", name, index),
                    name: name.to_string(),
                    arguments: call.get("args").cloned().unwrap_or(json!({})),
                });
            }
        }

        let usage = &response_body["usageMetadata"];
        completion.usage = Usage {
            input_tokens: usage["promptTokenCount"].as_u64().unwrap_or(0),
            output_tokens: usage["candidatesTokenCount"].as_u64().unwrap_or(0),
        };

        Ok(completion)
    }
}

fn to_gemini_content(message: &PromptMessage) -> Value {
    match message {
        PromptMessage::User { text } => json!({
            "role": "user",
            "parts": text_parts(text),
        }),
        PromptMessage::Assistant { text, tool_calls } => {
            let mut parts = text_parts(text);
            parts.extend(tool_calls.iter().map(|call| {
                json!({ "functionCall": { "name": call.name, "args": call.arguments } })
            }));
            json!({ "role": "model", "parts": parts })
        }
        PromptMessage::ToolResult { name, content, .. } => {
            // functionResponse.response must be an object.
            let response = if content.is_object() {
                content.clone()
            } else {
                json!({ "result": content })
            };
            json!({
                "role": "user",
                "parts": [{ "functionResponse": { "name": name, "response": response } }],
            })
        }
    }
}

fn text_parts(text: &str) -> Vec<Value> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![json!({ "text": text })]
    }
}

fn build_function_declarations(tools: &[ToolSpec]) -> Vec<Value> {
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
                "parameters": parameters,
            })),
            ToolSpec::Native {
                namespace: ModelNamespace::Google,
                config,
                ..
            } => Some(config.clone()),
            ToolSpec::Native { .. } => None,
        })
        .collect()
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError> {
        let body = self.build_request_body(request);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
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
        "google"
    }
}
