// ABOUTME: Provider module aggregating all model adapters plus namespace inference and options.
// ABOUTME: Provider options are keyed by namespace and translated by each adapter it applies to.

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod xai;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::model::ModelError;

/// Upper bound on live search results requested from search-augmented providers.
pub const MAX_SEARCH_RESULTS: u32 = 10;

/// Reasoning and tool artifacts requested back from reasoning-capable providers.
pub const REASONING_INCLUDES: [&str; 2] =
    ["reasoning.encrypted_content", "file_search_call.results"];

/// The provider family a model id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelNamespace {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Google,
    Xai,
}

impl ModelNamespace {
    pub const ALL: [ModelNamespace; 4] = [
        ModelNamespace::Anthropic,
        ModelNamespace::OpenAi,
        ModelNamespace::Google,
        ModelNamespace::Xai,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelNamespace::Anthropic => "anthropic",
            ModelNamespace::OpenAi => "openai",
            ModelNamespace::Google => "google",
            ModelNamespace::Xai => "xai",
        }
    }

    /// Parse an explicit namespace prefix such as `openai` in `openai/gpt-5`.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "anthropic" => Some(ModelNamespace::Anthropic),
            "openai" => Some(ModelNamespace::OpenAi),
            "google" | "gemini" => Some(ModelNamespace::Google),
            "xai" | "grok" => Some(ModelNamespace::Xai),
            _ => None,
        }
    }

    /// Guess the namespace of a bare model name from well-known prefixes.
    pub fn infer(model: &str) -> Option<Self> {
        let model = model.to_ascii_lowercase();
        if model.starts_with("claude") {
            Some(ModelNamespace::Anthropic)
        } else if model.starts_with("gpt")
            || model.starts_with("o1")
            || model.starts_with("o3")
            || model.starts_with("o4")
        {
            Some(ModelNamespace::OpenAi)
        } else if model.starts_with("gemini") {
            Some(ModelNamespace::Google)
        } else if model.starts_with("grok") {
            Some(ModelNamespace::Xai)
        } else {
            None
        }
    }

    /// Providers that reason before answering and can return reasoning artifacts.
    pub fn is_reasoning_family(&self) -> bool {
        matches!(self, ModelNamespace::OpenAi)
    }

    /// Providers that can run live web search with citations.
    pub fn is_search_family(&self) -> bool {
        matches!(self, ModelNamespace::Xai)
    }

    /// Whether the provider can search a knowledge store natively.
    pub fn supports_native_file_search(&self) -> bool {
        matches!(self, ModelNamespace::OpenAi)
    }
}

impl std::fmt::Display for ModelNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split `ns/model` (or a bare model name) into its namespace and the model
/// name the provider API expects.
pub fn split_model_id(model_id: &str) -> Result<(ModelNamespace, String), ModelError> {
    if let Some((prefix, name)) = model_id.split_once('/')
        && let Some(namespace) = ModelNamespace::from_prefix(prefix)
        && !name.is_empty()
    {
        return Ok((namespace, name.to_string()));
    }

    ModelNamespace::infer(model_id)
        .map(|namespace| (namespace, model_id.to_string()))
        .ok_or_else(|| ModelError::UnknownModel(model_id.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

/// Options for one provider namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamespaceOptions {
    #[serde(rename_all = "camelCase")]
    Reasoning {
        reasoning_effort: ReasoningEffort,
        include: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Search {
        mode: String,
        return_citations: bool,
        max_search_results: u32,
    },
}

/// Provider-specific request options keyed by namespace. Adapters only read
/// the entry for their own namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderOptions(BTreeMap<ModelNamespace, NamespaceOptions>);

impl ProviderOptions {
    /// Options for a run against `namespace`.
    pub fn for_namespace(namespace: ModelNamespace) -> Self {
        let mut options = BTreeMap::new();
        if namespace.is_reasoning_family() {
            options.insert(
                namespace,
                NamespaceOptions::Reasoning {
                    reasoning_effort: ReasoningEffort::Medium,
                    include: REASONING_INCLUDES.iter().map(|s| s.to_string()).collect(),
                },
            );
        } else if namespace.is_search_family() {
            options.insert(
                namespace,
                NamespaceOptions::Search {
                    mode: "auto".to_string(),
                    return_citations: true,
                    max_search_results: MAX_SEARCH_RESULTS,
                },
            );
        }
        Self(options)
    }

    pub fn get(&self, namespace: ModelNamespace) -> Option<&NamespaceOptions> {
        self.0.get(&namespace)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Map a non-success HTTP status to a ModelError, or pass the response through.
pub(crate) async fn check_status(
    response: reqwest::Response,
    key_var: &str,
) -> Result<reqwest::Response, ModelError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ModelError::RateLimited);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ModelError::Provider(format!(
            "Unauthorized: check {}",
            key_var
        )));
    }

    if status.is_server_error() {
        return Err(ModelError::Provider(format!("Server error: {}", status)));
    }

    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(ModelError::Provider(format!(
            "API error {}: {}",
            status, error_body
        )));
    }

    Ok(response)
}

/// Merge consecutive messages with the same role by concatenating their
/// `key` arrays. Both Anthropic and Gemini require alternating roles.
pub(crate) fn coalesce_by_role(messages: Vec<Value>, key: &str) -> Vec<Value> {
    let mut result: Vec<Value> = Vec::new();

    for msg in messages {
        let role = msg.get("role").and_then(|r| r.as_str()).unwrap_or("user");
        let blocks = msg
            .get(key)
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();
        if blocks.is_empty() {
            continue;
        }

        if let Some(last) = result.last_mut()
            && last.get("role").and_then(|r| r.as_str()) == Some(role)
            && let Some(existing) = last.get_mut(key).and_then(|c| c.as_array_mut())
        {
            existing.extend(blocks);
            continue;
        }

        result.push(json!({ "role": role, key: blocks }));
    }

    result
}

pub(crate) fn http_error(e: reqwest::Error) -> ModelError {
    ModelError::Provider(format!("HTTP request failed: {}", e))
}

pub(crate) fn json_error(e: reqwest::Error) -> ModelError {
    ModelError::InvalidResponse(format!("failed to parse JSON: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_uses_explicit_prefix() {
        let (ns, name) = split_model_id("openai/gpt-5").unwrap();
        assert_eq!(ns, ModelNamespace::OpenAi);
        assert_eq!(name, "gpt-5");

        let (ns, name) = split_model_id("gemini/gemini-2.0-flash").unwrap();
        assert_eq!(ns, ModelNamespace::Google);
        assert_eq!(name, "gemini-2.0-flash");
    }

    #[test]
    fn split_infers_bare_model_names() {
        assert_eq!(
            split_model_id("claude-sonnet-4-5-20250929").unwrap().0,
            ModelNamespace::Anthropic
        );
        assert_eq!(split_model_id("o3-mini").unwrap().0, ModelNamespace::OpenAi);
        assert_eq!(split_model_id("grok-4").unwrap().0, ModelNamespace::Xai);
    }

    #[test]
    fn split_rejects_unknown_models() {
        let err = split_model_id("llama-3").unwrap_err();
        assert!(matches!(err, ModelError::UnknownModel(ref m) if m == "llama-3"));
        assert!(split_model_id("acme/model").is_err());
    }

    #[test]
    fn reasoning_family_gets_effort_and_includes() {
        let options = ProviderOptions::for_namespace(ModelNamespace::OpenAi);
        match options.get(ModelNamespace::OpenAi) {
            Some(NamespaceOptions::Reasoning {
                reasoning_effort,
                include,
            }) => {
                assert_eq!(*reasoning_effort, ReasoningEffort::Medium);
                assert!(include.iter().any(|i| i == "reasoning.encrypted_content"));
            }
            other => panic!("expected reasoning options, got {:?}", other),
        }
    }

    #[test]
    fn search_family_gets_capped_auto_search() {
        let options = ProviderOptions::for_namespace(ModelNamespace::Xai);
        match options.get(ModelNamespace::Xai) {
            Some(NamespaceOptions::Search {
                mode,
                return_citations,
                max_search_results,
            }) => {
                assert_eq!(mode, "auto");
                assert!(*return_citations);
                assert_eq!(*max_search_results, MAX_SEARCH_RESULTS);
            }
            other => panic!("expected search options, got {:?}", other),
        }
    }

    #[test]
    fn other_namespaces_get_no_options() {
        assert!(ProviderOptions::for_namespace(ModelNamespace::Anthropic).is_empty());
        assert!(ProviderOptions::for_namespace(ModelNamespace::Google).is_empty());
    }

    #[test]
    fn coalesce_merges_consecutive_same_role() {
        let messages = vec![
            json!({"role": "user", "content": [{"type": "text", "text": "First"}]}),
            json!({"role": "user", "content": [{"type": "text", "text": "Second"}]}),
            json!({"role": "assistant", "content": []}),
            json!({"role": "assistant", "content": [{"type": "text", "text": "Reply"}]}),
        ];

        let result = coalesce_by_role(messages, "content");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0]["content"].as_array().unwrap().len(), 2);
        assert_eq!(result[0]["content"][1]["text"], "Second");
        assert_eq!(result[1]["role"], "assistant");
    }

    #[test]
    fn options_serialize_keyed_by_namespace() {
        let json = serde_json::to_value(ProviderOptions::for_namespace(ModelNamespace::OpenAi))
            .unwrap();
        assert_eq!(json["openai"]["reasoningEffort"], "medium");

        let json =
            serde_json::to_value(ProviderOptions::for_namespace(ModelNamespace::Xai)).unwrap();
        assert_eq!(json["xai"]["returnCitations"], true);
        assert_eq!(json["xai"]["maxSearchResults"], MAX_SEARCH_RESULTS);
    }
}
