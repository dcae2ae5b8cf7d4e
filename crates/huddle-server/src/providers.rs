// ABOUTME: Model provider status detection for the huddle API.
// ABOUTME: Reads environment variables to report which providers are configured, never their keys.

use serde::Serialize;

/// Status of a single model provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub name: String,
    pub has_api_key: bool,
    pub base_url: Option<String>,
}

/// Overall provider status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub default_model: String,
    pub providers: Vec<ProviderInfo>,
    pub any_available: bool,
}

impl ProviderStatus {
    /// Detect configured providers from their `*_API_KEY` and `*_BASE_URL`
    /// variables. Empty values count as unset.
    pub fn detect(default_model: &str) -> Self {
        let providers = vec![
            Self::check_provider("anthropic", "ANTHROPIC_API_KEY", "ANTHROPIC_BASE_URL"),
            Self::check_provider("openai", "OPENAI_API_KEY", "OPENAI_BASE_URL"),
            Self::check_provider("google", "GEMINI_API_KEY", "GEMINI_BASE_URL"),
            Self::check_provider("xai", "XAI_API_KEY", "XAI_BASE_URL"),
        ];

        let any_available = providers.iter().any(|p| p.has_api_key);

        Self {
            default_model: default_model.to_string(),
            providers,
            any_available,
        }
    }

    fn check_provider(name: &str, key_var: &str, base_url_var: &str) -> ProviderInfo {
        let has_api_key = std::env::var(key_var)
            .ok()
            .filter(|k| !k.is_empty())
            .is_some();
        let base_url = std::env::var(base_url_var).ok().filter(|u| !u.is_empty());

        ProviderInfo {
            name: name.to_string(),
            has_api_key,
            base_url,
        }
    }
}
