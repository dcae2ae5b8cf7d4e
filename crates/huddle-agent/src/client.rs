// ABOUTME: Factory for provider adapters and the RoutingClient that dispatches by model namespace.
// ABOUTME: Model ids look like `anthropic/claude-...` or bare names whose namespace can be inferred.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{ChunkStream, Completion, CompletionRequest, ModelClient, ModelError};
use crate::providers::anthropic::AnthropicClient;
use crate::providers::gemini::GeminiClient;
use crate::providers::openai::OpenAiClient;
use crate::providers::xai::XaiClient;
use crate::providers::{ModelNamespace, split_model_id};

/// Create the adapter for `namespace` from its environment variables.
pub fn create_model_client(namespace: ModelNamespace) -> Result<Arc<dyn ModelClient>, ModelError> {
    let client: Arc<dyn ModelClient> = match namespace {
        ModelNamespace::Anthropic => Arc::new(AnthropicClient::from_env()?),
        ModelNamespace::OpenAi => Arc::new(OpenAiClient::from_env()?),
        ModelNamespace::Google => Arc::new(GeminiClient::from_env()?),
        ModelNamespace::Xai => Arc::new(XaiClient::from_env()?),
    };
    Ok(client)
}

/// Dispatches each request to the adapter for its model's namespace and
/// rewrites the model id to the bare name that adapter expects.
#[derive(Clone, Default)]
pub struct RoutingClient {
    clients: BTreeMap<ModelNamespace, Arc<dyn ModelClient>>,
}

impl RoutingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, namespace: ModelNamespace, client: Arc<dyn ModelClient>) -> Self {
        self.clients.insert(namespace, client);
        self
    }

    /// Register every provider whose credentials are present.
    pub fn from_env() -> Self {
        let mut routing = Self::new();
        for namespace in ModelNamespace::ALL {
            match create_model_client(namespace) {
                Ok(client) => {
                    tracing::info!(provider = %namespace, "model provider configured");
                    routing.clients.insert(namespace, client);
                }
                Err(e) => {
                    tracing::debug!(provider = %namespace, error = %e, "model provider skipped");
                }
            }
        }
        routing
    }

    pub fn configured(&self) -> Vec<ModelNamespace> {
        self.clients.keys().copied().collect()
    }

    fn route(
        &self,
        request: &CompletionRequest,
    ) -> Result<(Arc<dyn ModelClient>, CompletionRequest), ModelError> {
        let (namespace, model) = split_model_id(&request.model)?;
        let client = self
            .clients
            .get(&namespace)
            .cloned()
            .ok_or_else(|| ModelError::NotConfigured(namespace.to_string()))?;

        let mut routed = request.clone();
        routed.model = model;
        Ok((client, routed))
    }
}

#[async_trait]
impl ModelClient for RoutingClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError> {
        let (client, routed) = self.route(request)?;
        tracing::debug!(provider = client.provider_name(), model = %routed.model, "completion");
        client.complete(&routed).await
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ModelError> {
        let (client, routed) = self.route(request)?;
        tracing::debug!(
            provider = client.provider_name(),
            model = %routed.model,
            "streaming completion"
        );
        client.stream(&routed).await
    }

    fn provider_name(&self) -> &str {
        "routing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingModelClient, StubModelClient};
    use std::env;
    use std::sync::Mutex;

    /// Serialize all tests that read/write env vars to prevent race conditions.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn expect_err(result: Result<Arc<dyn ModelClient>, ModelError>) -> String {
        match result {
            Err(e) => e.to_string(),
            Ok(client) => panic!("expected error, got client {}", client.provider_name()),
        }
    }

    #[test]
    fn anthropic_missing_api_key_returns_error() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe { env::remove_var("ANTHROPIC_API_KEY") };
        let err = expect_err(create_model_client(ModelNamespace::Anthropic));
        assert!(err.contains("ANTHROPIC_API_KEY"), "got: {}", err);
    }

    #[test]
    fn xai_missing_api_key_returns_error() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe { env::remove_var("XAI_API_KEY") };
        let err = expect_err(create_model_client(ModelNamespace::Xai));
        assert!(err.contains("XAI_API_KEY"), "got: {}", err);
    }

    #[test]
    fn openai_with_key_creates_client() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe { env::set_var("OPENAI_API_KEY", "test-key-123") };

        let result = create_model_client(ModelNamespace::OpenAi);

        unsafe { env::remove_var("OPENAI_API_KEY") };

        match result {
            Ok(client) => assert_eq!(client.provider_name(), "openai"),
            Err(e) => panic!("expected Ok, got Err: {}", e),
        }
    }

    #[tokio::test]
    async fn routing_strips_namespace_before_delegating() {
        let stub = Arc::new(StubModelClient::new("hello"));
        let routing = RoutingClient::new().with_client(ModelNamespace::Anthropic, stub.clone());

        let request = CompletionRequest::new("anthropic/claude-haiku-4-5", "sys");
        let completion = routing.complete(&request).await.unwrap();

        assert_eq!(completion.text, "hello");
        assert_eq!(stub.requests()[0].model, "claude-haiku-4-5");
    }

    #[tokio::test]
    async fn routing_dispatches_by_namespace() {
        let routing = RoutingClient::new()
            .with_client(ModelNamespace::Anthropic, Arc::new(StubModelClient::new("ok")))
            .with_client(ModelNamespace::OpenAi, Arc::new(FailingModelClient::new("down")));

        assert!(routing.complete(&CompletionRequest::new("claude-x", "s")).await.is_ok());
        assert!(routing.complete(&CompletionRequest::new("gpt-5", "s")).await.is_err());
        assert_eq!(
            routing.configured(),
            vec![ModelNamespace::Anthropic, ModelNamespace::OpenAi]
        );
    }

    #[tokio::test]
    async fn routing_reports_unconfigured_namespace() {
        let routing = RoutingClient::new();
        let err = routing
            .complete(&CompletionRequest::new("gemini/gemini-2.0-flash", "s"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::NotConfigured(ref ns) if ns == "google"));
    }
}
