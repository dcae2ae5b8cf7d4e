// ABOUTME: Shared application state for the huddle HTTP server.
// ABOUTME: Holds the store, the turn runner, the status board, and the auth layer for all handlers.

use std::sync::Arc;

use huddle_agent::{ModelClient, RoutingClient, ToolGateway, TurnRunner};
use huddle_store::ChatStore;

use crate::auth::AuthLayer;
use crate::config::HuddleConfig;
use crate::providers::ProviderStatus;
use crate::status_board::StatusBoard;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub runner: Arc<TurnRunner>,
    pub statuses: StatusBoard,
    pub provider_status: ProviderStatus,
    pub auth: AuthLayer,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        store: Arc<dyn ChatStore>,
        runner: TurnRunner,
        provider_status: ProviderStatus,
        auth: AuthLayer,
    ) -> Self {
        Self {
            store,
            runner: Arc::new(runner),
            statuses: StatusBoard::new(),
            provider_status,
            auth,
        }
    }

    /// Wire providers, tools, and auth from the loaded configuration.
    pub fn from_config(config: &HuddleConfig, store: Arc<dyn ChatStore>) -> Self {
        let routing = RoutingClient::from_env();
        if routing.configured().is_empty() {
            tracing::warn!("no model provider configured; turns will fail until an API key is set");
        }
        Self::with_client(config, store, Arc::new(routing))
    }

    /// Like [`AppState::from_config`] with an explicit model client.
    pub fn with_client(
        config: &HuddleConfig,
        store: Arc<dyn ChatStore>,
        client: Arc<dyn ModelClient>,
    ) -> Self {
        let gateway = Arc::new(ToolGateway::new(config.tools_url.clone()));
        let runner = TurnRunner::new(
            client,
            Arc::clone(&store),
            gateway,
            config.default_model.clone(),
            config.max_agent_steps,
        );
        Self::new(
            store,
            runner,
            ProviderStatus::detect(&config.default_model),
            AuthLayer::new(config.auth_tokens.clone(), config.admin_users.clone()),
        )
    }
}
