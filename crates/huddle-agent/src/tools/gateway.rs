// ABOUTME: HTTP client for the external tool gateway that backs search, messaging, calendar, and mail tools.
// ABOUTME: GatewayTool implements Tool by POSTing its arguments and run context to the gateway.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Tool, ToolError};

/// Client for `<base_url>/tools/<name>`.
#[derive(Debug, Clone)]
pub struct ToolGateway {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl ToolGateway {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// A gateway with no backend; every call fails with `NotConfigured`.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    pub async fn invoke(
        &self,
        tool: &str,
        arguments: &Value,
        context: &Value,
    ) -> Result<Value, ToolError> {
        let base_url = self.base_url.as_ref().ok_or(ToolError::NotConfigured)?;
        let url = format!("{}/tools/{}", base_url, tool);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "tool": tool,
                "arguments": arguments,
                "context": context,
            }))
            .send()
            .await
            .map_err(|e| ToolError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Failed {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ToolError::Http(format!("invalid tool response: {}", e)))
    }
}

/// A tool whose implementation lives behind the gateway.
pub struct GatewayTool {
    name: String,
    description: String,
    parameters: Value,
    gateway: Arc<ToolGateway>,
    context: Value,
}

impl GatewayTool {
    pub fn new(
        name: &str,
        description: &str,
        parameters: Value,
        gateway: Arc<ToolGateway>,
        context: Value,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            gateway,
            context,
        }
    }
}

#[async_trait]
impl Tool for GatewayTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        if !arguments.is_object() {
            return Err(ToolError::InvalidArguments(format!(
                "{} expects an object, got {}",
                self.name, arguments
            )));
        }
        self.gateway.invoke(&self.name, &arguments, &self.context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_gateway_reports_not_configured() {
        let gateway = ToolGateway::disabled();
        assert!(!gateway.is_configured());

        let err = gateway
            .invoke("search_web", &json!({"query": "x"}), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotConfigured));
    }

    #[tokio::test]
    async fn gateway_tool_rejects_non_object_arguments() {
        let tool = GatewayTool::new(
            "search_web",
            "Search",
            json!({"type": "object"}),
            Arc::new(ToolGateway::disabled()),
            json!({}),
        );
        let err = tool.call(json!("just a string")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let gateway = ToolGateway::new(Some("http://tools.local/".to_string()));
        assert_eq!(gateway.base_url.as_deref(), Some("http://tools.local"));
    }
}
