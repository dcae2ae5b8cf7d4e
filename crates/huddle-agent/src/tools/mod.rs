// ABOUTME: Tool abstractions for model function calling: the Tool trait, specs, and ToolSet.
// ABOUTME: A ToolSet maps names to tools and marks pinned tools that caller filters cannot remove.

pub mod gateway;
pub mod registry;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::providers::ModelNamespace;

pub use gateway::{GatewayTool, ToolGateway};
pub use registry::{ToolContext, build_tool_set};

/// Errors raised while invoking a tool. These are reported back to the model,
/// never to the user.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool gateway not configured")]
    NotConfigured,

    #[error("tool request failed: {0}")]
    Http(String),

    #[error("tool returned {status}: {body}")]
    Failed { status: u16, body: String },

    #[error("unknown tool: {0}")]
    Unknown(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

/// A callable tool exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema for the arguments object.
    fn parameters(&self) -> Value;
    async fn call(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// What a provider adapter sends to its API for one tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolSpec {
    Function {
        name: String,
        description: String,
        parameters: Value,
    },
    /// A tool executed by the provider itself; `config` is sent verbatim and
    /// only to the adapter for `namespace`.
    Native {
        namespace: ModelNamespace,
        name: String,
        config: Value,
    },
}

impl ToolSpec {
    pub fn name(&self) -> &str {
        match self {
            ToolSpec::Function { name, .. } | ToolSpec::Native { name, .. } => name,
        }
    }
}

#[derive(Clone)]
pub enum RegisteredTool {
    Function(Arc<dyn Tool>),
    Native(ToolSpec),
}

impl RegisteredTool {
    fn spec(&self) -> ToolSpec {
        match self {
            RegisteredTool::Function(tool) => ToolSpec::Function {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            },
            RegisteredTool::Native(spec) => spec.clone(),
        }
    }
}

/// An immutable set of tools for one run, plus the names that are pinned.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, RegisteredTool>,
    pinned: BTreeSet<String>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, tool: RegisteredTool, pinned: bool) {
        let name = match &tool {
            RegisteredTool::Function(t) => t.name().to_string(),
            RegisteredTool::Native(spec) => spec.name().to_string(),
        };
        if pinned {
            self.pinned.insert(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Add a callable tool. Used by tests and embedders with custom tools.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>, pinned: bool) -> Self {
        self.insert(RegisteredTool::Function(tool), pinned);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn pinned(&self) -> &BTreeSet<String> {
        &self.pinned
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The callable tool named `name`, if any. Native tools are not callable.
    pub fn function(&self, name: &str) -> Option<Arc<dyn Tool>> {
        match self.tools.get(name)? {
            RegisteredTool::Function(tool) => Some(Arc::clone(tool)),
            RegisteredTool::Native(_) => None,
        }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(RegisteredTool::spec).collect()
    }

    /// Keep only tools named in `active`, plus every pinned tool. `None`
    /// means the caller made no selection and everything stays.
    pub fn restrict_to(&self, active: Option<&[String]>) -> ToolSet {
        let Some(active) = active else {
            return self.clone();
        };
        let tools = self
            .tools
            .iter()
            .filter(|(name, _)| self.pinned.contains(*name) || active.iter().any(|a| a == *name))
            .map(|(name, tool)| (name.clone(), tool.clone()))
            .collect();
        ToolSet {
            tools,
            pinned: self.pinned.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::EchoTool;

    fn sample() -> ToolSet {
        ToolSet::new()
            .with_tool(Arc::new(EchoTool::new("search_web")), false)
            .with_tool(Arc::new(EchoTool::new("search_mail")), false)
            .with_tool(Arc::new(EchoTool::new("fetch_file_contents")), true)
    }

    #[test]
    fn restrict_keeps_selected_and_pinned() {
        let active = vec!["search_mail".to_string()];
        let restricted = sample().restrict_to(Some(&active));
        assert_eq!(restricted.names(), vec!["fetch_file_contents", "search_mail"]);
    }

    #[test]
    fn empty_selection_still_keeps_pinned() {
        let restricted = sample().restrict_to(Some(&[]));
        assert_eq!(restricted.names(), vec!["fetch_file_contents"]);
    }

    #[test]
    fn no_selection_keeps_everything() {
        assert_eq!(sample().restrict_to(None).len(), 3);
    }

    #[test]
    fn native_tools_are_listed_but_not_callable() {
        let mut set = ToolSet::new();
        set.insert(
            RegisteredTool::Native(ToolSpec::Native {
                namespace: ModelNamespace::OpenAi,
                name: "knowledge_base_search".to_string(),
                config: serde_json::json!({"type": "file_search"}),
            }),
            false,
        );
        assert!(set.contains("knowledge_base_search"));
        assert!(set.function("knowledge_base_search").is_none());
        assert_eq!(set.specs()[0].name(), "knowledge_base_search");
    }
}
