// ABOUTME: Runs one mentioned agent: builds its prompt, options, and tools, then calls the tool loop once.
// ABOUTME: Errors propagate to the caller; turning them into transcript text is the orchestrator's job.

use std::sync::Arc;

use huddle_core::{Agent, ChatMessage, KnowledgeFile};
use huddle_store::{ChatStore, StoreError};

use crate::generate::generate_text;
use crate::model::{CompletionRequest, ModelClient, ModelError, PromptMessage, Usage};
use crate::prompts::{NO_RESPONSE, RequestHints, agent_instruction, agent_system_prompt};
use crate::providers::{ProviderOptions, split_model_id};
use crate::tools::{ToolContext, ToolGateway, build_tool_set};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

/// Everything an agent run needs to know about the turn that mentioned it.
#[derive(Debug, Clone, Default)]
pub struct AgentRunInput {
    pub chat_id: String,
    pub requester_id: String,
    /// The complete user message, including every mention directive.
    pub full_message: String,
    /// The prompt fragment attached to this mention; may be empty.
    pub focus: String,
    /// Prior conversation, oldest first.
    pub history: Vec<ChatMessage>,
    pub active_tools: Option<Vec<String>>,
    pub hints: RequestHints,
    pub allow_deep_transcript: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentRunOutput {
    pub body: String,
    pub model_id: String,
    pub usage: Usage,
}

pub struct AgentRunExecutor {
    client: Arc<dyn ModelClient>,
    store: Arc<dyn ChatStore>,
    gateway: Arc<ToolGateway>,
    default_model: String,
    max_steps: u32,
}

impl AgentRunExecutor {
    pub fn new(
        client: Arc<dyn ModelClient>,
        store: Arc<dyn ChatStore>,
        gateway: Arc<ToolGateway>,
        default_model: impl Into<String>,
        max_steps: u32,
    ) -> Self {
        Self {
            client,
            store,
            gateway,
            default_model: default_model.into(),
            max_steps,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Knowledge files linked to the agent, listed under its owner.
    async fn knowledge_files(&self, agent: &Agent) -> Result<Vec<KnowledgeFile>, StoreError> {
        match &agent.vector_store_id {
            Some(store_id) => {
                self.store
                    .get_vector_store_files_by_user(&agent.user_id, store_id)
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn run(
        &self,
        agent: &Agent,
        input: &AgentRunInput,
    ) -> Result<AgentRunOutput, ExecutorError> {
        let model_id = agent
            .model_id
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let (namespace, _) = split_model_id(&model_id)?;

        let files = self.knowledge_files(agent).await?;

        let mut request = CompletionRequest::new(
            model_id.clone(),
            agent_system_prompt(agent, &files, &input.hints),
        );
        request.messages = PromptMessage::from_history(&input.history);
        request
            .messages
            .push(PromptMessage::user(agent_instruction(&input.full_message, &input.focus)));
        request.provider_options = ProviderOptions::for_namespace(namespace);

        let tools = build_tool_set(
            &ToolContext {
                user_id: input.requester_id.clone(),
                chat_id: input.chat_id.clone(),
                vector_store_id: agent.vector_store_id.clone(),
                namespace,
                allow_deep_transcript: input.allow_deep_transcript,
            },
            Arc::clone(&self.gateway),
        )
        .restrict_to(input.active_tools.as_deref());

        tracing::debug!(
            slug = %agent.slug,
            model = %model_id,
            tools = tools.len(),
            files = files.len(),
            "running agent"
        );

        let output = generate_text(self.client.as_ref(), request, &tools, self.max_steps).await?;

        let body = match output.text.trim() {
            "" => NO_RESPONSE.to_string(),
            text => text.to_string(),
        };

        Ok(AgentRunOutput {
            body,
            model_id,
            usage: output.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ModelNamespace, NamespaceOptions};
    use crate::testing::{FailingModelClient, StubModelClient};
    use crate::tools::ToolSpec;
    use huddle_store::SqliteStore;

    fn agent(model_id: Option<&str>, vector_store_id: Option<&str>) -> Agent {
        Agent {
            id: "a1".to_string(),
            slug: "ops".to_string(),
            name: "Ops".to_string(),
            agent_prompt: "You run deploys.".to_string(),
            model_id: model_id.map(String::from),
            vector_store_id: vector_store_id.map(String::from),
            is_public: true,
            user_id: "owner".to_string(),
        }
    }

    fn input() -> AgentRunInput {
        AgentRunInput {
            chat_id: "c1".to_string(),
            requester_id: "u1".to_string(),
            full_message: "Ask @ops about deploys".to_string(),
            focus: "about deploys".to_string(),
            history: vec![ChatMessage::user_text("Ask @ops")],
            ..AgentRunInput::default()
        }
    }

    fn executor(client: Arc<dyn ModelClient>, store: Arc<dyn ChatStore>) -> AgentRunExecutor {
        AgentRunExecutor::new(
            client,
            store,
            Arc::new(ToolGateway::disabled()),
            "anthropic/claude-sonnet-4-5-20250929",
            5,
        )
    }

    #[tokio::test]
    async fn run_builds_prompt_and_returns_trimmed_body() {
        let stub = Arc::new(StubModelClient::new("  deploys are green  "));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let exec = executor(stub.clone(), store);

        let out = exec.run(&agent(None, None), &input()).await.unwrap();
        assert_eq!(out.body, "deploys are green");
        assert_eq!(out.model_id, "anthropic/claude-sonnet-4-5-20250929");

        let request = &stub.requests()[0];
        assert!(request.system.contains("You run deploys."));
        assert!(request.provider_options.is_empty());
        assert_eq!(request.messages.len(), 2);
        match request.messages.last().unwrap() {
            PromptMessage::User { text } => {
                assert!(text.ends_with("Your instruction:\nabout deploys"))
            }
            other => panic!("expected user instruction, got {:?}", other),
        }
        // Base tools only; no knowledge store linked.
        assert_eq!(request.tools.len(), 5);
    }

    #[tokio::test]
    async fn empty_output_becomes_fallback_text() {
        let stub = Arc::new(StubModelClient::new("   "));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let out = executor(stub, store)
            .run(&agent(None, None), &input())
            .await
            .unwrap();
        assert_eq!(out.body, NO_RESPONSE);
    }

    #[tokio::test]
    async fn reasoning_model_with_store_gets_options_files_and_native_search() {
        let stub = Arc::new(StubModelClient::new("ok"));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .add_vector_store_file(
                "owner",
                "vs_9",
                &KnowledgeFile {
                    id: "f1".to_string(),
                    name: "runbook.md".to_string(),
                    size_bytes: 100,
                },
            )
            .await
            .unwrap();

        let exec = executor(stub.clone(), store);
        let mut run_input = input();
        run_input.active_tools = Some(vec!["search_web".to_string()]);
        exec.run(&agent(Some("openai/gpt-5"), Some("vs_9")), &run_input)
            .await
            .unwrap();

        let request = &stub.requests()[0];
        assert!(request.system.contains("runbook.md (id: f1"));
        assert!(matches!(
            request.provider_options.get(ModelNamespace::OpenAi),
            Some(NamespaceOptions::Reasoning { .. })
        ));
        let names: Vec<&str> = request.tools.iter().map(ToolSpec::name).collect();
        // knowledge_base_search is filtered by the allow-list; the fetch tool is pinned.
        assert_eq!(names, vec!["fetch_file_contents", "search_web"]);
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let exec = executor(Arc::new(FailingModelClient::new("provider down")), store);
        let err = exec.run(&agent(None, None), &input()).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Model(_)));
    }

    #[tokio::test]
    async fn unknown_model_is_an_error() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let exec = executor(Arc::new(StubModelClient::new("x")), store);
        let err = exec
            .run(&agent(Some("llama-3"), None), &input())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Model(ModelError::UnknownModel(_))));
    }
}
