// ABOUTME: Processes a turn's mentions one at a time: resolve, authorize, run, and record each agent reply.
// ABOUTME: Emits status and append events per mention and persists all agent replies in one batch at the end.

use std::collections::VecDeque;
use std::sync::Arc;

use huddle_core::{AgentMention, AgentRunResult, AgentStatusEvent, ChatMessage, TurnEvent};
use huddle_store::ChatStore;

use crate::executor::{AgentRunExecutor, AgentRunInput};
use crate::sink::EventSink;
use crate::turn::TurnContext;

pub(crate) fn not_available_body(slug: &str) -> String {
    format!("Agent @{} is not available.", slug)
}

pub(crate) fn access_denied_body(slug: &str) -> String {
    format!("Access denied: @{} is a private agent.", slug)
}

pub(crate) fn run_error_body(slug: &str) -> String {
    format!("Encountered an error while running @{}.", slug)
}

/// What a finished orchestration leaves behind.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOutcome {
    /// The running transcript including every agent reply.
    pub transcript: Vec<ChatMessage>,
    /// Agent replies produced this turn, in mention order.
    pub generated: Vec<ChatMessage>,
    pub results: Vec<AgentRunResult>,
}

/// Owns the mention queue, the growing transcript, and the event sink for one turn.
pub struct MentionOrchestrator<'a> {
    executor: &'a AgentRunExecutor,
    store: Arc<dyn ChatStore>,
    sink: &'a dyn EventSink,
    context: &'a TurnContext,
    raw_input: String,
    queue: VecDeque<AgentMention>,
    transcript: Vec<ChatMessage>,
}

impl<'a> MentionOrchestrator<'a> {
    pub fn new(
        executor: &'a AgentRunExecutor,
        store: Arc<dyn ChatStore>,
        sink: &'a dyn EventSink,
        context: &'a TurnContext,
        raw_input: String,
        mentions: Vec<AgentMention>,
        transcript: Vec<ChatMessage>,
    ) -> Self {
        Self {
            executor,
            store,
            sink,
            context,
            raw_input,
            queue: mentions.into(),
            transcript,
        }
    }

    pub async fn run(mut self) -> OrchestratorOutcome {
        let mut generated = Vec::new();
        let mut results = Vec::new();

        while let Some(mention) = self.queue.pop_front() {
            self.emit(TurnEvent::agent_status(AgentStatusEvent::started(&mention.slug)))
                .await;

            let result = self.resolve_and_run(&mention).await;

            let message = result.to_message();
            self.transcript.push(message.clone());

            match TurnEvent::append_message(&message) {
                Ok(event) => self.emit(event).await,
                Err(e) => tracing::error!(
                    slug = %mention.slug,
                    chat_id = %self.context.chat_id,
                    error = %e,
                    "failed to serialize agent message"
                ),
            }
            self.emit(TurnEvent::agent_status(result.terminal_event(&message.id)))
                .await;

            generated.push(message);
            results.push(result);
        }

        if !generated.is_empty()
            && let Err(e) = self
                .store
                .save_messages(&self.context.chat_id, &generated)
                .await
        {
            tracing::error!(
                chat_id = %self.context.chat_id,
                count = generated.len(),
                error = %e,
                "failed to persist agent replies"
            );
        }

        OrchestratorOutcome {
            transcript: self.transcript,
            generated,
            results,
        }
    }

    /// Resolve the mentioned agent and run it. Never fails: lookups that come
    /// up empty or forbidden finish with an explanation, faults become errors.
    async fn resolve_and_run(&self, mention: &AgentMention) -> AgentRunResult {
        let slug = mention.slug.as_str();
        let chat_id = self.context.chat_id.as_str();

        let agent = match self.store.get_agent_by_slug(slug).await {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                tracing::info!(slug, chat_id, "mentioned agent not found");
                return AgentRunResult::finished(slug, None, not_available_body(slug));
            }
            Err(e) => {
                tracing::error!(slug, chat_id, error = %e, "agent lookup failed");
                return AgentRunResult::error(slug, None, run_error_body(slug));
            }
        };

        if !agent.is_accessible_to(&self.context.user_id) {
            tracing::info!(slug, chat_id, "mentioned agent is private to another user");
            return AgentRunResult::finished(slug, None, access_denied_body(slug));
        }

        let input = AgentRunInput {
            chat_id: self.context.chat_id.clone(),
            requester_id: self.context.user_id.clone(),
            full_message: self.raw_input.clone(),
            focus: mention.prompt.clone(),
            history: self.transcript.clone(),
            active_tools: self.context.active_tools.clone(),
            hints: self.context.hints.clone(),
            allow_deep_transcript: self.context.is_admin,
        };

        match self.executor.run(&agent, &input).await {
            Ok(output) => {
                tracing::info!(slug, chat_id, model = %output.model_id, "agent run finished");
                AgentRunResult::finished(slug, Some(agent.name), output.body)
            }
            Err(e) => {
                tracing::error!(slug, chat_id, error = %e, "agent run failed");
                AgentRunResult::error(slug, Some(agent.name), run_error_body(slug))
            }
        }
    }

    async fn emit(&self, event: TurnEvent) {
        if self.sink.emit(event).await.is_err() {
            tracing::debug!(chat_id = %self.context.chat_id, "event sink closed; continuing turn");
        }
    }
}
