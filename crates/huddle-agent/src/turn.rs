// ABOUTME: Sequences one chat turn: persist the user message, orchestrate mentions, stream the primary answer.
// ABOUTME: TurnContext carries who is asking and how; TurnInput carries what they sent.

use std::sync::Arc;

use huddle_core::{
    AgentMention, ChatMessage, Role, TurnEvent, extract_mentions, reconstruct_raw_input,
    strip_directive_text,
};
use huddle_store::{ChatStore, StoreError};

use crate::executor::AgentRunExecutor;
use crate::model::ModelClient;
use crate::orchestrator::MentionOrchestrator;
use crate::prompts::RequestHints;
use crate::sink::EventSink;
use crate::streamer::{PrimaryTurnStreamer, STREAM_ERROR_TEXT};
use crate::tools::ToolGateway;

/// Request-scoped facts about a turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnContext {
    pub chat_id: String,
    pub user_id: String,
    /// Admins may use the deep transcript tool.
    pub is_admin: bool,
    pub hints: RequestHints,
    /// Caller tool allow-list; `None` enables every tool.
    pub active_tools: Option<Vec<String>>,
}

impl TurnContext {
    pub fn new(chat_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}

/// The user's side of a turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnInput {
    pub message_id: Option<String>,
    pub text: String,
    /// Mentions chosen explicitly by the client. When absent they are
    /// extracted from `text`.
    pub mentions: Option<Vec<AgentMention>>,
    pub raw_input: Option<String>,
}

impl TurnInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Resolve mentions and the raw input agents see.
    ///
    /// Explicit mentions without a raw input get one rebuilt from the text and
    /// the mentions; extracted mentions already live in the text itself.
    pub fn resolve(&self) -> (Vec<AgentMention>, String) {
        match (&self.mentions, &self.raw_input) {
            (Some(mentions), Some(raw)) => (mentions.clone(), raw.clone()),
            (Some(mentions), None) => {
                (mentions.clone(), reconstruct_raw_input(&self.text, mentions))
            }
            (None, raw) => (
                extract_mentions(&self.text),
                raw.clone().unwrap_or_else(|| self.text.clone()),
            ),
        }
    }
}

/// A turn whose user message is stored and whose generation has not begun.
#[derive(Debug, Clone)]
pub struct StartedTurn {
    pub mentions: Vec<AgentMention>,
    pub raw_input: String,
    /// Stored history ending with the new user message.
    pub transcript: Vec<ChatMessage>,
}

pub struct TurnRunner {
    store: Arc<dyn ChatStore>,
    executor: AgentRunExecutor,
    streamer: PrimaryTurnStreamer,
}

impl TurnRunner {
    pub fn new(
        client: Arc<dyn ModelClient>,
        store: Arc<dyn ChatStore>,
        gateway: Arc<ToolGateway>,
        default_model: impl Into<String>,
        max_steps: u32,
    ) -> Self {
        let default_model = default_model.into();
        Self {
            executor: AgentRunExecutor::new(
                Arc::clone(&client),
                Arc::clone(&store),
                gateway,
                default_model.clone(),
                max_steps,
            ),
            streamer: PrimaryTurnStreamer::new(client, Arc::clone(&store), default_model),
            store,
        }
    }

    /// Run a whole turn. The only error is failing to persist the user's
    /// message, which happens before any generation starts.
    pub async fn run(
        &self,
        context: &TurnContext,
        input: TurnInput,
        sink: &dyn EventSink,
    ) -> Result<Option<ChatMessage>, StoreError> {
        let started = match self.start(context, input).await {
            Ok(started) => started,
            Err(e) => {
                let _ = sink
                    .emit(TurnEvent::Error {
                        error_text: STREAM_ERROR_TEXT.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };
        Ok(self.finish(context, started, sink).await)
    }

    /// Persist the user's message and load the transcript it joins.
    pub async fn start(
        &self,
        context: &TurnContext,
        input: TurnInput,
    ) -> Result<StartedTurn, StoreError> {
        let (mentions, raw_input) = input.resolve();

        let stored_text = strip_directive_text(&input.text, &mentions);
        let user_message = match input.message_id {
            Some(id) => ChatMessage::with_id(id, Role::User, stored_text),
            None => ChatMessage::new(Role::User, stored_text),
        };

        let persisted = async {
            let history = self.store.get_messages(&context.chat_id).await?;
            self.store
                .save_messages(&context.chat_id, std::slice::from_ref(&user_message))
                .await?;
            Ok::<_, StoreError>(history)
        };
        let mut transcript = persisted.await.inspect_err(|e| {
            tracing::error!(
                chat_id = %context.chat_id,
                error = %e,
                "failed to persist user message"
            );
        })?;
        transcript.push(user_message);

        Ok(StartedTurn {
            mentions,
            raw_input,
            transcript,
        })
    }

    /// Orchestrate the mentions of a started turn, then stream the primary answer.
    pub async fn finish(
        &self,
        context: &TurnContext,
        started: StartedTurn,
        sink: &dyn EventSink,
    ) -> Option<ChatMessage> {
        let StartedTurn {
            mentions,
            raw_input,
            mut transcript,
        } = started;

        if !mentions.is_empty() {
            tracing::info!(
                chat_id = %context.chat_id,
                mentions = mentions.len(),
                "orchestrating mentions"
            );
            let outcome = MentionOrchestrator::new(
                &self.executor,
                Arc::clone(&self.store),
                sink,
                context,
                raw_input,
                mentions,
                transcript,
            )
            .run()
            .await;
            transcript = outcome.transcript;
        }

        self.streamer.stream(context, &transcript, sink).await
    }
}
