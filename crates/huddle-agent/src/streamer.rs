// ABOUTME: Streams the primary assistant answer for a turn onto the event sink, token by token.
// ABOUTME: Persists the finished answer and records usage; persistence failures are logged, never surfaced.

use std::sync::Arc;

use futures::StreamExt;

use huddle_core::{ChatMessage, Role, TurnEvent, TurnUsage};
use huddle_store::ChatStore;

use crate::model::{CompletionRequest, ModelClient, PromptMessage, StreamChunk, Usage};
use crate::prompts::primary_system_prompt;
use crate::sink::EventSink;
use crate::turn::TurnContext;

/// Shown to the user when the primary answer fails. Details go to the log.
pub const STREAM_ERROR_TEXT: &str = "Something went wrong while generating a response.";

pub struct PrimaryTurnStreamer {
    client: Arc<dyn ModelClient>,
    store: Arc<dyn ChatStore>,
    model_id: String,
}

impl PrimaryTurnStreamer {
    pub fn new(
        client: Arc<dyn ModelClient>,
        store: Arc<dyn ChatStore>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            model_id: model_id.into(),
        }
    }

    /// Stream the answer to `transcript`. Returns the persisted answer, or
    /// `None` when generation failed or produced nothing.
    pub async fn stream(
        &self,
        context: &TurnContext,
        transcript: &[ChatMessage],
        sink: &dyn EventSink,
    ) -> Option<ChatMessage> {
        let chat_id = context.chat_id.as_str();
        let message_id = ulid::Ulid::new().to_string();

        let mut request = CompletionRequest::new(
            self.model_id.clone(),
            primary_system_prompt(&context.hints),
        );
        request.messages = PromptMessage::from_history(transcript);

        emit(sink, chat_id, TurnEvent::Start {
            message_id: message_id.clone(),
        })
        .await;

        let (text, usage) = match self.collect(&request, sink, chat_id).await {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(chat_id, model = %self.model_id, error = %e, "primary turn failed");
                emit(sink, chat_id, TurnEvent::Error {
                    error_text: STREAM_ERROR_TEXT.to_string(),
                })
                .await;
                return None;
            }
        };

        emit(sink, chat_id, TurnEvent::Finish).await;

        self.record_usage(chat_id, usage).await;

        if text.trim().is_empty() {
            return None;
        }
        let answer = ChatMessage::with_id(message_id, Role::Assistant, text);
        if let Err(e) = self.store.save_messages(chat_id, std::slice::from_ref(&answer)).await {
            tracing::warn!(chat_id, error = %e, "failed to persist primary answer");
        }
        Some(answer)
    }

    async fn collect(
        &self,
        request: &CompletionRequest,
        sink: &dyn EventSink,
        chat_id: &str,
    ) -> Result<(String, Usage), crate::model::ModelError> {
        let mut chunks = self.client.stream(request).await?;
        let mut text = String::new();
        let mut usage = Usage::default();

        while let Some(chunk) = chunks.next().await {
            match chunk? {
                StreamChunk::TextDelta(delta) => {
                    if delta.is_empty() {
                        continue;
                    }
                    text.push_str(&delta);
                    emit(sink, chat_id, TurnEvent::TextDelta { delta }).await;
                }
                StreamChunk::Usage(u) => usage += u,
            }
        }

        Ok((text, usage))
    }

    async fn record_usage(&self, chat_id: &str, usage: Usage) {
        let record = TurnUsage {
            chat_id: chat_id.to_string(),
            model_id: self.model_id.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        };
        if let Err(e) = self.store.record_usage(&record).await {
            tracing::warn!(chat_id, error = %e, "failed to record usage");
        }
    }
}

/// A disconnected client does not stop the turn; the answer is still persisted.
async fn emit(sink: &dyn EventSink, chat_id: &str, event: TurnEvent) {
    if sink.emit(event).await.is_err() {
        tracing::debug!(chat_id, "event sink closed; continuing turn");
    }
}
