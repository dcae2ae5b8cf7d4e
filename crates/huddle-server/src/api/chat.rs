// ABOUTME: Chat turn and chat history handlers.
// ABOUTME: A posted message starts a background turn whose events stream back over SSE.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use huddle_agent::{RequestHints, TurnContext, TurnInput};
use huddle_core::heading::HEADING_VERSION;
use huddle_core::{AgentMention, Chat, ChatMessage, TurnEvent, is_valid_slug, pending_mentions};

use crate::api::error::ApiError;
use crate::app_state::SharedState;
use crate::auth::Identity;

pub const MAX_MENTIONS: usize = 8;
pub const MAX_MESSAGE_CHARS: usize = 32_000;
const MAX_ID_CHARS: usize = 128;
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// Request body for POST /api/chats/{id}/messages.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: IncomingMessage,
    #[serde(default)]
    pub agent_mentions: Option<Vec<AgentMention>>,
    #[serde(default)]
    pub raw_input: Option<String>,
    #[serde(default)]
    pub active_tools: Option<Vec<String>>,
    #[serde(default)]
    pub hints: RequestHints,
}

impl SendMessageRequest {
    /// Check limits and normalize explicit mention slugs.
    fn into_turn_input(self) -> Result<(TurnInput, Option<Vec<String>>, RequestHints), ApiError> {
        let message = self.message;
        if message.text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ApiError::BadRequest(format!(
                "message exceeds {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        if message.id.as_deref().is_some_and(|id| !is_valid_id(id)) {
            return Err(ApiError::BadRequest("invalid message id".to_string()));
        }

        let mentions = match self.agent_mentions {
            Some(mentions) => Some(
                mentions
                    .into_iter()
                    .map(|m| {
                        let slug = m.slug.trim().trim_start_matches('@').to_lowercase();
                        if is_valid_slug(&slug) {
                            Ok(AgentMention::new(slug, m.prompt))
                        } else {
                            Err(ApiError::BadRequest(format!("invalid agent slug: {}", m.slug)))
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        let input = TurnInput {
            message_id: message.id,
            text: message.text,
            mentions,
            raw_input: self.raw_input,
        };

        let (resolved, _) = input.resolve();
        if input.text.trim().is_empty() && resolved.is_empty() {
            return Err(ApiError::BadRequest("message is empty".to_string()));
        }
        if resolved.len() > MAX_MENTIONS {
            return Err(ApiError::BadRequest(format!(
                "at most {} agents can be mentioned in one message",
                MAX_MENTIONS
            )));
        }

        Ok((input, self.active_tools, self.hints))
    }
}

/// Response body for GET /api/chats/{id}/messages.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    pub messages: Vec<ChatMessage>,
    pub pending_mentions: Vec<String>,
    pub heading_version: u32,
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_CHARS
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Convert the turn's event channel into an SSE-compatible stream.
fn event_stream_from_receiver(
    rx: mpsc::Receiver<TurnEvent>,
) -> impl Stream<Item = Result<SseEvent, axum::Error>> {
    ReceiverStream::new(rx).map(|event| SseEvent::default().event(event.name()).json_data(&event))
}

/// Load a chat the caller owns, or create it on first use.
async fn owned_or_new_chat(
    state: &SharedState,
    chat_id: &str,
    identity: &Identity,
    first_message: &str,
) -> Result<(), ApiError> {
    match state.store.get_chat(chat_id).await? {
        Some(chat) if chat.user_id != identity.user_id => {
            Err(ApiError::Forbidden("chat belongs to another user".to_string()))
        }
        Some(_) => Ok(()),
        None => {
            state
                .store
                .save_chat(&Chat::new(chat_id, identity.user_id.as_str(), first_message))
                .await?;
            tracing::info!(chat_id, user = %identity.user_id, "chat created");
            Ok(())
        }
    }
}

/// POST /api/chats/{id}/messages - Run a turn and stream its events.
pub async fn send_message(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(chat_id): Path<String>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    if !is_valid_id(&chat_id) {
        return Err(ApiError::BadRequest("invalid chat id".to_string()));
    }
    let Json(request) = payload?;
    let (input, active_tools, hints) = request.into_turn_input()?;

    owned_or_new_chat(&state, &chat_id, &identity, &input.text).await?;

    let context = TurnContext {
        chat_id: chat_id.clone(),
        user_id: identity.user_id,
        is_admin: identity.is_admin,
        hints: hints.with_now_default(),
        active_tools,
    };

    // The user message is stored before the stream opens so a rejected
    // write is still a plain HTTP error.
    let started = state.runner.start(&context, input).await?;

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let sink = state.statuses.sink(chat_id, tx);
    let runner = Arc::clone(&state.runner);
    tokio::spawn(async move {
        runner.finish(&context, started, &sink).await;
    });

    Ok(Sse::new(event_stream_from_receiver(rx))
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// GET /api/chats/{id}/messages - Stored transcript plus mentions still in flight.
pub async fn get_history(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(chat_id): Path<String>,
) -> Result<Json<ChatHistory>, ApiError> {
    let chat = state
        .store
        .get_chat(&chat_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("chat not found".to_string()))?;
    if chat.user_id != identity.user_id {
        return Err(ApiError::Forbidden("chat belongs to another user".to_string()));
    }

    let messages = state.store.get_messages(&chat_id).await?;
    let pending = pending_mentions(&state.statuses.statuses(&chat_id), &messages);

    Ok(Json(ChatHistory {
        messages,
        pending_mentions: pending,
        heading_version: HEADING_VERSION,
    }))
}
