// ABOUTME: Defines the structured events written to a chat turn's outgoing stream.
// ABOUTME: Agent status and message-append events share the channel with primary text deltas.

use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;
use crate::status::AgentStatusEvent;

/// One event on the turn stream. The `type` tag doubles as the SSE event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// Per-mention progress. Never persisted.
    #[serde(rename = "data-agent-status")]
    AgentStatus {
        data: AgentStatusEvent,
        transient: bool,
    },

    /// A finished agent message, JSON-serialized, for immediate rendering.
    #[serde(rename = "data-appendMessage")]
    AppendMessage { data: String },

    #[serde(rename = "start", rename_all = "camelCase")]
    Start { message_id: String },

    #[serde(rename = "text-delta")]
    TextDelta { delta: String },

    #[serde(rename = "finish")]
    Finish,

    #[serde(rename = "error", rename_all = "camelCase")]
    Error { error_text: String },
}

impl TurnEvent {
    pub fn agent_status(data: AgentStatusEvent) -> Self {
        TurnEvent::AgentStatus {
            data,
            transient: true,
        }
    }

    pub fn append_message(message: &ChatMessage) -> Result<Self, serde_json::Error> {
        Ok(TurnEvent::AppendMessage {
            data: serde_json::to_string(message)?,
        })
    }

    /// Event name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::AgentStatus { .. } => "data-agent-status",
            TurnEvent::AppendMessage { .. } => "data-appendMessage",
            TurnEvent::Start { .. } => "start",
            TurnEvent::TextDelta { .. } => "text-delta",
            TurnEvent::Finish => "finish",
            TurnEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::AgentRunStatus;

    #[test]
    fn agent_status_is_transient() {
        let event = TurnEvent::agent_status(AgentStatusEvent::started("ops"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "data-agent-status");
        assert_eq!(json["transient"], true);
        assert_eq!(json["data"]["slug"], "ops");
        assert_eq!(json["data"]["status"], "started");
    }

    #[test]
    fn append_message_carries_serialized_message() {
        let msg = ChatMessage::assistant_text("hi");
        let event = TurnEvent::append_message(&msg).unwrap();
        let TurnEvent::AppendMessage { data } = &event else {
            panic!("expected AppendMessage");
        };
        let back: ChatMessage = serde_json::from_str(data).unwrap();
        assert_eq!(back.id, msg.id);
        assert_eq!(event.name(), "data-appendMessage");
    }

    #[test]
    fn names_match_serde_tags() {
        let events = vec![
            TurnEvent::agent_status(AgentStatusEvent {
                slug: "a".into(),
                status: AgentRunStatus::Finished,
                message_id: Some("m".into()),
                agent_name: None,
            }),
            TurnEvent::AppendMessage { data: "{}".into() },
            TurnEvent::Start {
                message_id: "m".into(),
            },
            TurnEvent::TextDelta { delta: "x".into() },
            TurnEvent::Finish,
            TurnEvent::Error {
                error_text: "oops".into(),
            },
        ];
        for event in &events {
            let json = serde_json::to_value(event).unwrap();
            assert_eq!(json["type"], event.name(), "tag mismatch for {:?}", event);
        }
    }

    #[test]
    fn start_and_error_use_camel_case_fields() {
        let json = serde_json::to_value(TurnEvent::Start {
            message_id: "m1".into(),
        })
        .unwrap();
        assert_eq!(json["messageId"], "m1");

        let json = serde_json::to_value(TurnEvent::Error {
            error_text: "bad".into(),
        })
        .unwrap();
        assert_eq!(json["errorText"], "bad");
    }
}
