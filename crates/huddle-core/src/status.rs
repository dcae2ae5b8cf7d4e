// ABOUTME: Defines per-mention run status events and the terminal result of an agent run.
// ABOUTME: A result converts once into the attributed assistant message that gets persisted.

use serde::{Deserialize, Serialize};

use crate::heading::format_response;
use crate::message::ChatMessage;

/// Lifecycle of one mention within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRunStatus {
    Started,
    Finished,
    Error,
}

impl AgentRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

/// The two states a mention run can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStatus {
    Finished,
    Error,
}

impl From<TerminalStatus> for AgentRunStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Finished => AgentRunStatus::Finished,
            TerminalStatus::Error => AgentRunStatus::Error,
        }
    }
}

/// Transient UI hint describing where a mention run is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusEvent {
    pub slug: String,
    pub status: AgentRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

impl AgentStatusEvent {
    pub fn started(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            status: AgentRunStatus::Started,
            message_id: None,
            agent_name: None,
        }
    }
}

/// Outcome of running (or refusing to run) one mentioned agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRunResult {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub status: TerminalStatus,
    pub body: String,
}

impl AgentRunResult {
    pub fn finished(
        slug: impl Into<String>,
        agent_name: Option<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            agent_name,
            status: TerminalStatus::Finished,
            body: body.into(),
        }
    }

    pub fn error(
        slug: impl Into<String>,
        agent_name: Option<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            agent_name,
            status: TerminalStatus::Error,
            body: body.into(),
        }
    }

    /// Build the attributed assistant message for this result.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::assistant_text(format_response(
            &self.slug,
            self.agent_name.as_deref(),
            &self.body,
        ))
    }

    /// The terminal status event announcing `message_id`.
    pub fn terminal_event(&self, message_id: &str) -> AgentStatusEvent {
        AgentStatusEvent {
            slug: self.slug.clone(),
            status: self.status.into(),
            message_id: Some(message_id.to_string()),
            agent_name: self.agent_name.clone(),
        }
    }
}
