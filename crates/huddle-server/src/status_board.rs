// ABOUTME: In-memory board of the latest agent status per mention, per chat.
// ABOUTME: A sink wrapper records status events on their way to the client for pending reconciliation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use huddle_agent::{EventSink, SinkClosed};
use huddle_core::{AgentStatusEvent, TurnEvent};

/// Latest status event per slug, in first-seen order, for every chat with a
/// mention still running. A chat's entry is dropped once all of its
/// mentions reach a terminal status.
#[derive(Clone, Default)]
pub struct StatusBoard {
    chats: Arc<Mutex<HashMap<String, Vec<AgentStatusEvent>>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, chat_id: &str, event: AgentStatusEvent) {
        let mut chats = self.chats.lock().unwrap_or_else(|e| e.into_inner());
        let statuses = chats.entry(chat_id.to_string()).or_default();
        match statuses
            .iter_mut()
            .find(|s| s.slug.eq_ignore_ascii_case(&event.slug))
        {
            Some(existing) => *existing = event,
            None => statuses.push(event),
        }
        if statuses.iter().all(|s| s.status.is_terminal()) {
            chats.remove(chat_id);
        }
    }

    /// Number of chats with a mention still running.
    pub fn active_chats(&self) -> usize {
        self.chats.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn statuses(&self, chat_id: &str) -> Vec<AgentStatusEvent> {
        let chats = self.chats.lock().unwrap_or_else(|e| e.into_inner());
        chats.get(chat_id).cloned().unwrap_or_default()
    }

    /// Wrap `sender` so status events for `chat_id` land on this board.
    pub fn sink(
        &self,
        chat_id: impl Into<String>,
        sender: mpsc::Sender<TurnEvent>,
    ) -> RecordingSink {
        RecordingSink {
            board: self.clone(),
            chat_id: chat_id.into(),
            sender,
        }
    }
}

/// Records status events even after the client has gone away.
pub struct RecordingSink {
    board: StatusBoard,
    chat_id: String,
    sender: mpsc::Sender<TurnEvent>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: TurnEvent) -> Result<(), SinkClosed> {
        if let TurnEvent::AgentStatus { data, .. } = &event {
            self.board.record(&self.chat_id, data.clone());
        }
        self.sender.emit(event).await
    }
}
