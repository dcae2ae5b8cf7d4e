// ABOUTME: Defines the ChatStore trait, the persistence boundary used by the mention pipeline.
// ABOUTME: Also defines StoreError, shared by every storage backend.

use async_trait::async_trait;
use thiserror::Error;

use huddle_core::{Agent, Chat, ChatMessage, KnowledgeFile, TurnUsage};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("agent slug already taken: {0}")]
    SlugTaken(String),

    #[error("message id belongs to another chat: {0}")]
    MessageIdTaken(String),

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("blocking store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Load and save chat, message, and agent records.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Look up an agent by slug, case-insensitively.
    async fn get_agent_by_slug(&self, slug: &str) -> Result<Option<Agent>, StoreError>;

    /// Agents visible to `user_id`: all public agents plus the user's own.
    async fn list_agents_for(&self, user_id: &str) -> Result<Vec<Agent>, StoreError>;

    async fn upsert_agent(&self, agent: &Agent) -> Result<(), StoreError>;

    /// Delete agent `id` if owned by `owner`. Returns whether a row was removed.
    async fn delete_agent(&self, id: &str, owner: &str) -> Result<bool, StoreError>;

    async fn get_vector_store_files_by_user(
        &self,
        user_id: &str,
        store_id: &str,
    ) -> Result<Vec<KnowledgeFile>, StoreError>;

    async fn add_vector_store_file(
        &self,
        user_id: &str,
        store_id: &str,
        file: &KnowledgeFile,
    ) -> Result<(), StoreError>;

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, StoreError>;

    async fn save_chat(&self, chat: &Chat) -> Result<(), StoreError>;

    /// All messages of a chat in insertion order.
    async fn get_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, StoreError>;

    /// Append `messages` to a chat in a single write. Saving an id that
    /// already exists in the same chat replaces its body; an id owned by a
    /// different chat fails the whole batch with `MessageIdTaken`.
    async fn save_messages(&self, chat_id: &str, messages: &[ChatMessage])
    -> Result<(), StoreError>;

    async fn record_usage(&self, usage: &TurnUsage) -> Result<(), StoreError>;
}
