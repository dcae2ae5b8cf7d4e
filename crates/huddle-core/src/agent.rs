// ABOUTME: Defines the persisted Agent record and the knowledge files linked to its vector store.
// ABOUTME: Agents are read by the mention pipeline; visibility is public-or-owner.

use serde::{Deserialize, Serialize};

/// A named bundle of a system-prompt fragment, an optional model override,
/// and an optional knowledge-store link. Mentioned in chat as `@slug`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub agent_prompt: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub vector_store_id: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub user_id: String,
}

impl Agent {
    /// Whether `requester` may run this agent: public agents are open to
    /// everyone, private ones only to their owner.
    pub fn is_accessible_to(&self, requester: &str) -> bool {
        self.is_public || self.user_id == requester
    }
}

/// Metadata for one file in an agent's knowledge store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeFile {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
}
