// ABOUTME: Defines the Chat record that owns a transcript and the per-turn usage record.
// ABOUTME: Chat titles are derived from the first user message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_TITLE_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// Create a chat owned by `user_id`, titled after the first line of `first_message`.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, first_message: &str) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: derive_title(first_message),
            created_at: Utc::now(),
        }
    }
}

fn derive_title(text: &str) -> String {
    let first_line = text.lines().map(str::trim).find(|l| !l.is_empty());
    match first_line {
        Some(line) if line.chars().count() > MAX_TITLE_CHARS => {
            let cut: String = line.chars().take(MAX_TITLE_CHARS).collect();
            format!("{}...", cut.trim_end())
        }
        Some(line) => line.to_string(),
        None => "New chat".to_string(),
    }
}

/// Token usage recorded after the primary assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnUsage {
    pub chat_id: String,
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_uses_first_non_empty_line() {
        let chat = Chat::new("c1", "alice", "\n  Deploy plan  \nmore text");
        assert_eq!(chat.title, "Deploy plan");
    }

    #[test]
    fn long_titles_are_truncated() {
        let text = "x".repeat(200);
        let chat = Chat::new("c1", "alice", &text);
        assert!(chat.title.ends_with("..."));
        assert_eq!(chat.title.chars().count(), MAX_TITLE_CHARS + 3);
    }

    #[test]
    fn empty_message_gets_placeholder_title() {
        assert_eq!(Chat::new("c1", "alice", "   ").title, "New chat");
    }
}
