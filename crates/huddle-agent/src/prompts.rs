// ABOUTME: System prompt and instruction builders for agent runs and the primary assistant turn.
// ABOUTME: Prompts are assembled from a general block, a request-context block, and an agent block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use huddle_core::{Agent, KnowledgeFile};

/// Returned when a model produces no text.
pub const NO_RESPONSE: &str = "No response generated.";

pub const GENERAL_INSTRUCTIONS: &str = "You are a helpful assistant working inside a shared chat. \
Answer accurately and concisely, using Markdown where it helps readability. \
Use the available tools when they give you information you do not already have, \
and never invent tool results, links, or file contents. \
If you cannot complete a request, say so plainly.";

const PRIMARY_GUIDANCE: &str = "Specialist agents may have answered parts of this turn already; \
their replies appear in the conversation under a \"### Response from @agent\" heading. \
Build on those replies instead of repeating them.";

const NO_FOCUS_FALLBACK: &str = "You were mentioned without a specific instruction. \
Respond to the user's message from your area of expertise, using the conversation so far as context.";

/// Caller-supplied hints about where and when the request was made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHints {
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

impl RequestHints {
    /// Fill in the current time when the caller did not send one.
    pub fn with_now_default(mut self) -> Self {
        if self.now.is_none() {
            self.now = Some(Utc::now());
        }
        self
    }
}

fn request_context_block(hints: &RequestHints) -> String {
    let mut lines = vec!["## Request context".to_string()];
    if let Some(now) = hints.now {
        lines.push(format!("Current time (UTC): {}", now.format("%Y-%m-%d %H:%M")));
    }
    if let Some(timezone) = &hints.timezone {
        lines.push(format!("User time zone: {}", timezone));
    }
    if let Some(locale) = &hints.locale {
        lines.push(format!("User locale: {}", locale));
    }
    if lines.len() == 1 {
        lines.push("No location or time hints were provided.".to_string());
    }
    lines.join("\n")
}

fn agent_block(agent: &Agent, files: &[KnowledgeFile]) -> String {
    let mut block = format!(
        "## Your role\nYou are {} (@{}).\n\n{}",
        agent.name,
        agent.slug,
        agent.agent_prompt.trim()
    );

    if !files.is_empty() {
        block.push_str("\n\n## Knowledge files\nThese files are available to you:\n");
        for file in files {
            block.push_str(&format!(
                "- {} (id: {}, {})\n",
                file.name,
                file.id,
                human_size(file.size_bytes)
            ));
        }
        block.push_str("Use fetch_file_contents with a file id to read one.");
    }

    block
}

fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// System prompt for one mentioned agent.
pub fn agent_system_prompt(agent: &Agent, files: &[KnowledgeFile], hints: &RequestHints) -> String {
    [
        GENERAL_INSTRUCTIONS.to_string(),
        request_context_block(hints),
        agent_block(agent, files),
    ]
    .join("\n\n")
}

/// System prompt for the primary assistant turn.
pub fn primary_system_prompt(hints: &RequestHints) -> String {
    [
        GENERAL_INSTRUCTIONS.to_string(),
        request_context_block(hints),
        PRIMARY_GUIDANCE.to_string(),
    ]
    .join("\n\n")
}

/// The user-side instruction for an agent run: the full message, then either
/// the agent's focus prompt or a generic fallback.
pub fn agent_instruction(full_message: &str, focus: &str) -> String {
    let mut sections = Vec::new();
    if !full_message.trim().is_empty() {
        sections.push(format!("Full user message:\n{}", full_message.trim()));
    }
    if focus.trim().is_empty() {
        sections.push(NO_FOCUS_FALLBACK.to_string());
    } else {
        sections.push(format!("Your instruction:\n{}", focus.trim()));
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent {
            id: "a1".to_string(),
            slug: "sales-bot".to_string(),
            name: "Sales Bot".to_string(),
            agent_prompt: "You know the sales pipeline.".to_string(),
            model_id: None,
            vector_store_id: Some("vs_1".to_string()),
            is_public: true,
            user_id: "owner".to_string(),
        }
    }

    #[test]
    fn agent_prompt_includes_all_blocks() {
        let files = vec![KnowledgeFile {
            id: "file_1".to_string(),
            name: "q3.csv".to_string(),
            size_bytes: 2048,
        }];
        let hints = RequestHints {
            locale: Some("en-US".to_string()),
            timezone: Some("America/Chicago".to_string()),
            now: None,
        };

        let prompt = agent_system_prompt(&agent(), &files, &hints);

        assert!(prompt.starts_with(GENERAL_INSTRUCTIONS));
        assert!(prompt.contains("User locale: en-US"));
        assert!(prompt.contains("User time zone: America/Chicago"));
        assert!(prompt.contains("You are Sales Bot (@sales-bot)."));
        assert!(prompt.contains("You know the sales pipeline."));
        assert!(prompt.contains("- q3.csv (id: file_1, 2.0 KB)"));
    }

    #[test]
    fn no_files_means_no_file_section() {
        let prompt = agent_system_prompt(&agent(), &[], &RequestHints::default());
        assert!(!prompt.contains("Knowledge files"));
        assert!(prompt.contains("No location or time hints"));
    }

    #[test]
    fn instruction_uses_focus_or_fallback() {
        let focused = agent_instruction("Please check @sales-bot: Q3", "Q3");
        assert!(focused.contains("Full user message:\nPlease check @sales-bot: Q3"));
        assert!(focused.ends_with("Your instruction:\nQ3"));

        let unfocused = agent_instruction("hey @ops", "  ");
        assert!(unfocused.contains(NO_FOCUS_FALLBACK));

        let bare = agent_instruction("", "do it");
        assert_eq!(bare, "Your instruction:\ndo it");
    }

    #[test]
    fn with_now_default_keeps_explicit_time() {
        let fixed = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let hints = RequestHints {
            now: Some(fixed),
            ..RequestHints::default()
        }
        .with_now_default();
        assert_eq!(hints.now, Some(fixed));
        assert!(RequestHints::default().with_now_default().now.is_some());
        assert!(primary_system_prompt(&hints).contains("2025-01-02 03:04"));
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(human_size(12), "12 bytes");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
