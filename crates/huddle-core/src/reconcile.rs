// ABOUTME: Works out which mentioned agents are still pending given status events and history.
// ABOUTME: A mention is pending if its latest status is `started` and no reply this turn names it.

use std::collections::HashSet;

use crate::heading::parse_response_heading;
use crate::message::{ChatMessage, Role};
use crate::status::{AgentRunStatus, AgentStatusEvent};

/// Slugs, in first-seen order, that should still render a pending placeholder.
///
/// Reply headings only count when they follow the most recent user message,
/// so an answer from an earlier turn never hides a rerun of the same agent.
pub fn pending_mentions(statuses: &[AgentStatusEvent], history: &[ChatMessage]) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut latest: Vec<AgentRunStatus> = Vec::new();

    for event in statuses {
        let slug = event.slug.to_lowercase();
        match order.iter().position(|s| *s == slug) {
            Some(idx) => latest[idx] = event.status,
            None => {
                order.push(slug);
                latest.push(event.status);
            }
        }
    }

    // Only replies after the latest user message belong to the turn in flight.
    let turn_start = history
        .iter()
        .rposition(|m| m.role == Role::User)
        .map_or(0, |idx| idx + 1);
    let answered: HashSet<String> = history[turn_start..]
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .filter_map(|m| parse_response_heading(&m.text()))
        .map(|h| h.slug)
        .collect();

    order
        .into_iter()
        .zip(latest)
        .filter(|(slug, status)| *status == AgentRunStatus::Started && !answered.contains(slug))
        .map(|(slug, _)| slug)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heading::format_response;

    fn status(slug: &str, status: AgentRunStatus) -> AgentStatusEvent {
        AgentStatusEvent {
            slug: slug.to_string(),
            status,
            message_id: None,
            agent_name: None,
        }
    }

    #[test]
    fn started_without_reply_is_pending() {
        let statuses = vec![status("ops", AgentRunStatus::Started)];
        assert_eq!(pending_mentions(&statuses, &[]), vec!["ops".to_string()]);
    }

    #[test]
    fn terminal_status_clears_pending() {
        let statuses = vec![
            status("ops", AgentRunStatus::Started),
            status("ops", AgentRunStatus::Finished),
            status("sales", AgentRunStatus::Started),
            status("sales", AgentRunStatus::Error),
        ];
        assert!(pending_mentions(&statuses, &[]).is_empty());
    }

    #[test]
    fn reply_heading_in_history_clears_pending() {
        let statuses = vec![
            status("ops", AgentRunStatus::Started),
            status("sales", AgentRunStatus::Started),
        ];
        let history = vec![
            ChatMessage::user_text("@ops @sales"),
            ChatMessage::assistant_text(format_response("OPS", None, "done")),
        ];
        assert_eq!(pending_mentions(&statuses, &history), vec!["sales".to_string()]);
    }

    #[test]
    fn user_messages_with_heading_text_do_not_count() {
        let statuses = vec![status("ops", AgentRunStatus::Started)];
        let history = vec![ChatMessage::user_text(format_response("ops", None, "fake"))];
        assert_eq!(pending_mentions(&statuses, &history), vec!["ops".to_string()]);
    }

    #[test]
    fn replies_from_earlier_turns_do_not_count() {
        let statuses = vec![status("ops", AgentRunStatus::Started)];
        let history = vec![
            ChatMessage::user_text("@ops deploy"),
            ChatMessage::assistant_text(format_response("ops", Some("Ops"), "deployed")),
            ChatMessage::assistant_text("Deploy is done."),
            ChatMessage::user_text("@ops roll back"),
        ];
        assert_eq!(pending_mentions(&statuses, &history), vec!["ops".to_string()]);

        let mut answered = history;
        answered.push(ChatMessage::assistant_text(format_response("ops", None, "rolled back")));
        assert!(pending_mentions(&statuses, &answered).is_empty());
    }
}
