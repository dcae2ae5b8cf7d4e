// ABOUTME: Extracts `@slug` agent mentions and their prompt fragments from free-form user text.
// ABOUTME: Also rewrites directive text for the transcript and rebuilds raw input from mentions.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `@` followed by 1-64 word/hyphen characters, the first alphanumeric.
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Za-z0-9][A-Za-z0-9_-]{0,63})").expect("mention pattern compiles")
});

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_-]{0,63}$").expect("slug pattern compiles")
});

/// A request to run the agent named by `slug` with the text that followed the mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMention {
    pub slug: String,
    #[serde(default)]
    pub prompt: String,
}

impl AgentMention {
    pub fn new(slug: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            prompt: prompt.into(),
        }
    }
}

/// Whether `slug` is a lowercase slug that a mention could produce.
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | '-' | '\u{2013}' | '\u{2014}')
}

/// Scan `text` for mentions in left-to-right order. Each mention's prompt is the
/// text between the end of its token and the start of the next mention (or the
/// end of input), with leading separators stripped.
pub fn extract_mentions(text: &str) -> Vec<AgentMention> {
    let matches: Vec<(usize, usize, &str)> = MENTION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let slug = caps.get(1)?;
            Some((whole.start(), whole.end(), slug.as_str()))
        })
        .collect();

    matches
        .iter()
        .enumerate()
        .filter_map(|(i, &(_, end, slug))| {
            let next_start = matches.get(i + 1).map_or(text.len(), |m| m.0);
            let prompt = text[end..next_start]
                .trim_start_matches(is_separator)
                .trim();
            let slug = slug.trim().to_lowercase();
            if slug.is_empty() {
                return None;
            }
            Some(AgentMention::new(slug, prompt))
        })
        .collect()
}

/// Collapse `@slug: prompt` directives back to a bare `@slug` so the stored
/// user message reads naturally. Only the first occurrence after position 0
/// is rewritten for each mention with a non-empty prompt.
pub fn strip_directive_text(text: &str, mentions: &[AgentMention]) -> String {
    let mut result = text.to_string();

    for mention in mentions.iter().filter(|m| !m.prompt.is_empty()) {
        let pattern = format!(
            r"(?i)@{}[\s:\-\u{{2013}}\u{{2014}}]*{}",
            regex::escape(&mention.slug),
            regex::escape(&mention.prompt)
        );
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        let Some(found) = re.find_iter(&result).find(|m| m.start() > 0) else {
            continue;
        };
        let range = found.range();
        result.replace_range(range, &format!("@{}", mention.slug));
    }

    result
}

/// Rebuild a raw input line set from the plain message text and structured
/// mentions, used when the client did not send its original input.
pub fn reconstruct_raw_input(text: &str, mentions: &[AgentMention]) -> String {
    let mut lines = Vec::with_capacity(mentions.len() + 1);
    if !text.trim().is_empty() {
        lines.push(text.trim().to_string());
    }
    for mention in mentions {
        if mention.prompt.trim().is_empty() {
            lines.push(format!("Reference to @{}", mention.slug));
        } else {
            lines.push(format!(
                "Instruction for @{}: {}",
                mention.slug,
                mention.prompt.trim()
            ));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_prompts_at_next_mention() {
        let mentions =
            extract_mentions("Please check @sales-bot: find Q3 numbers and @ops about deploys");
        assert_eq!(
            mentions,
            vec![
                AgentMention::new("sales-bot", "find Q3 numbers and"),
                AgentMention::new("ops", "about deploys"),
            ]
        );
    }

    #[test]
    fn no_at_sign_yields_nothing() {
        assert!(extract_mentions("just a normal question").is_empty());
        assert!(extract_mentions("").is_empty());
    }

    #[test]
    fn slugs_are_lowercased() {
        let mentions = extract_mentions("@Sales-Bot hi");
        assert_eq!(mentions[0].slug, "sales-bot");
        assert_eq!(mentions[0].prompt, "hi");
    }

    #[test]
    fn strips_leading_separators_including_dashes() {
        let mentions = extract_mentions("@ops \u{2014} roll back the deploy");
        assert_eq!(mentions[0].prompt, "roll back the deploy");

        let mentions = extract_mentions("@ops:: - status?");
        assert_eq!(mentions[0].prompt, "status?");
    }

    #[test]
    fn adjacent_mentions_have_empty_prompts() {
        let mentions = extract_mentions("@a @b");
        assert_eq!(
            mentions,
            vec![AgentMention::new("a", ""), AgentMention::new("b", "")]
        );
    }

    #[test]
    fn slug_must_start_alphanumeric() {
        assert!(extract_mentions("@-nope and @_nope").is_empty());
    }

    #[test]
    fn slug_is_capped_at_64_characters() {
        let long = "a".repeat(70);
        let mentions = extract_mentions(&format!("@{}", long));
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].slug.len(), 64);
        assert_eq!(mentions[0].prompt, "aaaaaa");
    }

    #[test]
    fn prompt_is_exact_substring_between_tokens() {
        let text = "intro @one first part  @two   second part ";
        let mentions = extract_mentions(text);
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].prompt, "first part");
        assert_eq!(mentions[1].prompt, "second part");
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "hey @x: do it @y: do that";
        assert_eq!(extract_mentions(text), extract_mentions(text));
    }

    #[test]
    fn strip_collapses_directives_to_bare_mentions() {
        let text = "Please check @sales-bot: find Q3 numbers and @ops about deploys";
        let mentions = extract_mentions(text);
        let stripped = strip_directive_text(text, &mentions);
        assert_eq!(stripped, "Please check @sales-bot @ops");
    }

    #[test]
    fn strip_leaves_leading_directive_alone() {
        let text = "@ops: restart the worker";
        let mentions = extract_mentions(text);
        assert_eq!(strip_directive_text(text, &mentions), text);
    }

    #[test]
    fn strip_only_rewrites_first_non_leading_occurrence() {
        let text = "x @ops: ping and again @ops: ping";
        let mentions = vec![AgentMention::new("ops", "ping")];
        assert_eq!(
            strip_directive_text(text, &mentions),
            "x @ops and again @ops: ping"
        );
    }

    #[test]
    fn strip_skips_mentions_without_prompt() {
        let text = "ask @ops";
        let mentions = vec![AgentMention::new("ops", "")];
        assert_eq!(strip_directive_text(text, &mentions), "ask @ops");
    }

    #[test]
    fn reconstructs_raw_input_lines() {
        let mentions = vec![
            AgentMention::new("ops", "about deploys"),
            AgentMention::new("sales-bot", ""),
        ];
        assert_eq!(
            reconstruct_raw_input("Status update please", &mentions),
            "Status update please\nInstruction for @ops: about deploys\nReference to @sales-bot"
        );
        assert_eq!(
            reconstruct_raw_input("  ", &mentions[..1]),
            "Instruction for @ops: about deploys"
        );
    }

    #[test]
    fn slug_validation_matches_grammar() {
        assert!(is_valid_slug("sales-bot"));
        assert!(is_valid_slug("a"));
        assert!(is_valid_slug("ops_2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("-ops"));
        assert!(!is_valid_slug("Ops"));
        assert!(!is_valid_slug(&"a".repeat(65)));
    }
}
