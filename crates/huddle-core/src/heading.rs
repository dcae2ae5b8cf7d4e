// ABOUTME: Producer and parser for the `### Response from @slug (Name)` heading on agent replies.
// ABOUTME: The heading is a wire contract between the orchestrator and history reconciliation.

use std::sync::LazyLock;

use regex::Regex;

/// Bump when the heading layout changes; producer and parser below must move together.
pub const HEADING_VERSION: u32 = 1;

const HEADING_PREFIX: &str = "### Response from @";

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^### Response from @([A-Za-z0-9][A-Za-z0-9_-]{0,63})",
        r"(?: \(([^\r\n]*)\))?[ \t]*(?:\r?\n|$)",
    ))
    .expect("heading pattern compiles")
});

/// Attribution recovered from an agent reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeading {
    pub slug: String,
    pub agent_name: Option<String>,
    pub body: String,
}

/// Render the heading line for a reply from `slug`.
///
/// Whitespace runs in the name, line breaks included, collapse to one space
/// so the heading stays on a single line.
pub fn format_response_heading(slug: &str, agent_name: Option<&str>) -> String {
    let name = agent_name
        .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|n| !n.is_empty());
    match name {
        Some(name) => format!("{}{} ({})", HEADING_PREFIX, slug, name),
        None => format!("{}{}", HEADING_PREFIX, slug),
    }
}

/// Render a full reply: heading, blank line, body.
pub fn format_response(slug: &str, agent_name: Option<&str>, body: &str) -> String {
    format!("{}\n\n{}", format_response_heading(slug, agent_name), body)
}

/// Recognize a heading produced by [`format_response`] at the start of `text`.
pub fn parse_response_heading(text: &str) -> Option<ParsedHeading> {
    let trimmed = text.trim();
    let caps = HEADING_RE.captures(trimmed)?;
    let whole = caps.get(0)?;
    let slug = caps.get(1)?.as_str().to_lowercase();
    let agent_name = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .filter(|n| !n.is_empty());
    let body = trimmed[whole.end()..].trim().to_string();

    Some(ParsedHeading {
        slug,
        agent_name,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_with_and_without_name() {
        assert_eq!(
            format_response_heading("ops", Some("Ops Helper")),
            "### Response from @ops (Ops Helper)"
        );
        assert_eq!(format_response_heading("ops", None), "### Response from @ops");
        assert_eq!(format_response_heading("ops", Some("  ")), "### Response from @ops");
    }

    #[test]
    fn parse_recovers_slug_name_and_body() {
        let text = format_response("sales-bot", Some("Sales Bot"), "Q3 was up 12%.");
        let parsed = parse_response_heading(&text).expect("heading should parse");
        assert_eq!(parsed.slug, "sales-bot");
        assert_eq!(parsed.agent_name.as_deref(), Some("Sales Bot"));
        assert_eq!(parsed.body, "Q3 was up 12%.");
    }

    #[test]
    fn parse_handles_names_with_parentheses() {
        let text = format_response("eu", Some("Sales (EU)"), "body");
        let parsed = parse_response_heading(&text).unwrap();
        assert_eq!(parsed.agent_name.as_deref(), Some("Sales (EU)"));
    }

    #[test]
    fn multiline_names_still_round_trip() {
        assert_eq!(
            format_response_heading("ops", Some("Ops\nBot")),
            "### Response from @ops (Ops Bot)"
        );

        let text = format_response("ops", Some(" Ops\r\n\tBot \u{2028} Team "), "body");
        let parsed = parse_response_heading(&text).expect("heading should parse");
        assert_eq!(parsed.slug, "ops");
        assert_eq!(parsed.agent_name.as_deref(), Some("Ops Bot Team"));
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn parse_is_case_insensitive_on_slug() {
        let parsed = parse_response_heading("### Response from @OPS\n\nok").unwrap();
        assert_eq!(parsed.slug, "ops");
        assert!(parsed.agent_name.is_none());
        assert_eq!(parsed.body, "ok");
    }

    #[test]
    fn parse_tolerates_surrounding_whitespace() {
        let parsed = parse_response_heading("\n\n  ### Response from @ops  \n\nbody\n").unwrap();
        assert_eq!(parsed.slug, "ops");
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn parse_accepts_heading_without_body() {
        let parsed = parse_response_heading("### Response from @ops").unwrap();
        assert_eq!(parsed.body, "");
    }

    #[test]
    fn parse_rejects_other_text() {
        assert!(parse_response_heading("Hello there").is_none());
        assert!(parse_response_heading("## Response from @ops\n\nx").is_none());
        assert!(parse_response_heading("intro\n### Response from @ops\n\nx").is_none());
        assert!(parse_response_heading("### Response from @ops-extra!\n\nx").is_none());
    }
}
