// ABOUTME: Core library for huddle, containing chat domain types and mention parsing.
// ABOUTME: This crate defines the shared data model used across all huddle components.

pub mod agent;
pub mod chat;
pub mod event;
pub mod heading;
pub mod mention;
pub mod message;
pub mod reconcile;
pub mod status;

pub use agent::{Agent, KnowledgeFile};
pub use chat::{Chat, TurnUsage};
pub use event::TurnEvent;
pub use heading::{ParsedHeading, format_response, format_response_heading, parse_response_heading};
pub use mention::{
    AgentMention, extract_mentions, is_valid_slug, reconstruct_raw_input, strip_directive_text,
};
pub use message::{ChatMessage, MessageMetadata, MessagePart, Role};
pub use reconcile::pending_mentions;
pub use status::{AgentRunResult, AgentRunStatus, AgentStatusEvent, TerminalStatus};
