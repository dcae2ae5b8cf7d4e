// ABOUTME: Agent system for huddle: model adapters, tools, and the @mention orchestration pipeline.
// ABOUTME: Runs one isolated completion per mentioned agent, then streams the primary assistant turn.

pub mod client;
pub mod executor;
pub mod generate;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod sink;
pub mod sse;
pub mod streamer;
pub mod testing;
pub mod tools;
pub mod turn;

pub use client::{RoutingClient, create_model_client};
pub use executor::{AgentRunExecutor, AgentRunInput, AgentRunOutput, ExecutorError};
pub use generate::{GenerateOutput, generate_text};
pub use model::{
    ChunkStream, Completion, CompletionRequest, ModelClient, ModelError, PromptMessage,
    StreamChunk, ToolCall, Usage,
};
pub use orchestrator::{MentionOrchestrator, OrchestratorOutcome};
pub use prompts::RequestHints;
pub use providers::{ModelNamespace, NamespaceOptions, ProviderOptions, split_model_id};
pub use sink::{EventSink, SinkClosed};
pub use streamer::PrimaryTurnStreamer;
pub use tools::{Tool, ToolContext, ToolError, ToolGateway, ToolSet, ToolSpec, build_tool_set};
pub use turn::{StartedTurn, TurnContext, TurnInput, TurnRunner};
