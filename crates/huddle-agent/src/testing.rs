// ABOUTME: Test utilities for huddle-agent: stub and failing model clients, a recording sink, an echo tool.
// ABOUTME: Used to drive the orchestrator and streamer without real API calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use huddle_core::TurnEvent;

use crate::model::{
    ChunkStream, Completion, CompletionRequest, ModelClient, ModelError, StreamChunk, Usage,
};
use crate::sink::{EventSink, SinkClosed};
use crate::tools::{Tool, ToolError};

const STUB_USAGE: Usage = Usage {
    input_tokens: 10,
    output_tokens: 5,
};

/// A model client that returns scripted completions and records every
/// request it receives.
///
/// Scripted responses are consumed in order; once they run out the client
/// keeps returning the fallback text.
pub struct StubModelClient {
    fallback: String,
    responses: Mutex<VecDeque<Completion>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl StubModelClient {
    /// A stub that always answers with `text`.
    pub fn new(text: &str) -> Self {
        Self {
            fallback: text.to_owned(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A stub that plays back `responses` in order, then answers with empty text.
    pub fn with_responses(responses: Vec<Completion>) -> Self {
        Self {
            fallback: String::new(),
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next(&self, request: &CompletionRequest) -> Completion {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Completion {
                text: self.fallback.clone(),
                tool_calls: Vec::new(),
                usage: STUB_USAGE,
            })
    }
}

#[async_trait]
impl ModelClient for StubModelClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError> {
        Ok(self.next(request))
    }

    /// Streams the text word by word so consumers see several deltas.
    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ModelError> {
        let completion = self.next(request);
        let mut chunks: Vec<Result<StreamChunk, ModelError>> = completion
            .text
            .split_inclusive(' ')
            .map(|word| Ok(StreamChunk::TextDelta(word.to_owned())))
            .collect();
        chunks.push(Ok(StreamChunk::Usage(completion.usage)));
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn provider_name(&self) -> &str {
        "stub"
    }
}

/// A model client whose every call fails with a provider error.
#[derive(Debug, Clone)]
pub struct FailingModelClient {
    message: String,
}

impl FailingModelClient {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
        }
    }
}

#[async_trait]
impl ModelClient for FailingModelClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, ModelError> {
        Err(ModelError::Provider(self.message.clone()))
    }

    async fn stream(&self, _request: &CompletionRequest) -> Result<ChunkStream, ModelError> {
        Err(ModelError::Provider(self.message.clone()))
    }

    fn provider_name(&self) -> &str {
        "failing"
    }
}

/// An event sink that keeps everything it is given. A closed sink rejects
/// every event, like a disconnected client.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TurnEvent>>,
    closed: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closed() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            closed: true,
        }
    }

    pub fn events(&self) -> Vec<TurnEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Event names in emission order, e.g. `["data-agent-status", "start"]`.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(TurnEvent::name).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: TurnEvent) -> Result<(), SinkClosed> {
        if self.closed {
            return Err(SinkClosed);
        }
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }
}

/// A tool that echoes its arguments back, or always fails.
pub struct EchoTool {
    name: String,
    fail: bool,
}

impl EchoTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            fail: false,
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            fail: true,
        }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Echoes its arguments."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        if self.fail {
            return Err(ToolError::Failed {
                status: 500,
                body: "echo failure".to_owned(),
            });
        }
        Ok(json!({ "tool": self.name, "echo": arguments }))
    }
}
