// ABOUTME: The step-bounded tool loop: call the model, run requested tools, feed results back, repeat.
// ABOUTME: Tool failures are returned to the model as error results instead of aborting the run.

use serde_json::json;

use crate::model::{CompletionRequest, ModelClient, ModelError, PromptMessage, ToolCall, Usage};
use crate::tools::{ToolError, ToolSet};

/// Final text of a tool loop plus what it cost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOutput {
    pub text: String,
    pub steps: u32,
    pub usage: Usage,
}

/// Run `request` against `client`, executing tool calls from `tools` for at
/// most `max_steps` model calls. When the budget runs out while the model is
/// still calling tools, whatever text the last step produced is returned.
pub async fn generate_text(
    client: &dyn ModelClient,
    mut request: CompletionRequest,
    tools: &ToolSet,
    max_steps: u32,
) -> Result<GenerateOutput, ModelError> {
    let max_steps = max_steps.max(1);
    request.tools = tools.specs();

    let mut output = GenerateOutput::default();

    loop {
        let completion = client.complete(&request).await?;
        output.steps += 1;
        output.usage += completion.usage;
        output.text = completion.text.clone();

        if completion.tool_calls.is_empty() || output.steps >= max_steps {
            if !completion.tool_calls.is_empty() {
                tracing::debug!(
                    steps = output.steps,
                    "step budget exhausted with pending tool calls"
                );
            }
            return Ok(output);
        }

        let calls = completion.tool_calls;
        request.messages.push(PromptMessage::Assistant {
            text: completion.text,
            tool_calls: calls.clone(),
        });

        for call in &calls {
            request.messages.push(run_tool_call(tools, call).await);
        }
    }
}

async fn run_tool_call(tools: &ToolSet, call: &ToolCall) -> PromptMessage {
    let result = match tools.function(&call.name) {
        Some(tool) => tool.call(call.arguments.clone()).await,
        None => Err(ToolError::Unknown(call.name.clone())),
    };

    let (content, is_error) = match result {
        Ok(value) => (value, false),
        Err(e) => {
            tracing::debug!(tool = %call.name, error = %e, "tool call failed");
            (json!({ "error": e.to_string() }), true)
        }
    };

    PromptMessage::ToolResult {
        call_id: call.id.clone(),
        name: call.name.clone(),
        content,
        is_error,
    }
}
