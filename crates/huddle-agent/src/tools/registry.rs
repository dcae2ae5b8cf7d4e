// ABOUTME: Builds the per-run ToolSet from the caller's context: base tools plus conditional ones.
// ABOUTME: Tool definitions are provider-agnostic JSON schemas backed by the tool gateway.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::providers::ModelNamespace;

use super::gateway::{GatewayTool, ToolGateway};
use super::{RegisteredTool, ToolSet, ToolSpec};

pub const KNOWLEDGE_BASE_SEARCH: &str = "knowledge_base_search";
pub const FETCH_FILE_CONTENTS: &str = "fetch_file_contents";
pub const READ_DEEP_TRANSCRIPT: &str = "read_deep_transcript";

/// Who a run is for and what it may reach.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolContext {
    pub user_id: String,
    pub chat_id: String,
    pub vector_store_id: Option<String>,
    pub namespace: ModelNamespace,
    pub allow_deep_transcript: bool,
}

impl ToolContext {
    /// The context object forwarded to the gateway with every call.
    fn gateway_context(&self) -> Value {
        json!({
            "userId": self.user_id,
            "chatId": self.chat_id,
            "vectorStoreId": self.vector_store_id,
        })
    }
}

/// Build a fresh tool set for one run.
///
/// The base tools are always present. `knowledge_base_search` is added only
/// when a knowledge store is linked and the provider can search it natively;
/// `fetch_file_contents` is added (pinned) whenever a store is linked; the
/// deep transcript reader requires the privilege flag.
pub fn build_tool_set(context: &ToolContext, gateway: Arc<ToolGateway>) -> ToolSet {
    let gateway_context = context.gateway_context();
    let mut set = ToolSet::new();

    let add = |set: &mut ToolSet, definition: Value, pinned: bool| {
        let tool = gateway_tool(&definition, Arc::clone(&gateway), gateway_context.clone());
        set.insert(RegisteredTool::Function(Arc::new(tool)), pinned);
    };

    for definition in base_tool_definitions() {
        add(&mut set, definition, false);
    }

    if let Some(store_id) = &context.vector_store_id {
        if context.namespace.supports_native_file_search() {
            set.insert(
                RegisteredTool::Native(knowledge_base_search(context.namespace, store_id)),
                false,
            );
        }
        add(&mut set, fetch_file_contents(), true);
    }

    if context.allow_deep_transcript {
        add(&mut set, read_deep_transcript(), false);
    }

    set
}

fn gateway_tool(definition: &Value, gateway: Arc<ToolGateway>, context: Value) -> GatewayTool {
    GatewayTool::new(
        definition["name"].as_str().unwrap_or_default(),
        definition["description"].as_str().unwrap_or_default(),
        definition["parameters"].clone(),
        gateway,
        context,
    )
}

pub fn base_tool_definitions() -> Vec<Value> {
    vec![
        search_web(),
        search_messages(),
        send_message(),
        list_calendar_events(),
        search_mail(),
    ]
}

/// Tool: search the public web.
fn search_web() -> Value {
    json!({
        "name": "search_web",
        "description": "Search the web for current information. Returns titles, URLs, and snippets.",
        "parameters": {
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query."
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return. Defaults to 5."
                }
            },
            "required": ["query"]
        }
    })
}

/// Tool: search the team messaging workspace.
fn search_messages() -> Value {
    json!({
        "name": "search_messages",
        "description": "Search messages in the team messaging workspace the user has connected.",
        "parameters": {
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to search for."
                },
                "channel": {
                    "type": "string",
                    "description": "Optional channel name to restrict the search to."
                }
            },
            "required": ["query"]
        }
    })
}

/// Tool: post a message to the messaging workspace on the user's behalf.
fn send_message() -> Value {
    json!({
        "name": "send_message",
        "description": "Send a message to a channel or person in the connected messaging workspace.",
        "parameters": {
            "type": "object",
            "properties": {
                "to": {
                    "type": "string",
                    "description": "Channel name or user handle."
                },
                "text": {
                    "type": "string",
                    "description": "Message text."
                }
            },
            "required": ["to", "text"]
        }
    })
}

fn list_calendar_events() -> Value {
    json!({
        "name": "list_calendar_events",
        "description": "List events from the user's calendar within a time range.",
        "parameters": {
            "type": "object",
            "properties": {
                "start": {
                    "type": "string",
                    "description": "Range start as an RFC 3339 timestamp."
                },
                "end": {
                    "type": "string",
                    "description": "Range end as an RFC 3339 timestamp."
                }
            },
            "required": ["start", "end"]
        }
    })
}

fn search_mail() -> Value {
    json!({
        "name": "search_mail",
        "description": "Search the user's mailbox. Returns sender, subject, date, and a snippet per match.",
        "parameters": {
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Mail search query."
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of messages to return. Defaults to 10."
                }
            },
            "required": ["query"]
        }
    })
}

fn fetch_file_contents() -> Value {
    json!({
        "name": FETCH_FILE_CONTENTS,
        "description": "Fetch the full text of a file from the agent's knowledge files by id.",
        "parameters": {
            "type": "object",
            "properties": {
                "file_id": {
                    "type": "string",
                    "description": "Id of the knowledge file, as listed in the instructions."
                }
            },
            "required": ["file_id"]
        }
    })
}

fn read_deep_transcript() -> Value {
    json!({
        "name": READ_DEEP_TRANSCRIPT,
        "description": "Read the complete stored transcript of the current chat, including earlier turns not shown in context.",
        "parameters": {
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of messages to return, newest first."
                }
            }
        }
    })
}

/// Native knowledge-store search, executed by the provider.
fn knowledge_base_search(namespace: ModelNamespace, store_id: &str) -> ToolSpec {
    ToolSpec::Native {
        namespace,
        name: KNOWLEDGE_BASE_SEARCH.to_string(),
        config: json!({
            "type": "file_search",
            "vector_store_ids": [store_id],
        }),
    }
}
