//! JSON-RPC 2.0 dispatcher for the MCP tool protocol
//!
//! Handles `initialize`, `notifications/initialized`, `tools/list`,
//! `tools/call` and `ping`. A body may be one message or a batch; messages
//! without an `id` are notifications and never produce output.
//!
//! Batch replies are asymmetric: nothing left -> empty reply, exactly one
//! response -> the bare object, otherwise an array in input order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use notifier::{Notifier, Outcome};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::metrics;

pub const TOOL_NAME: &str = "send_wechat_message";
pub const SERVER_NAME: &str = "pushplus-wechat";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Newest first; the first entry answers clients asking for anything else.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

const DEFAULT_TITLE: &str = "default notification";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;

/// What the transport should send back for one request body.
#[derive(Debug, PartialEq)]
pub enum Reply {
    /// Only notifications: respond 204 with no body.
    Empty,
    One(Value),
    Batch(Vec<Value>),
}

/// Protocol-level failure carried in a JSON-RPC `error` member.
#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Text result of running the tool once.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    fn from_outcome(outcome: &Outcome, title: &str, content: &str) -> Self {
        let text = match outcome {
            Outcome::Delivered => {
                format!("Message sent successfully!\nTitle: {title}\nContent: {content}")
            }
            Outcome::Rejected(reason) => format!("Failed to send: {reason}"),
            Outcome::TransportError(detail) => format!("Error sending message: {detail}"),
        };
        Self {
            text,
            is_error: !outcome.is_delivered(),
        }
    }

    /// `{"content":[{"type":"text","text":...}]}`, plus `isError` on failure.
    pub fn to_result(&self) -> Value {
        let mut result = json!({
            "content": [{"type": "text", "text": self.text}],
        });
        if self.is_error {
            result["isError"] = Value::Bool(true);
        }
        result
    }
}

/// Descriptor returned by `tools/list`.
pub fn tool_descriptor() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": "Send a message to WeChat through PushPlus",
        "inputSchema": {
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Message title",
                },
                "content": {
                    "type": "string",
                    "description": "Message body",
                },
            },
            "required": ["title", "content"],
        },
    })
}

#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    tool_calls: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, tool_calls: Arc<AtomicU64>) -> Self {
        Self {
            notifier,
            tool_calls,
        }
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Dispatch a parsed request body.
    pub async fn handle(&self, payload: Value) -> Reply {
        match payload {
            Value::Array(messages) => {
                let mut responses = Vec::with_capacity(messages.len());
                for message in &messages {
                    if let Some(response) = self.handle_message(message).await {
                        responses.push(response);
                    }
                }
                match responses.len() {
                    0 => Reply::Empty,
                    1 => Reply::One(responses.remove(0)),
                    _ => Reply::Batch(responses),
                }
            }
            message => match self.handle_message(&message).await {
                Some(response) => Reply::One(response),
                None => Reply::Empty,
            },
        }
    }

    async fn handle_message(&self, message: &Value) -> Option<Value> {
        let Some(object) = message.as_object() else {
            warn!("rejecting non-object JSON-RPC message");
            return Some(error_response(Value::Null, INVALID_REQUEST, "Invalid Request"));
        };

        // Only a missing `id` marks a notification; `"id": null` is a request.
        let id = object.get("id").cloned();
        let Some(method) = object.get("method").and_then(Value::as_str) else {
            warn!("rejecting JSON-RPC message without a method");
            return Some(error_response(
                id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "Invalid Request",
            ));
        };

        metrics::record_rpc_request(method);
        debug!(method, notification = id.is_none(), "dispatching");

        let empty = Map::new();
        let params = object
            .get("params")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let result = self.dispatch(method, params).await;

        let id = id?;
        Some(match result {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(e) => error_response(id, e.code, &e.message),
        })
    }

    async fn dispatch(&self, method: &str, params: &Map<String, Value>) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize(params)),
            "notifications/initialized" => Ok(Value::Null),
            "tools/list" => Ok(json!({"tools": [tool_descriptor()]})),
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or("");
                if name != TOOL_NAME {
                    warn!(tool = name, "unknown tool requested");
                    return Err(RpcError::new(METHOD_NOT_FOUND, format!("Unknown tool: {name}")));
                }
                let arguments = params.get("arguments").unwrap_or(&Value::Null);
                Ok(self.call_tool(arguments).await.to_result())
            }
            "ping" => Ok(json!({})),
            other => {
                debug!(method = other, "method not found");
                Err(RpcError::new(METHOD_NOT_FOUND, "Method not found"))
            }
        }
    }

    /// Run `send_wechat_message`. Delivery failures come back as output
    /// text, never as an error.
    pub async fn call_tool(&self, arguments: &Value) -> ToolOutput {
        let title = arguments
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TITLE);
        let content = arguments
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("");

        self.tool_calls.fetch_add(1, Ordering::Relaxed);
        let outcome = self.notifier.send_notification(title, content).await;
        metrics::record_tool_call(outcome.label());
        info!(
            notifier = self.notifier.id(),
            outcome = outcome.label(),
            "tool call finished"
        );

        ToolOutput::from_outcome(&outcome, title, content)
    }
}

fn initialize(params: &Map<String, Value>) -> Value {
    let requested = params.get("protocolVersion").and_then(Value::as_str);
    let version = requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

    json!({
        "protocolVersion": version,
        "capabilities": {"tools": {}},
        "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
    })
}

pub fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    })
}
