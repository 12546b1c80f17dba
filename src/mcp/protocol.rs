// src/mcp/protocol.rs
// JSON-RPC 2.0 protocol types for MCP communication (§4.10).

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id: Some(id), method: method.into(), params }
    }

    /// A notification: like a request but without `id`, no response expected.
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id: None, method: method.into(), params }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An inbound JSON-RPC object. It may be a response (has `id` and `result`
/// or `error`) or a server-initiated request/notification (has `method`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcMessage {
    pub fn is_response(&self) -> bool {
        self.method.is_none() && self.id.is_some()
    }

    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpCapabilities {
    #[serde(default)]
    pub tools: Option<ToolCapabilities>,
    #[serde(default)]
    pub resources: Option<Value>,
    #[serde(default)]
    pub prompts: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolCapabilities {
    #[serde(default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

impl McpTool {
    /// Converts to the OpenAI-compatible tool format shown to the LLM,
    /// namespacing the tool name by the owning MCP server.
    pub fn to_openai_format(&self, server_name: &str) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": format!("mcp__{server_name}__{}", self.name),
                "description": self.description.clone().unwrap_or_else(|| format!("MCP tool: {}", self.name)),
                "parameters": self.input_schema.clone().unwrap_or_else(|| serde_json::json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                })),
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ToolResultContent>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_monotonic_id() {
        let req = JsonRpcRequest::new(1, "tools/list", None);
        assert_eq!(req.id, Some(1));
        assert_eq!(req.jsonrpc, "2.0");
    }

    #[test]
    fn notification_has_no_id() {
        let n = JsonRpcRequest::notification("notifications/initialized", None);
        assert!(n.id.is_none());
    }

    #[test]
    fn tool_to_openai_format_namespaces_name() {
        let tool = McpTool { name: "mock_echo".into(), description: Some("echoes".into()), input_schema: None };
        let v = tool.to_openai_format("demo");
        assert_eq!(v["function"]["name"], "mcp__demo__mock_echo");
    }

    #[test]
    fn classifies_response_vs_notification() {
        let response = JsonRpcMessage {
            jsonrpc: "2.0".into(),
            id: Some(1),
            method: None,
            params: None,
            result: Some(Value::Bool(true)),
            error: None,
        };
        assert!(response.is_response());

        let notif = JsonRpcMessage {
            jsonrpc: "2.0".into(),
            id: None,
            method: Some("notify".into()),
            params: None,
            result: None,
            error: None,
        };
        assert!(notif.is_notification());
    }
}
