// src/mcp/mod.rs
// MCP client orchestration (C7): handshake, request/response correlation,
// and wiring discovered remote tools into the local `ToolRegistry`.

pub mod protocol;
pub mod transport;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

use crate::error::McpError;
use crate::message::{ToolContext, ToolResult};
use crate::tools::ToolHandler;
use protocol::{CallToolResult, JsonRpcMessage, JsonRpcRequest, McpCapabilities, McpTool, JSONRPC_VERSION, MCP_PROTOCOL_VERSION};
use transport::{McpTransport, SseTransport, StdioTransport};

/// One entry of `mcp_config.json`'s `mcpServers` map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum McpServerConfig {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Sse {
        url: String,
    },
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct McpConfigFile {
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

/// Loads `mcp_config.json` at `workspace_root`; a missing file means zero
/// servers, not an error (§4.10).
pub async fn load_config(workspace_root: &Path) -> anyhow::Result<McpConfigFile> {
    let path = workspace_root.join("mcp_config.json");
    match tokio::fs::read_to_string(&path).await {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(McpConfigFile::default()),
        Err(e) => Err(e.into()),
    }
}

type PendingTable = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, McpError>>>>>;

/// How long a request waits for a response before the server is considered
/// stalled (§4.10): without this, a server that never replies hangs the
/// caller forever instead of surfacing an in-band error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One live connection to an MCP server: transport + correlation table +
/// id counter. The receive loop resolves pending requests as responses
/// arrive and drops server-initiated requests/notifications (§4.10).
pub struct McpClient {
    name: String,
    transport: Arc<dyn McpTransport>,
    pending: PendingTable,
    next_id: AtomicI64,
}

impl McpClient {
    pub async fn connect(name: String, config: &McpServerConfig) -> Result<Self, McpError> {
        let (transport, mut rx): (Arc<dyn McpTransport>, _) = match config {
            McpServerConfig::Stdio { command, args, env } => {
                let (t, rx) = StdioTransport::spawn(command, args, env).await?;
                (t, rx)
            }
            McpServerConfig::Sse { url } => {
                let (t, rx) = SseTransport::connect(url).await?;
                (t, rx)
            }
        };

        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let pending_for_loop = pending.clone();
        let server_name = name.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                handle_inbound(&server_name, msg, &pending_for_loop).await;
            }
        });

        Ok(Self { name, transport, pending, next_id: AtomicI64::new(1) })
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let req = JsonRpcRequest::new(id, method, params);
        let value = serde_json::to_value(&req).map_err(|e| McpError::Transport(e.to_string()))?;
        if let Err(e) = self.transport.send(&value).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(McpError::ChannelClosed(id)),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::Timeout(id))
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notification = JsonRpcRequest::notification(method, params);
        let value = serde_json::to_value(&notification).map_err(|e| McpError::Transport(e.to_string()))?;
        self.transport.send(&value).await
    }

    /// Handshake (§4.10): initialize → notifications/initialized → tools/list.
    /// Returns the discovered tools for the caller to register.
    pub async fn handshake(&self) -> Result<Vec<McpTool>, McpError> {
        let init_params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "clientInfo": { "name": "agentcore", "version": env!("CARGO_PKG_VERSION") },
            "capabilities": {},
        });
        let response = self.request("initialize", Some(init_params)).await?;
        let capabilities: McpCapabilities =
            serde_json::from_value(response.get("capabilities").cloned().unwrap_or(Value::Null)).unwrap_or_default();
        info!(server = %self.name, ?capabilities, "MCP handshake complete");

        self.notify("notifications/initialized", None).await?;

        let tools_response = self.request("tools/list", None).await?;
        let tools: Vec<McpTool> = serde_json::from_value(tools_response.get("tools").cloned().unwrap_or(Value::Array(vec![])))
            .map_err(|e| McpError::Handshake(e.to_string()))?;
        Ok(tools)
    }

    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let params = json!({ "name": tool_name, "arguments": arguments });
        let response = self.request("tools/call", Some(params)).await?;
        serde_json::from_value(response).map_err(|e| McpError::Handshake(e.to_string()))
    }
}

async fn handle_inbound(server_name: &str, msg: JsonRpcMessage, pending: &PendingTable) {
    if msg.is_response() {
        let Some(id) = msg.id else { return };
        if let Some(tx) = pending.lock().await.remove(&id) {
            let result = if let Some(error) = msg.error {
                Err(McpError::Rpc { code: error.code, message: error.message })
            } else {
                Ok(msg.result.unwrap_or(Value::Null))
            };
            let _ = tx.send(result);
        }
        return;
    }

    if msg.is_notification() {
        return;
    }

    // Server-initiated request with its own id: out of scope, dropped.
    warn!(server = server_name, method = ?msg.method, "ignoring server-initiated MCP request");
}

/// Shapes a remote tool's `tools/call` result into the local `ToolResult`
/// envelope, joining text content and emitting placeholders for non-text
/// items (§4.10).
struct McpToolInvoker {
    client: Arc<McpClient>,
    remote_name: String,
}

#[async_trait]
impl ToolHandler for McpToolInvoker {
    async fn call(&self, _ctx: &ToolContext, args: Value) -> anyhow::Result<ToolResult> {
        let result = self.client.call_tool(&self.remote_name, args).await?;

        let mut parts = Vec::new();
        for item in &result.content {
            match item.content_type.as_str() {
                "text" => parts.push(item.text.clone().unwrap_or_default()),
                "image" => parts.push("[image content omitted]".to_string()),
                "resource" => parts.push("[resource content omitted]".to_string()),
                other => parts.push(format!("[unsupported content type: {other}]")),
            }
        }
        let output = parts.join("\n");

        Ok(if result.is_error { ToolResult::err(output) } else { ToolResult::ok(output) })
    }
}

/// Owns every configured server's `McpClient` and keeps them alive for the
/// process lifetime; `connect_all` wires discovered tools into `registry`.
pub struct McpManager {
    clients: Vec<Arc<McpClient>>,
}

impl McpManager {
    pub async fn connect_all(
        workspace_root: &Path,
        registry: &crate::tools::ToolRegistry,
    ) -> anyhow::Result<Self> {
        let config = load_config(workspace_root).await?;
        let mut clients = Vec::new();

        for (server_name, server_config) in config.mcp_servers {
            match McpClient::connect(server_name.clone(), &server_config).await {
                Ok(client) => {
                    let client = Arc::new(client);
                    match client.handshake().await {
                        Ok(tools) => {
                            for tool in tools {
                                let schema = tool.to_openai_format(&server_name);
                                let qualified = format!("mcp__{server_name}__{}", tool.name);
                                let invoker = Arc::new(McpToolInvoker { client: client.clone(), remote_name: tool.name.clone() });
                                registry.register_external(qualified, schema, invoker).await;
                            }
                        }
                        Err(e) => warn!(server = %server_name, error = %e, "MCP handshake failed, skipping server"),
                    }
                    clients.push(client);
                }
                Err(e) => warn!(server = %server_name, error = %e, "failed to connect to MCP server, skipping"),
            }
        }

        Ok(Self { clients })
    }

    pub fn server_count(&self) -> usize {
        self.clients.len()
    }

    /// Used when `mcp_config.json` itself could not be read/parsed: the
    /// runtime still starts, just without any MCP-backed tools.
    pub fn empty() -> Self {
        Self { clients: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_parses_as_no_servers() {
        let default = McpConfigFile::default();
        assert!(default.mcp_servers.is_empty());
    }

    #[test]
    fn stdio_server_config_parses_from_json() {
        let raw = json!({
            "mcpServers": {
                "demo": { "command": "demo-server", "args": ["--flag"] }
            }
        });
        let config: McpConfigFile = serde_json::from_value(raw).unwrap();
        assert!(matches!(config.mcp_servers.get("demo"), Some(McpServerConfig::Stdio { command, .. }) if command == "demo-server"));
    }

    #[test]
    fn sse_server_config_parses_from_json() {
        let raw = json!({
            "mcpServers": {
                "remote": { "url": "https://example.com/sse" }
            }
        });
        let config: McpConfigFile = serde_json::from_value(raw).unwrap();
        assert!(matches!(config.mcp_servers.get("remote"), Some(McpServerConfig::Sse { url }) if url == "https://example.com/sse"));
    }

    #[tokio::test]
    async fn missing_mcp_config_file_yields_zero_servers() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(dir.path()).await.unwrap();
        assert!(config.mcp_servers.is_empty());
    }

    #[test]
    fn jsonrpc_constants_match_protocol_version() {
        assert_eq!(JSONRPC_VERSION, "2.0");
        assert_eq!(MCP_PROTOCOL_VERSION, "2024-11-05");
    }
}
