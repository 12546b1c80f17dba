// src/mcp/transport.rs
// Stdio and SSE transport variants (§4.10). Each transport's job is purely
// framing: write one outbound JSON-RPC object, and forward every inbound one
// onto a channel. Request/response correlation lives in `mcp::McpClient`.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, warn};
use url::Url;

use crate::error::McpError;
use crate::mcp::protocol::JsonRpcMessage;

#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn send(&self, value: &Value) -> Result<(), McpError>;
    fn is_connected(&self) -> bool;
}

/// Spawns a subprocess; sends by writing one UTF-8 JSON line to stdin,
/// receives by reading complete lines from stdout. Stderr is drained in the
/// background and logged, never used for protocol purposes.
pub struct StdioTransport {
    child: Mutex<Child>,
    stdin: Mutex<tokio::process::ChildStdin>,
}

impl StdioTransport {
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &std::collections::HashMap<String, String>,
    ) -> Result<(Arc<Self>, mpsc::Receiver<JsonRpcMessage>), McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::Transport(e.to_string()))?;

        let stdout = child.stdout.take().ok_or_else(|| McpError::Transport("no stdout".into()))?;
        let stderr = child.stderr.take().ok_or_else(|| McpError::Transport("no stderr".into()))?;
        let stdin = child.stdin.take().ok_or_else(|| McpError::Transport("no stdin".into()))?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(read_stdout_loop(stdout, tx));
        tokio::spawn(drain_stderr_loop(stderr));

        let transport = Arc::new(Self { child: Mutex::new(child), stdin: Mutex::new(stdin) });
        Ok((transport, rx))
    }

    pub async fn kill(&self) {
        let _ = self.child.lock().await.kill().await;
    }
}

async fn read_stdout_loop(stdout: tokio::process::ChildStdout, tx: mpsc::Sender<JsonRpcMessage>) {
    let mut lines = LinesStream::new(BufReader::new(stdout).lines());
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "error reading MCP stdout");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JsonRpcMessage>(&line) {
            Ok(msg) => {
                if tx.send(msg).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!(error = %e, line, "failed to parse MCP stdout line as JSON-RPC"),
        }
    }
}

async fn drain_stderr_loop(stderr: tokio::process::ChildStderr) {
    let mut lines = LinesStream::new(BufReader::new(stderr).lines());
    while let Some(Ok(line)) = lines.next().await {
        debug!(target: "mcp::stderr", "{line}");
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send(&self, value: &Value) -> Result<(), McpError> {
        let mut line = serde_json::to_string(value).map_err(|e| McpError::Transport(e.to_string()))?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await.map_err(|e| McpError::Transport(e.to_string()))?;
        stdin.flush().await.map_err(|e| McpError::Transport(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// Opens a long-lived GET to `url` and parses Server-Sent-Events: `event: X`
/// / `data: Y` lines accumulate until a blank line flushes one event. The
/// distinguished `event: endpoint` gives the outbound POST URL (relative
/// URLs resolve against `url`); `event: message` carries a JSON-RPC payload.
pub struct SseTransport {
    client: reqwest::Client,
    endpoint: Mutex<Option<Url>>,
}

impl SseTransport {
    pub async fn connect(url: &str) -> Result<(Arc<Self>, mpsc::Receiver<JsonRpcMessage>), McpError> {
        let client = reqwest::Client::new();
        let stream_url = Url::parse(url).map_err(|e| McpError::Transport(e.to_string()))?;

        let response = client
            .get(stream_url.clone())
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(McpError::Transport(format!("SSE GET returned {}", response.status())));
        }

        let transport = Arc::new(Self { client, endpoint: Mutex::new(None) });
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(read_sse_loop(response, stream_url, transport.clone(), tx));

        Ok((transport, rx))
    }
}

async fn read_sse_loop(
    response: reqwest::Response,
    stream_url: Url,
    transport: Arc<SseTransport>,
    tx: mpsc::Sender<JsonRpcMessage>,
) {
    use futures::StreamExt;

    let mut byte_stream = response.bytes_stream();
    let mut buf = String::new();
    let mut event_name: Option<String> = None;
    let mut data_buf = String::new();

    while let Some(chunk) = byte_stream.next().await {
        let Ok(bytes) = chunk else { return };
        buf.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(pos) = buf.find('\n') {
            let line = buf[..pos].trim_end_matches('\r').to_string();
            buf = buf[pos + 1..].to_string();

            if line.is_empty() {
                flush_sse_event(&event_name, &data_buf, &stream_url, &transport, &tx).await;
                event_name = None;
                data_buf.clear();
                continue;
            }

            if let Some(name) = line.strip_prefix("event:") {
                event_name = Some(name.trim().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                if !data_buf.is_empty() {
                    data_buf.push('\n');
                }
                data_buf.push_str(data.trim_start());
            }
        }
    }
}

async fn flush_sse_event(
    event_name: &Option<String>,
    data: &str,
    stream_url: &Url,
    transport: &SseTransport,
    tx: &mpsc::Sender<JsonRpcMessage>,
) {
    if data.is_empty() {
        return;
    }
    match event_name.as_deref() {
        Some("endpoint") => {
            let resolved = stream_url.join(data).unwrap_or_else(|_| stream_url.clone());
            *transport.endpoint.lock().await = Some(resolved);
        }
        Some("message") | None => match serde_json::from_str::<JsonRpcMessage>(data) {
            Ok(msg) => {
                let _ = tx.send(msg).await;
            }
            Err(e) => warn!(error = %e, "failed to parse MCP SSE message event"),
        },
        Some(other) => debug!(event = other, "ignoring unrecognised MCP SSE event type"),
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn send(&self, value: &Value) -> Result<(), McpError> {
        let endpoint = self
            .endpoint
            .lock()
            .await
            .clone()
            .ok_or_else(|| McpError::Transport("no endpoint event received yet".into()))?;

        let response = self
            .client
            .post(endpoint)
            .json(value)
            .send()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(McpError::Transport(format!("MCP POST returned {}", response.status())));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}
