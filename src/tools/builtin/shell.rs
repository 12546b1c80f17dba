// src/tools/builtin/shell.rs

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::warn;

use crate::message::{ToolContext, ToolResult};
use crate::path_guard;
use crate::tools::ToolHandler;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

pub struct ExecuteCommand;

#[async_trait]
impl ToolHandler for ExecuteCommand {
    async fn call(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<ToolResult> {
        let Some(command) = args.get("command").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::err("Error executing execute_command: missing \"command\""));
        };

        let cwd = match args.get("cwd").and_then(|v| v.as_str()) {
            Some(rel) => match path_guard::resolve(rel, &ctx.workspace_root) {
                Ok(p) => p,
                Err(e) => return Ok(ToolResult::err(format!("Error executing execute_command: {e}"))),
            },
            None => ctx.workspace_root.clone(),
        };

        let timeout_secs = args
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(command).current_dir(&cwd).kill_on_drop(true);

        let run = cmd.output();
        let result = match tokio::time::timeout(Duration::from_secs(timeout_secs), run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Ok(ToolResult::err(format!("Error executing execute_command: {e}"))),
            Err(_) => {
                return Ok(ToolResult::err(format!(
                    "Error executing execute_command: timed out after {timeout_secs}s"
                )))
            }
        };

        let mut combined = String::from_utf8_lossy(&result.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&result.stderr));
        if combined.len() > MAX_OUTPUT_BYTES {
            warn!(len = combined.len(), "execute_command output truncated");
            combined.truncate(MAX_OUTPUT_BYTES);
            combined.push_str("\n...[truncated]");
        }

        if result.status.success() {
            Ok(ToolResult::ok(combined))
        } else {
            let code = result.status.code().unwrap_or(-1);
            Ok(ToolResult::err(format!("command exited with status {code}\n{combined}")))
        }
    }
}
