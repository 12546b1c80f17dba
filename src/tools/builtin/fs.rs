// src/tools/builtin/fs.rs

use async_trait::async_trait;
use serde_json::Value;

use crate::message::{ToolContext, ToolResult};
use crate::path_guard;
use crate::tools::ToolHandler;

pub struct ListFiles;

#[async_trait]
impl ToolHandler for ListFiles {
    async fn call(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<ToolResult> {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::err("Error executing list_files: missing \"path\""));
        };
        let recursive = args.get("recursive").and_then(|v| v.as_bool()).unwrap_or(false);

        let resolved = match path_guard::resolve(path, &ctx.workspace_root) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::err(format!("Error executing list_files: {e}"))),
        };

        let entries = if recursive { collect_entries_recursive(&resolved)? } else { collect_entries_flat(&resolved)? };
        Ok(ToolResult::ok(entries.join("\n")))
    }
}

fn collect_entries_flat(dir: &std::path::Path) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_dir() {
            out.push(format!("{name}/"));
        } else {
            out.push(name);
        }
    }
    out.sort();
    Ok(out)
}

fn collect_entries_recursive(dir: &std::path::Path) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).into_iter() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path()).display().to_string();
        if entry.file_type().is_dir() {
            out.push(format!("{relative}/"));
        } else {
            out.push(relative);
        }
    }
    out.sort();
    Ok(out)
}

pub struct ReadFile;

#[async_trait]
impl ToolHandler for ReadFile {
    async fn call(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<ToolResult> {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::err("Error executing read_file: missing \"path\""));
        };

        let resolved = match path_guard::resolve(path, &ctx.workspace_root) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::err(format!("Error executing read_file: {e}"))),
        };

        let bytes = match tokio::fs::read(&resolved).await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::err(format!("Error executing read_file: {e}"))),
        };

        if bytes.contains(&0) {
            return Ok(ToolResult::err("Error executing read_file: refusing to read binary content"));
        }

        match String::from_utf8(bytes) {
            Ok(text) => Ok(ToolResult::ok(text)),
            Err(_) => Ok(ToolResult::err("Error executing read_file: file is not valid UTF-8")),
        }
    }
}

pub struct WriteFile;

#[async_trait]
impl ToolHandler for WriteFile {
    async fn call(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<ToolResult> {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::err("Error executing write_file: missing \"path\""));
        };
        let Some(content) = args.get("content").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::err("Error executing write_file: missing \"content\""));
        };

        let resolved = match path_guard::resolve(path, &ctx.workspace_root) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::err(format!("Error executing write_file: {e}"))),
        };

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content).await?;

        Ok(ToolResult::ok(format!("Wrote {} bytes to {path}", content.len())))
    }
}
