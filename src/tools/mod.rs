// src/tools/mod.rs
// Tool registry and dispatcher (C2).

pub mod builder;
pub mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::json_repair::robust_json_parse;
use crate::message::{ToolContext, ToolResult};

/// Handlers may be synchronous or suspendable; both end up behind this one
/// async signature, matching the teacher's preference for suspendable I/O
/// everywhere it's available (§5). Each tool in `tools::builtin` implements
/// this directly rather than via a closure, the way the teacher gives each
/// routed tool its own method.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<ToolResult>;
}

struct RegisteredTool {
    schema: Value,
    handler: Arc<dyn ToolHandler>,
}

/// `(schema, handler)` pairs keyed by name, behind one `RwLock<HashMap>` —
/// the same shape as the teacher's agent registry, generalized to tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, RegisteredTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: RwLock::new(HashMap::new()) }
    }

    /// Idempotent per name: registering the same tool twice with an
    /// identical schema is a no-op in observable behaviour (§8, property 7).
    pub async fn register(&self, name: impl Into<String>, schema: Value, handler: Arc<dyn ToolHandler>) {
        let name = name.into();
        let mut tools = self.tools.write().await;
        if let Some(existing) = tools.get(&name) {
            if existing.schema == schema {
                debug!(tool = %name, "tool already registered with identical schema, skipping");
                return;
            }
            warn!(tool = %name, "re-registering tool with a different schema");
        }
        tools.insert(name, RegisteredTool { schema, handler });
    }

    /// Used by the MCP client to plug in remote tools through the same
    /// interface as local ones (§9).
    pub async fn register_external(&self, name: impl Into<String>, schema: Value, invoker: Arc<dyn ToolHandler>) {
        self.register(name, schema, invoker).await;
    }

    /// The serialised schema list shown to the LLM.
    pub async fn catalogue(&self) -> Vec<Value> {
        self.tools.read().await.values().map(|t| t.schema.clone()).collect()
    }

    pub async fn has_tool(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// §4.2: parse → look up → validate against the registered JSON Schema →
    /// run, converging every failure into an in-band `ToolResult`. Schema
    /// validation happens here, once, rather than being left to each
    /// handler's own ad hoc field checks.
    pub async fn dispatch(&self, name: &str, raw_args_json: &str, ctx: &ToolContext) -> ToolResult {
        let args = match robust_json_parse(raw_args_json) {
            Ok(v) => v,
            Err(e) => return ToolResult::err(format!("Error executing {name}: invalid arguments ({e})")),
        };

        let (schema, handler) = {
            let tools = self.tools.read().await;
            match tools.get(name) {
                Some(t) => (t.schema.clone(), t.handler.clone()),
                None => return ToolResult::err(format!("Error: Tool {name} not found")),
            }
        };

        // Registered schemas are the OpenAI tool envelope
        // ({type, function: {parameters, ...}}); validate against the nested
        // parameters schema, falling back to the schema itself for a tool
        // registered with a bare JSON Schema.
        let parameters = schema.pointer("/function/parameters").unwrap_or(&schema);
        if let Err(e) = jsonschema::validate(parameters, &args) {
            return ToolResult::err(format!("Error executing {name}: arguments do not match schema ({e})"));
        }

        match handler.call(ctx, args).await {
            Ok(result) => result,
            Err(e) => ToolResult::err(format!("Error executing {name}: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{EnvironmentTag, SkillCatalogue};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, _ctx: &ToolContext, args: Value) -> anyhow::Result<ToolResult> {
            Ok(ToolResult::ok(args.to_string()))
        }
    }

    fn test_ctx(root: &std::path::Path) -> ToolContext {
        ToolContext::new(root.to_path_buf(), Arc::new(SkillCatalogue::default()), EnvironmentTag::Web)
    }

    #[tokio::test]
    async fn unknown_tool_is_in_band_error() {
        let registry = ToolRegistry::new();
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = test_ctx(dir.path());

        let result = registry.dispatch("nope", "{}", &ctx).await;
        assert!(!result.success);
        assert!(result.output.contains("Tool nope not found"));
    }

    #[tokio::test]
    async fn dispatch_repairs_truncated_arguments() {
        let registry = ToolRegistry::new();
        registry
            .register("echo", serde_json::json!({"type": "object"}), Arc::new(Echo))
            .await;
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = test_ctx(dir.path());

        let result = registry.dispatch("echo", r#"{"a":"b"#, &ctx).await;
        assert!(result.success);
        assert!(result.output.contains("\"a\":\"b\""));
    }

    #[tokio::test]
    async fn dispatch_rejects_arguments_that_fail_the_schema() {
        let registry = ToolRegistry::new();
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"],
        });
        registry.register("echo", schema, Arc::new(Echo)).await;
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = test_ctx(dir.path());

        let result = registry.dispatch("echo", "{}", &ctx).await;
        assert!(!result.success);
        assert!(result.output.contains("do not match schema"));
    }

    #[tokio::test]
    async fn re_registering_identical_schema_is_a_no_op() {
        let registry = ToolRegistry::new();
        let schema = serde_json::json!({"type": "object"});
        let calls = Arc::new(AtomicUsize::new(0));

        registry.register("echo", schema.clone(), Arc::new(Echo)).await;
        registry.register("echo", schema, Arc::new(Echo)).await;

        assert_eq!(registry.catalogue().await.len(), 1);
        let _ = calls.load(Ordering::Relaxed);
    }
}
