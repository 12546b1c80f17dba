// src/message.rs
// The conversation data model (§3): a tagged sum over {System, User,
// Assistant, Tool} instead of the vendor's open-ended role/field mix.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

/// One entry in a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User { content: content.into() }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool { call_id: call_id.into(), content: content.into() }
    }

    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match self {
            Message::Assistant { tool_calls: Some(calls), .. } => Some(calls),
            _ => None,
        }
    }
}

/// One assistant tool-call request: a unique `call_id`, a tool name, and a
/// raw (not-yet-parsed) JSON argument blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Status of one node in the todo rose-tree carried on `ToolContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub title: String,
    pub status: TodoStatus,
    #[serde(default)]
    pub subtasks: Vec<TodoItem>,
}

/// Which environment a tool call is running in, threaded through for tools
/// that behave differently in a CLI vs. a web session (e.g. interactive
/// prompts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentTag {
    Cli,
    Web,
}

/// Opaque handle to a launched browser session. The concrete automation
/// backend is out of scope for this crate (§1); this is the seam a real
/// deployment plugs into.
pub trait BrowserSession: Send + Sync {
    fn is_open(&self) -> bool;
}

/// Lazily-loaded skill metadata + content cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMeta {
    pub name: String,
    pub description: String,
    pub path: String,
}

#[derive(Default)]
pub struct SkillCatalogue {
    metas: HashMap<String, SkillMeta>,
    content_cache: RwLock<HashMap<String, String>>,
}

impl SkillCatalogue {
    pub fn new(metas: Vec<SkillMeta>) -> Self {
        Self {
            metas: metas.into_iter().map(|m| (m.name.clone(), m)).collect(),
            content_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn summaries(&self) -> Vec<(String, String)> {
        self.metas
            .values()
            .map(|m| (m.name.clone(), m.description.clone()))
            .collect()
    }

    /// Loads a skill's content on first request and caches it thereafter.
    pub async fn content(&self, name: &str) -> anyhow::Result<Option<String>> {
        let Some(meta) = self.metas.get(name) else {
            return Ok(None);
        };
        if let Some(cached) = self.content_cache.read().await.get(name) {
            return Ok(Some(cached.clone()));
        }
        let content = tokio::fs::read_to_string(&meta.path).await?;
        self.content_cache
            .write()
            .await
            .insert(name.to_string(), content.clone());
        Ok(Some(content))
    }
}

/// The per-runtime value passed to every tool handler (§3).
pub struct ToolContext {
    pub workspace_root: std::path::PathBuf,
    pub todos: RwLock<Vec<TodoItem>>,
    pub mode: RwLock<String>,
    pub browser: RwLock<Option<Arc<dyn BrowserSession>>>,
    pub skills: Arc<SkillCatalogue>,
    pub environment: EnvironmentTag,
}

impl ToolContext {
    pub fn new(
        workspace_root: std::path::PathBuf,
        skills: Arc<SkillCatalogue>,
        environment: EnvironmentTag,
    ) -> Self {
        Self {
            workspace_root,
            todos: RwLock::new(Vec::new()),
            mode: RwLock::new("default".to_string()),
            browser: RwLock::new(None),
            skills,
            environment,
        }
    }
}

/// The outcome of one tool invocation (§3). `data` may carry a control
/// signal such as `{action: "ask_user", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { success: true, output: output.into(), data: None }
    }

    pub fn ok_with_data(output: impl Into<String>, data: Value) -> Self {
        Self { success: true, output: output.into(), data: Some(data) }
    }

    pub fn err(output: impl Into<String>) -> Self {
        Self { success: false, output: output.into(), data: None }
    }

    /// `true` if `data` carries `{action: "ask_user", ...}` (§3, §4.6).
    pub fn is_ask_user(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.get("action"))
            .and_then(|a| a.as_str())
            == Some("ask_user")
    }
}

/// The distinguished tool name whose success ends a turn regardless of any
/// further planned tool calls (Glossary).
pub const COMPLETION_TOOL: &str = "attempt_completion";
