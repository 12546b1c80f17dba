// src/session/mod.rs
// Session manager (C8): per-(user, session) runtime instances; create,
// load, list, delete; the JSON file is always authoritative, the C14
// index (store.rs) is consulted first and repaired from a directory scan.

pub mod store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::context::ContextManager;
use crate::error::SessionError;
use crate::llm::LlmTransport;
use crate::mcp::McpManager;
use crate::message::{EnvironmentTag, SkillCatalogue, ToolContext};
use crate::runtime::Runtime;
use crate::tools::{builtin, ToolRegistry};
use store::SessionIndexStore;

lazy_static! {
    static ref SESSION_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_\-]{1,64}$").unwrap();
}

pub fn validate_session_id(session_id: &str) -> Result<(), SessionError> {
    if SESSION_ID_RE.is_match(session_id) {
        Ok(())
    } else {
        Err(SessionError::InvalidId(session_id.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub mtime: i64,
}

/// Per-(user,session) key into the in-process runtime map (Glossary "Runtime").
fn runtime_key(user_id: &str, session_id: &str) -> String {
    format!("{user_id}:{session_id}")
}

fn session_path(session_dir: &std::path::Path, user_id: &str, session_id: &str) -> PathBuf {
    session_dir.join(format!("{user_id}_session_{session_id}.json"))
}

pub struct SessionManager {
    session_dir: PathBuf,
    workspace_root: PathBuf,
    max_steps: usize,
    index: SessionIndexStore,
    runtimes: Mutex<HashMap<String, Arc<Runtime>>>,
    active_session: Mutex<HashMap<String, String>>,
}

impl SessionManager {
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.session_dir).await?;
        let index = SessionIndexStore::connect(&config.db_path).await?;
        Ok(Self {
            session_dir: config.session_dir.clone(),
            workspace_root: config.workspace_root.clone(),
            max_steps: config.max_steps,
            index,
            runtimes: Mutex::new(HashMap::new()),
            active_session: Mutex::new(HashMap::new()),
        })
    }

    async fn build_runtime(&self, user_id: &str, session_id: &str) -> anyhow::Result<Runtime> {
        let registry = Arc::new(ToolRegistry::new());
        builtin::register_all(&registry).await;

        let mcp = match McpManager::connect_all(&self.workspace_root, &registry).await {
            Ok(manager) => manager,
            Err(e) => {
                warn!(error = %e, "MCP manager startup failed, continuing with local tools only");
                McpManager::empty()
            }
        };

        let tool_context = Arc::new(ToolContext::new(
            self.workspace_root.clone(),
            Arc::new(SkillCatalogue::default()),
            EnvironmentTag::Web,
        ));

        let context = ContextManager::new(self.workspace_root.display().to_string(), tool_context.skills.summaries());
        let path = session_path(&self.session_dir, user_id, session_id);
        context.set_autosave_path(path.clone()).await;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            context.load(&path).await?;
        }

        let transport = Arc::new(LlmTransport::new(crate::config::CONFIG.llm.clone()));
        Ok(Runtime::new(context, registry, tool_context, transport, self.max_steps, mcp))
    }

    /// `get_or_create(user_id, session_id)` (§4.8): returns the cached
    /// runtime, or builds and caches a fresh one, loading the session file
    /// if it already exists on disk.
    pub async fn get_or_create(&self, user_id: &str, session_id: &str) -> anyhow::Result<Arc<Runtime>> {
        validate_session_id(session_id)?;
        let key = runtime_key(user_id, session_id);

        let mut runtimes = self.runtimes.lock().await;
        if let Some(existing) = runtimes.get(&key) {
            return Ok(existing.clone());
        }

        let runtime = Arc::new(self.build_runtime(user_id, session_id).await?);
        runtimes.insert(key, runtime.clone());
        Ok(runtime)
    }

    /// `new(user_id) → session_id` (§4.8): timestamped ID, fresh runtime,
    /// context reset, initial file write, marked active.
    pub async fn new_session(&self, user_id: &str) -> anyhow::Result<String> {
        let session_id = timestamp_id();
        let runtime = self.get_or_create(user_id, &session_id).await?;
        runtime.context.reset().await;

        let path = session_path(&self.session_dir, user_id, &session_id);
        runtime.context.save(&path).await?;

        let mtime = mtime_of(&path).await.unwrap_or(0);
        if let Err(e) = self.index.upsert(user_id, &session_id, mtime, None).await {
            warn!(error = %e, "failed to update session index on create");
        }

        self.active_session.lock().await.insert(user_id.to_string(), session_id.clone());
        Ok(session_id)
    }

    /// `list(user_id)` (§4.8): directory scan is authoritative; the index
    /// is consulted first and any inconsistency (missing entry, stale
    /// entry for a deleted file) falls back to a fresh scan rather than
    /// ever trusting a stale row.
    pub async fn list(&self, user_id: &str) -> anyhow::Result<Vec<SessionSummary>> {
        let on_disk = self.scan_disk(user_id).await?;

        let indexed = self.index.list(user_id).await.unwrap_or_default();
        let indexed_ids: std::collections::HashSet<_> = indexed.iter().map(|r| r.session_id.clone()).collect();
        let disk_ids: std::collections::HashSet<_> = on_disk.iter().map(|s| s.id.clone()).collect();

        if indexed_ids != disk_ids {
            debug!(user_id, "session index out of sync with disk, repairing");
            for summary in &on_disk {
                let _ = self.index.upsert(user_id, &summary.id, summary.mtime, None).await;
            }
            for stale in indexed_ids.difference(&disk_ids) {
                let _ = self.index.remove(user_id, stale).await;
            }
        }

        let mut sorted = on_disk;
        sorted.sort_by(|a, b| b.mtime.cmp(&a.mtime));
        Ok(sorted)
    }

    async fn scan_disk(&self, user_id: &str) -> anyhow::Result<Vec<SessionSummary>> {
        let prefix = format!("{user_id}_session_");
        let mut out = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.session_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(&prefix) else { continue };
            let Some(session_id) = rest.strip_suffix(".json") else { continue };

            let mtime = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            out.push(SessionSummary { id: session_id.to_string(), mtime });
        }
        Ok(out)
    }

    /// `load(user_id, session_id)` (§4.8): validated id, file existence
    /// check, returns the history tail (system prompt excluded).
    pub async fn load(&self, user_id: &str, session_id: &str) -> anyhow::Result<Vec<crate::message::Message>> {
        validate_session_id(session_id)?;
        let path = session_path(&self.session_dir, user_id, session_id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(SessionError::NotFound(session_id.to_string()).into());
        }

        let runtime = self.get_or_create(user_id, session_id).await?;
        runtime.context.load(&path).await?;
        Ok(runtime.context.history_tail().await)
    }

    /// `delete(user_id, session_id)` (§4.8): removes the file, the cached
    /// runtime, and the index row.
    pub async fn delete(&self, user_id: &str, session_id: &str) -> anyhow::Result<()> {
        validate_session_id(session_id)?;
        let path = session_path(&self.session_dir, user_id, session_id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(SessionError::NotFound(session_id.to_string()).into());
        }

        tokio::fs::remove_file(&path).await?;
        self.runtimes.lock().await.remove(&runtime_key(user_id, session_id));
        if let Err(e) = self.index.remove(user_id, session_id).await {
            warn!(error = %e, "failed to remove session index row");
        }
        Ok(())
    }

    pub async fn active_session(&self, user_id: &str) -> Option<String> {
        self.active_session.lock().await.get(user_id).cloned()
    }
}

async fn mtime_of(path: &std::path::Path) -> Option<i64> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    let modified = metadata.modified().ok()?;
    modified.duration_since(std::time::UNIX_EPOCH).ok().map(|d| d.as_secs() as i64)
}

/// Timestamp plus a short uuid suffix: two sessions created for the same
/// user within the same second must not collide on id.
fn timestamp_id() -> String {
    let now = chrono::Utc::now();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
}
