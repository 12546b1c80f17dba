// src/context.rs
// Context manager (C5): owns the conversation history, builds the system
// prompt, persists/restores sessions.

use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::message::Message;

pub struct ContextManager {
    history: RwLock<Vec<Message>>,
    workspace_root: String,
    skill_summaries: Vec<(String, String)>,
    autosave_path: RwLock<Option<PathBuf>>,
}

impl ContextManager {
    pub fn new(workspace_root: impl Into<String>, skill_summaries: Vec<(String, String)>) -> Self {
        let workspace_root = workspace_root.into();
        let system = build_system_prompt(&workspace_root, &skill_summaries);
        Self {
            history: RwLock::new(vec![Message::system(system)]),
            workspace_root,
            skill_summaries,
            autosave_path: RwLock::new(None),
        }
    }

    pub async fn set_autosave_path(&self, path: PathBuf) {
        *self.autosave_path.write().await = Some(path);
    }

    pub async fn history(&self) -> Vec<Message> {
        self.history.read().await.clone()
    }

    /// The tail of history excluding the leading system prompt (§4.8 `load`).
    pub async fn history_tail(&self) -> Vec<Message> {
        let history = self.history.read().await;
        history.iter().skip(1).cloned().collect()
    }

    pub async fn add_user(&self, content: impl Into<String>) {
        self.history.write().await.push(Message::user(content));
        self.autosave().await;
    }

    pub async fn add_assistant(&self, message: Message) {
        debug_assert!(matches!(message, Message::Assistant { .. }));
        self.history.write().await.push(message);
        self.autosave().await;
    }

    pub async fn add_tool(&self, call_id: impl Into<String>, text: impl Into<String>) {
        self.history.write().await.push(Message::tool(call_id, text));
        self.autosave().await;
    }

    /// Rebuilds the system prompt (so the workspace root stays correct) and
    /// drops every other message.
    pub async fn reset(&self) {
        let system = build_system_prompt(&self.workspace_root, &self.skill_summaries);
        *self.history.write().await = vec![Message::system(system)];
        self.autosave().await;
    }

    /// Writes the entire history as UTF-8 pretty-printed JSON.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let history = self.history.read().await;
        let json = serde_json::to_string_pretty(&*history)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Replaces index 1 onward, keeping the currently resident system
    /// prompt; a leading system message in the loaded file is skipped.
    pub async fn load(&self, path: &Path) -> anyhow::Result<()> {
        let raw = tokio::fs::read_to_string(path).await?;
        let loaded: Vec<Message> = serde_json::from_str(&raw)?;

        let mut tail: Vec<Message> = loaded;
        if matches!(tail.first(), Some(Message::System { .. })) {
            tail.remove(0);
        }

        let mut history = self.history.write().await;
        history.truncate(1);
        history.extend(tail);
        drop(history);
        self.autosave().await;
        Ok(())
    }

    async fn autosave(&self) {
        let Some(path) = self.autosave_path.read().await.clone() else {
            return;
        };
        if let Err(e) = self.save(&path).await {
            warn!(error = %e, path = %path.display(), "autosave failed");
        } else {
            debug!(path = %path.display(), "autosaved session");
        }
    }
}

fn build_system_prompt(workspace_root: &str, skills: &[(String, String)]) -> String {
    let mut prompt = format!(
        "You are an autonomous coding agent. The workspace root is {workspace_root}. \
         Use the available tools to fulfil the user's request; call attempt_completion when done."
    );

    if !skills.is_empty() {
        prompt.push_str("\n\nAvailable skills:\n");
        for (name, description) in skills {
            prompt.push_str(&format!("- {name}: {description}\n"));
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_starts_with_system_prompt() {
        let ctx = ContextManager::new("/w", vec![]);
        let history = ctx.history().await;
        assert_eq!(history.len(), 1);
        assert!(matches!(history[0], Message::System { .. }));
    }

    #[tokio::test]
    async fn save_then_load_round_trips_empty_tail() {
        // §8 property 6
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let ctx = ContextManager::new("/w", vec![]);
        ctx.save(&path).await.unwrap();

        let ctx2 = ContextManager::new("/w", vec![]);
        ctx2.load(&path).await.unwrap();
        assert_eq!(ctx2.history().await.len(), 1);
    }

    #[tokio::test]
    async fn load_keeps_resident_system_prompt_not_the_loaded_one() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let stale = vec![Message::system("stale prompt"), Message::user("hi")];
        tokio::fs::write(&path, serde_json::to_string(&stale).unwrap()).await.unwrap();

        let ctx = ContextManager::new("/w", vec![]);
        ctx.load(&path).await.unwrap();

        let history = ctx.history().await;
        assert_eq!(history.len(), 2);
        match &history[0] {
            Message::System { content } => assert!(content.contains("/w")),
            _ => panic!("expected system message"),
        }
    }

    #[tokio::test]
    async fn reset_preserves_system_message_drops_rest() {
        let ctx = ContextManager::new("/w", vec![]);
        ctx.add_user("hi").await;
        ctx.reset().await;

        let history = ctx.history().await;
        assert_eq!(history.len(), 1);
        assert!(matches!(history[0], Message::System { .. }));
    }
}
