// src/config/mod.rs
// Environment-driven configuration (C11), composed the way the teacher's
// `MiraConfig` composes domain sub-configs behind one lazy_static handle.

mod llm;

pub use llm::LlmConfig;

use std::path::PathBuf;

use lazy_static::lazy_static;

lazy_static! {
    pub static ref CONFIG: AppConfig = AppConfig::from_env();
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub bind_addr: String,
    pub workspace_root: PathBuf,
    pub session_dir: PathBuf,
    pub db_path: PathBuf,
    pub max_steps: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let workspace_root = env_path_or("AGENTCORE_WORKSPACE_ROOT", || {
            std::env::current_dir().expect("current directory must be readable")
        });

        let session_dir = env_path_or("AGENTCORE_SESSION_DIR", || workspace_root.join("sessions"));
        let db_path = env_path_or("AGENTCORE_DB_PATH", || workspace_root.join("agentcore.db"));

        Self {
            llm: LlmConfig::from_env(),
            bind_addr: env_or("AGENTCORE_BIND_ADDR", "127.0.0.1:8080"),
            workspace_root,
            session_dir,
            db_path,
            max_steps: env_usize("AGENTCORE_MAX_STEPS", 100),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.validate()?;
        if self.max_steps == 0 {
            anyhow::bail!("AGENTCORE_MAX_STEPS must be at least 1");
        }
        Ok(())
    }
}

pub(crate) fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

pub(crate) fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub(crate) fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("missing required environment variable {name}"))
}

fn env_path_or(name: &str, default: impl FnOnce() -> PathBuf) -> PathBuf {
    std::env::var(name).map(PathBuf::from).unwrap_or_else(|_| default())
}
