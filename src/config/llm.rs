// src/config/llm.rs
// LLM transport configuration (§6): OPENAI_API_KEY and OPENAI_BASE_URL are
// required, OPENAI_MODEL defaults to gpt-4o-mini.

use super::{env_or, require_env};

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: require_env("OPENAI_API_KEY").unwrap_or_default(),
            base_url: require_env("OPENAI_BASE_URL").unwrap_or_default(),
            model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!("OPENAI_API_KEY is required");
        }
        if self.base_url.is_empty() {
            anyhow::bail!("OPENAI_BASE_URL is required");
        }
        Ok(())
    }
}
