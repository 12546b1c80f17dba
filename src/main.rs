// src/main.rs
// Entry point: load + validate config, init tracing, bind and serve.

use std::sync::Arc;

use agentcore::api::routes;
use agentcore::api::state::AppState;
use agentcore::config::CONFIG;
use agentcore::session::SessionManager;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Overrides for the environment-driven config (`AppConfig::from_env`),
/// useful for ad-hoc runs without touching the environment.
#[derive(Parser)]
#[command(name = "agentcore")]
#[command(about = "LLM-driven agent runtime: streaming tool-call loop over HTTP/SSE with an MCP client")]
#[command(version)]
struct Cli {
    /// Overrides AGENTCORE_BIND_ADDR.
    #[arg(long)]
    bind_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    CONFIG.validate()?;

    let sessions = Arc::new(SessionManager::new(&CONFIG).await?);
    let state = AppState::new(sessions);
    let app = routes::build(state);

    let bind_addr = cli.bind_addr.unwrap_or_else(|| CONFIG.bind_addr.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "agentcore listening");
    axum::serve(listener, app).await?;

    Ok(())
}
