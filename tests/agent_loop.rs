// tests/agent_loop.rs
// End-to-end exercises of `Runtime::step` driven by a small in-process fake
// LLM server, covering the trivial-completion and one-round-trip-tool-use
// scenarios.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agentcore::config::LlmConfig;
use agentcore::context::ContextManager;
use agentcore::llm::LlmTransport;
use agentcore::mcp::McpManager;
use agentcore::message::{EnvironmentTag, SkillCatalogue, ToolContext};
use agentcore::runtime::{Runtime, RuntimeEvent};
use agentcore::tools::{builtin, ToolRegistry};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tokio::sync::mpsc;

#[derive(Clone)]
struct FakeLlmState {
    responses: Arc<Mutex<VecDeque<&'static str>>>,
}

async fn fake_chat_completions(State(state): State<FakeLlmState>) -> impl IntoResponse {
    let body = state.responses.lock().unwrap().pop_front().unwrap_or("data: [DONE]\n\n");
    ([("content-type", "text/event-stream")], body)
}

/// Spawns a one-shot fake OpenAI-compatible chat-completions server and
/// returns its base URL (without the `/chat/completions` suffix).
async fn spawn_fake_llm(responses: Vec<&'static str>) -> String {
    let state = FakeLlmState { responses: Arc::new(Mutex::new(responses.into_iter().collect())) };
    let app = Router::new().route("/chat/completions", post(fake_chat_completions)).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

fn test_llm_config(base_url: String) -> LlmConfig {
    LlmConfig { api_key: "test-key".to_string(), base_url, model: "test-model".to_string() }
}

async fn collect_events(mut rx: mpsc::Receiver<RuntimeEvent>) -> Vec<RuntimeEvent> {
    let mut out = Vec::new();
    while let Some(event) = rx.recv().await {
        out.push(event);
    }
    out
}

/// Scenario A — trivial completion.
#[tokio::test]
async fn scenario_a_trivial_completion() {
    let base_url = spawn_fake_llm(vec![
        "data: {\"choices\":[{\"delta\":{\"content\":\"hello\"}}]}\n\ndata: [DONE]\n\n",
    ])
    .await;

    let dir = tempfile::TempDir::new().unwrap();
    let registry = Arc::new(ToolRegistry::new());
    builtin::register_all(&registry).await;

    let tool_context = Arc::new(ToolContext::new(dir.path().to_path_buf(), Arc::new(SkillCatalogue::default()), EnvironmentTag::Web));
    let context = ContextManager::new(dir.path().display().to_string(), vec![]);
    let transport = Arc::new(LlmTransport::new(test_llm_config(base_url)));
    let runtime = Runtime::new(context, registry, tool_context, transport, 10, McpManager::empty());

    let (tx, rx) = mpsc::channel(32);
    runtime.step("hi".to_string(), tx).await;
    let events = collect_events(rx).await;

    assert!(matches!(&events[0], RuntimeEvent::ContentDelta { content } if content.text == "hello"));
    assert!(matches!(events.last().unwrap(), RuntimeEvent::Finished { .. }));

    let history = runtime.context.history().await;
    // system + user + assistant
    assert_eq!(history.len(), 3);
}

/// Scenario B — one round-trip tool use, followed by attempt_completion.
#[tokio::test]
async fn scenario_b_one_round_trip_tool_use() {
    let list_files_response = "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",\"function\":{\"name\":\"list_files\",\"arguments\":\"{\\\"path\\\":\\\".\\\",\\\"recursive\\\":false}\"}}]}}]}\n\ndata: [DONE]\n\n";
    let completion_response = "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c2\",\"function\":{\"name\":\"attempt_completion\",\"arguments\":\"{\\\"result\\\":\\\"two entries\\\"}\"}}]}}]}\n\ndata: [DONE]\n\n";

    let base_url = spawn_fake_llm(vec![list_files_response, completion_response]).await;

    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
    std::fs::create_dir(dir.path().join("b")).unwrap();

    let registry = Arc::new(ToolRegistry::new());
    builtin::register_all(&registry).await;

    let tool_context = Arc::new(ToolContext::new(dir.path().to_path_buf(), Arc::new(SkillCatalogue::default()), EnvironmentTag::Web));
    let context = ContextManager::new(dir.path().display().to_string(), vec![]);
    let transport = Arc::new(LlmTransport::new(test_llm_config(base_url)));
    let runtime = Runtime::new(context, registry, tool_context, transport, 10, McpManager::empty());

    let (tx, rx) = mpsc::channel(32);
    runtime.step("list files".to_string(), tx).await;
    let events = collect_events(rx).await;

    let tool_call_events: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, RuntimeEvent::ToolCall { .. }))
        .collect();
    assert_eq!(tool_call_events.len(), 2);

    match &tool_call_events[0] {
        RuntimeEvent::ToolCall { content } => assert_eq!(content.name, "list_files"),
        _ => unreachable!(),
    }
    match &tool_call_events[1] {
        RuntimeEvent::ToolCall { content } => assert_eq!(content.name, "attempt_completion"),
        _ => unreachable!(),
    }

    let tool_output_events: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, RuntimeEvent::ToolOutput { .. }))
        .collect();
    match &tool_output_events[0] {
        RuntimeEvent::ToolOutput { content } => assert!(content.output.contains("a.txt")),
        _ => unreachable!(),
    }
    match &tool_output_events[1] {
        RuntimeEvent::ToolOutput { content } => assert_eq!(content.output, "TASK COMPLETED: two entries"),
        _ => unreachable!(),
    }

    assert!(matches!(events.last().unwrap(), RuntimeEvent::Finished { content } if content == "TASK COMPLETED: two entries"));
}

/// Scenario D — path escape attempt never touches the filesystem outside root.
#[tokio::test]
async fn scenario_d_path_escape_is_an_in_band_error() {
    let escape_response = "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",\"function\":{\"name\":\"read_file\",\"arguments\":\"{\\\"path\\\":\\\"../../etc/passwd\\\"}\"}}]}}]}\n\ndata: [DONE]\n\n";
    let completion_response = "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c2\",\"function\":{\"name\":\"attempt_completion\",\"arguments\":\"{\\\"result\\\":\\\"done\\\"}\"}}]}}]}\n\ndata: [DONE]\n\n";

    let base_url = spawn_fake_llm(vec![escape_response, completion_response]).await;

    let dir = tempfile::TempDir::new().unwrap();
    let registry = Arc::new(ToolRegistry::new());
    builtin::register_all(&registry).await;

    let tool_context = Arc::new(ToolContext::new(dir.path().to_path_buf(), Arc::new(SkillCatalogue::default()), EnvironmentTag::Web));
    let context = ContextManager::new(dir.path().display().to_string(), vec![]);
    let transport = Arc::new(LlmTransport::new(test_llm_config(base_url)));
    let runtime = Runtime::new(context, registry, tool_context, transport, 10, McpManager::empty());

    let (tx, rx) = mpsc::channel(32);
    runtime.step("read outside the workspace".to_string(), tx).await;
    let events = collect_events(rx).await;

    let tool_output = events
        .iter()
        .find_map(|e| match e {
            RuntimeEvent::ToolOutput { content } if content.id == "c1" => Some(content.output.clone()),
            _ => None,
        })
        .expect("expected a tool_output event for c1");

    assert!(tool_output.contains("escapes workspace root"));
}
