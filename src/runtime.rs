// src/runtime.rs
// Agent runtime — the loop (C6). Grounded on the teacher's bounded
// tool-call-round chat loop: build messages, call the transport, inspect
// tool_calls, execute them, append results, and repeat until terminal.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::context::ContextManager;
use crate::error::RuntimeError;
use crate::interpreter::{self, StreamEvent};
use crate::llm::LlmTransport;
use crate::mcp::McpManager;
use crate::message::{Message, TodoItem, TodoStatus, ToolContext, COMPLETION_TOOL};
use crate::tools::ToolRegistry;

/// SSE event records (§6): the `type` tag crossing the HTTP boundary.
/// `FullMessage` is deliberately absent from this enum — it never leaves
/// the interpreter/runtime boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    ThinkingDelta { content: ThinkingContent },
    ContentDelta { content: ThinkingContent },
    ToolCall { content: ToolCallContent },
    ToolOutput { content: ToolOutputContent },
    Interrupt { payload: Value },
    Finished { content: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ThinkingContent {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallContent {
    pub id: String,
    pub name: String,
    pub args: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolOutputContent {
    pub id: String,
    pub output: String,
}

/// The per-(user, session) object bundling context, registry, tool context,
/// transport, and MCP clients (Glossary). The `step` mutex enforces §5's
/// ordering guarantee: a runtime's turns are serialised.
pub struct Runtime {
    pub context: ContextManager,
    pub registry: Arc<ToolRegistry>,
    pub tool_context: Arc<ToolContext>,
    transport: Arc<LlmTransport>,
    max_steps: usize,
    step_lock: Mutex<()>,
    // Kept alive for the runtime's lifetime: dropping it would tear down
    // every connected MCP server's transport out from under the registry.
    _mcp: McpManager,
}

impl Runtime {
    pub fn new(
        context: ContextManager,
        registry: Arc<ToolRegistry>,
        tool_context: Arc<ToolContext>,
        transport: Arc<LlmTransport>,
        max_steps: usize,
        mcp: McpManager,
    ) -> Self {
        Self { context, registry, tool_context, transport, max_steps, step_lock: Mutex::new(()), _mcp: mcp }
    }

    /// `step(user_text) → event_stream` (§4.6). Events are sent over `tx` in
    /// the exact order the pseudocode in §4.6 mandates; the stream ends
    /// after the first `Finished`, `Interrupt`, or terminal `Error`.
    #[instrument(skip(self, tx))]
    pub async fn step(&self, user_text: String, tx: mpsc::Sender<RuntimeEvent>) {
        let _guard = self.step_lock.lock().await;

        self.context.add_user(user_text).await;

        for step in 0..self.max_steps {
            debug!(step, "agent loop iteration");

            let mut messages = self.context.history().await;
            let todo_reminder = self.ephemeral_todo_message().await;
            if let Some(reminder) = todo_reminder {
                messages.push(reminder);
            }

            let catalogue = self.registry.catalogue().await;
            let Some(chunks) = self.transport.stream_chat(&messages, catalogue).await else {
                let _ = tx.send(RuntimeEvent::Error { message: "empty response".to_string() }).await;
                return;
            };

            let mut full: Option<Message> = None;
            let mut events = interpreter::parse(chunks);
            use futures::StreamExt;
            while let Some(event) = events.next().await {
                match event {
                    StreamEvent::FullMessage { message } => full = Some(message),
                    StreamEvent::ThinkingDelta { text } => {
                        if tx.send(RuntimeEvent::ThinkingDelta { content: ThinkingContent { text } }).await.is_err() {
                            return;
                        }
                    }
                    StreamEvent::ContentDelta { text } => {
                        if tx.send(RuntimeEvent::ContentDelta { content: ThinkingContent { text } }).await.is_err() {
                            return;
                        }
                    }
                }
            }

            let Some(full) = full else {
                let _ = tx.send(RuntimeEvent::Error { message: "empty response".to_string() }).await;
                return;
            };

            self.context.add_assistant(full.clone()).await;

            let Some(tool_calls) = full.tool_calls().map(|c| c.to_vec()) else {
                let _ = tx.send(RuntimeEvent::Finished { content: "Done".to_string() }).await;
                return;
            };
            if tool_calls.is_empty() {
                let _ = tx.send(RuntimeEvent::Finished { content: "Done".to_string() }).await;
                return;
            }

            for (index, tc) in tool_calls.into_iter().enumerate() {
                if tc.id.is_empty() {
                    let err = RuntimeError::MissingToolCallId(index as i64);
                    error!(error = %err, "tool call missing id for a declared index");
                    let _ = tx.send(RuntimeEvent::Error { message: err.to_string() }).await;
                    return;
                }

                if tx
                    .send(RuntimeEvent::ToolCall {
                        content: ToolCallContent { id: tc.id.clone(), name: tc.name.clone(), args: tc.arguments.clone() },
                    })
                    .await
                    .is_err()
                {
                    return;
                }

                let result = self.registry.dispatch(&tc.name, &tc.arguments, &self.tool_context).await;

                self.context.add_tool(tc.id.clone(), result.output.clone()).await;

                if tx
                    .send(RuntimeEvent::ToolOutput {
                        content: ToolOutputContent { id: tc.id.clone(), output: result.output.clone() },
                    })
                    .await
                    .is_err()
                {
                    return;
                }

                if result.is_ask_user() {
                    let payload = result.data.unwrap_or(json!({}));
                    let _ = tx.send(RuntimeEvent::Interrupt { payload }).await;
                    return;
                }

                if tc.name == COMPLETION_TOOL {
                    let _ = tx.send(RuntimeEvent::Finished { content: result.output }).await;
                    return;
                }
            }
        }

        warn!(max_steps = self.max_steps, "agent loop hit the hard step cap");
        let err: RuntimeError = RuntimeError::MaxStepsExceeded(self.max_steps);
        let _ = tx.send(RuntimeEvent::Error { message: err.to_string() }).await;
    }

    /// Recomputed every step from the current todo state (§4.6); never
    /// persisted into history.
    async fn ephemeral_todo_message(&self) -> Option<Message> {
        let todos = self.tool_context.todos.read().await;
        if todos.is_empty() {
            return None;
        }
        let summary = summarize_todos(&todos);
        Some(Message::system(format!(
            "Outstanding todo items:\n{summary}\nContinue advancing these; mark items completed as you finish them."
        )))
    }
}

fn summarize_todos(items: &[TodoItem]) -> String {
    fn walk(items: &[TodoItem], depth: usize, out: &mut String) {
        for item in items {
            let marker = match item.status {
                TodoStatus::Pending => "[ ]",
                TodoStatus::InProgress => "[~]",
                TodoStatus::Completed => "[x]",
                TodoStatus::Failed => "[!]",
                TodoStatus::Skipped => "[-]",
            };
            out.push_str(&"  ".repeat(depth));
            out.push_str(marker);
            out.push(' ');
            out.push_str(&item.title);
            out.push('\n');
            walk(&item.subtasks, depth + 1, out);
        }
    }
    let mut out = String::new();
    walk(items, 0, &mut out);
    out
}
