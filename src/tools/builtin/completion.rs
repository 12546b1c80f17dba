// src/tools/builtin/completion.rs
// ask_followup_question and attempt_completion (§4.11): both are control
// signals read by the runtime loop (§4.6) rather than ordinary I/O.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::message::{ToolContext, ToolResult};
use crate::tools::ToolHandler;

pub struct AskFollowupQuestion;

#[async_trait]
impl ToolHandler for AskFollowupQuestion {
    async fn call(&self, _ctx: &ToolContext, args: Value) -> anyhow::Result<ToolResult> {
        let Some(question) = args.get("question").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::err("Error executing ask_followup_question: missing \"question\""));
        };
        let options = args.get("options").cloned().unwrap_or(json!([]));

        Ok(ToolResult::ok_with_data(
            question.to_string(),
            json!({ "action": "ask_user", "question": question, "options": options }),
        ))
    }
}

pub struct AttemptCompletion;

#[async_trait]
impl ToolHandler for AttemptCompletion {
    async fn call(&self, _ctx: &ToolContext, args: Value) -> anyhow::Result<ToolResult> {
        let Some(result) = args.get("result").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::err("Error executing attempt_completion: missing \"result\""));
        };
        Ok(ToolResult::ok(format!("TASK COMPLETED: {result}")))
    }
}
