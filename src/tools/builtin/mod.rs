// src/tools/builtin/mod.rs
// The standard tool set's reference implementation (C10, §4.11). The
// dispatcher contract (input shape, success/failure semantics) is normative;
// these bodies are a demonstrative implementation behind that contract.

mod completion;
mod diff;
mod fs;
mod shell;

use std::sync::Arc;

use crate::tools::builder::{properties, ToolBuilder};
use crate::tools::ToolRegistry;

/// Registers the full standard tool set against a fresh registry. Called
/// once per runtime (§3, "Runtime" lifecycle).
pub async fn register_all(registry: &ToolRegistry) {
    registry
        .register(
            "list_files",
            ToolBuilder::new("list_files", "List files and directories under a workspace-relative path.")
                .property("path", properties::path("Path to list, relative to the workspace root."), true)
                .property("recursive", properties::boolean("List subdirectories recursively.", false), false)
                .build(),
            Arc::new(fs::ListFiles),
        )
        .await;

    registry
        .register(
            "read_file",
            ToolBuilder::new("read_file", "Read the contents of a file.")
                .property("path", properties::path("Path to read, relative to the workspace root."), true)
                .build(),
            Arc::new(fs::ReadFile),
        )
        .await;

    registry
        .register(
            "write_file",
            ToolBuilder::new("write_file", "Write content to a file, creating parent directories as needed.")
                .property("path", properties::path("Path to write, relative to the workspace root."), true)
                .property("content", properties::string("The file content to write."), true)
                .build(),
            Arc::new(fs::WriteFile),
        )
        .await;

    registry
        .register(
            "execute_command",
            ToolBuilder::new("execute_command", "Run a shell command under the workspace root.")
                .property("command", properties::string("The shell command to execute."), true)
                .property("cwd", properties::path("Working directory, relative to the workspace root."), false)
                .property("timeout_secs", properties::optional_integer("Timeout in seconds (default 120)."), false)
                .build(),
            Arc::new(shell::ExecuteCommand),
        )
        .await;

    registry
        .register(
            "apply_diff",
            ToolBuilder::new("apply_diff", "Apply a unified diff to a file under the workspace root.")
                .property("path", properties::path("Path to patch, relative to the workspace root."), true)
                .property("diff", properties::string("A unified diff to apply."), true)
                .build(),
            Arc::new(diff::ApplyDiff),
        )
        .await;

    registry
        .register(
            "ask_followup_question",
            ToolBuilder::new(
                "ask_followup_question",
                "Pause the turn and ask the user a clarifying question.",
            )
            .property("question", properties::string("The question to ask the user."), true)
            .property("options", properties::string_array("Optional suggested answers."), false)
            .build(),
            Arc::new(completion::AskFollowupQuestion),
        )
        .await;

    registry
        .register(
            "attempt_completion",
            ToolBuilder::new(
                crate::message::COMPLETION_TOOL,
                "Declare the task complete and summarise the result. Ends the turn.",
            )
            .property("result", properties::string("A summary of what was accomplished."), true)
            .build(),
            Arc::new(completion::AttemptCompletion),
        )
        .await;
}
