// src/llm/mod.rs
// LLM transport (C3): issues streaming chat-completion requests and exposes
// an async chunk stream; isolates vendor wire-format quirks from the loop.

mod transport;

pub use transport::LlmTransport;

use serde_json::Value;

/// One incremental delta from the model (§4.3). The transport never mutates
/// these; it is purely an adapter from SSE lines to this shape.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub tool_call_fragments: Vec<ToolCallFragment>,
}

/// A partial tool-call, keyed by its position in the model's declared
/// tool-call list. `id`, `name`, and `arguments` are fragments to be
/// concatenated by the stream interpreter (§4.4), not complete values.
#[derive(Debug, Clone)]
pub struct ToolCallFragment {
    pub index: i64,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

impl Chunk {
    /// Parses one OpenAI-compatible chat-completions streaming SSE line
    /// (`data: {...}` or the `data: [DONE]` sentinel) into a chunk. Returns
    /// `None` for lines that carry no delta (keep-alives, `[DONE]`,
    /// non-`data:` lines, or malformed JSON).
    pub fn from_sse_line(line: &str) -> Option<Self> {
        let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return None;
        }

        let json: Value = serde_json::from_str(data).ok()?;
        let delta = json.pointer("/choices/0/delta")?;

        let content = delta.get("content").and_then(|v| v.as_str()).map(String::from);
        let reasoning = delta
            .get("reasoning_content")
            .or_else(|| delta.get("reasoning"))
            .and_then(|v| v.as_str())
            .map(String::from);

        let tool_call_fragments = delta
            .get("tool_calls")
            .and_then(|v| v.as_array())
            .map(|calls| calls.iter().filter_map(parse_fragment).collect())
            .unwrap_or_default();

        if content.is_none() && reasoning.is_none() && tool_call_fragments.is_empty() {
            return None;
        }

        Some(Chunk { content, reasoning, tool_call_fragments })
    }
}

fn parse_fragment(item: &Value) -> Option<ToolCallFragment> {
    let index = item.get("index")?.as_i64()?;
    let id = item.get("id").and_then(|v| v.as_str()).map(String::from);
    let function = item.get("function");
    let name = function
        .and_then(|f| f.get("name"))
        .and_then(|v| v.as_str())
        .map(String::from);
    let arguments = function
        .and_then(|f| f.get("arguments"))
        .and_then(|v| v.as_str())
        .map(String::from);
    Some(ToolCallFragment { index, id, name, arguments })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#;
        let chunk = Chunk::from_sse_line(line).unwrap();
        assert_eq!(chunk.content.as_deref(), Some("hi"));
    }

    #[test]
    fn done_sentinel_yields_none() {
        assert!(Chunk::from_sse_line("data: [DONE]").is_none());
    }

    #[test]
    fn parses_tool_call_fragment() {
        let line = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"read_file","arguments":"{\"p"}}]}}]}"#;
        let chunk = Chunk::from_sse_line(line).unwrap();
        assert_eq!(chunk.tool_call_fragments.len(), 1);
        assert_eq!(chunk.tool_call_fragments[0].index, 0);
        assert_eq!(chunk.tool_call_fragments[0].id.as_deref(), Some("c1"));
    }
}
