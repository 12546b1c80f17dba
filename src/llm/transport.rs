// src/llm/transport.rs

use futures::stream::{BoxStream, StreamExt};
use serde_json::{json, Value};
use tracing::warn;

use crate::config::LlmConfig;
use crate::message::Message;

use super::Chunk;

/// `stream_chat(messages, tool_catalogue) → chunk_iterator | null` (§4.3).
/// Temperature 0, tool-choice `auto` when a non-empty catalogue is supplied,
/// streaming always enabled — these are fixed by the core, not configurable.
pub struct LlmTransport {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmTransport {
    pub fn new(config: LlmConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }

    /// Returns `None` if the HTTP call errors or returns no stream; the
    /// runtime surfaces that as an `error` event and ends the turn.
    pub async fn stream_chat(
        &self,
        messages: &[Message],
        tool_catalogue: Vec<Value>,
    ) -> Option<BoxStream<'static, Chunk>> {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages.iter().map(to_wire_message).collect::<Vec<_>>(),
            "temperature": 0,
            "stream": true,
        });

        if !tool_catalogue.is_empty() {
            body["tools"] = json!(tool_catalogue);
            body["tool_choice"] = json!("auto");
        }

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let response = match self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "LLM transport request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "LLM transport returned non-success status");
            return None;
        }

        let byte_stream = response.bytes_stream();
        let chunk_stream = byte_stream
            .scan(String::new(), |buf, item| {
                let chunks = match item {
                    Ok(bytes) => {
                        buf.push_str(&String::from_utf8_lossy(&bytes));
                        let mut out = Vec::new();
                        while let Some(pos) = buf.find('\n') {
                            let line = buf[..pos].trim_end_matches('\r').to_string();
                            *buf = buf[pos + 1..].to_string();
                            if let Some(chunk) = Chunk::from_sse_line(&line) {
                                out.push(chunk);
                            }
                        }
                        out
                    }
                    Err(e) => {
                        warn!(error = %e, "LLM transport stream read error");
                        Vec::new()
                    }
                };
                futures::future::ready(Some(chunks))
            })
            .flat_map(futures::stream::iter);

        Some(chunk_stream.boxed())
    }
}

fn to_wire_message(message: &Message) -> Value {
    match message {
        Message::System { content } => json!({ "role": "system", "content": content }),
        Message::User { content } => json!({ "role": "user", "content": content }),
        Message::Assistant { content, reasoning, tool_calls } => {
            let mut wire = json!({
                "role": "assistant",
                "content": content,
            });
            if let Some(r) = reasoning {
                wire["reasoning_content"] = json!(r);
            }
            if let Some(calls) = tool_calls {
                wire["tool_calls"] = json!(calls
                    .iter()
                    .map(|c| json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.arguments },
                    }))
                    .collect::<Vec<_>>());
            }
            wire
        }
        Message::Tool { call_id, content } => json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": content,
        }),
    }
}
