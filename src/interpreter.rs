// src/interpreter.rs
// Stream interpreter (C4): folds the chunk iterator into an ordered event
// sequence and a final assembled assistant message.

use std::collections::BTreeMap;

use futures::stream::{BoxStream, StreamExt};

use crate::llm::Chunk;
use crate::message::{Message, ToolCall};

/// Events produced lazily while folding the chunk stream (§4.4). `FullMessage`
/// is internal bookkeeping for the runtime loop and must never cross the
/// HTTP boundary (§6).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    ThinkingDelta { text: String },
    ContentDelta { text: String },
    FullMessage { message: Message },
}

#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

/// Folds `chunks` into a lazily-produced event stream. Reasoning and content
/// fragments concatenate in arrival order; tool-call fragments are merged by
/// index and the final list is ordered by ascending index, not arrival order.
pub fn parse(chunks: BoxStream<'static, Chunk>) -> BoxStream<'static, StreamEvent> {
    let state = futures::stream::unfold(
        (chunks, String::new(), String::new(), BTreeMap::<i64, ToolCallAccumulator>::new(), false),
        |(mut chunks, mut content, mut reasoning, mut tool_calls, emitted_final)| async move {
            if emitted_final {
                return None;
            }

            match chunks.next().await {
                Some(chunk) => {
                    let mut events = Vec::new();
                    if let Some(text) = chunk.content {
                        content.push_str(&text);
                        events.push(StreamEvent::ContentDelta { text });
                    }
                    if let Some(text) = chunk.reasoning {
                        reasoning.push_str(&text);
                        events.push(StreamEvent::ThinkingDelta { text });
                    }
                    for frag in chunk.tool_call_fragments {
                        let entry = tool_calls.entry(frag.index).or_default();
                        if let Some(id) = frag.id {
                            entry.id.push_str(&id);
                        }
                        if let Some(name) = frag.name {
                            entry.name.push_str(&name);
                        }
                        if let Some(arguments) = frag.arguments {
                            entry.arguments.push_str(&arguments);
                        }
                    }
                    Some((events, (chunks, content, reasoning, tool_calls, false)))
                }
                None => {
                    let message = assemble(content, reasoning, tool_calls);
                    Some((vec![StreamEvent::FullMessage { message }], (chunks, String::new(), String::new(), BTreeMap::new(), true)))
                }
            }
        },
    )
    .flat_map(|events| futures::stream::iter(events));

    state.boxed()
}

fn assemble(content: String, reasoning: String, tool_calls: BTreeMap<i64, ToolCallAccumulator>) -> Message {
    let content = if content.is_empty() { None } else { Some(content) };
    let reasoning = if reasoning.is_empty() { None } else { Some(reasoning) };

    let tool_calls = if tool_calls.is_empty() {
        None
    } else {
        Some(
            tool_calls
                .into_iter()
                .map(|(_, acc)| ToolCall { id: acc.id, name: acc.name, arguments: acc.arguments })
                .collect(),
        )
    };

    // §8 property 11: reasoning-only streams synthesize a stand-in content
    // string rather than leaving an empty-looking assistant message.
    if content.is_none() && tool_calls.is_none() && reasoning.is_some() {
        return Message::Assistant {
            content: Some("(Model stopped after thinking)".to_string()),
            reasoning,
            tool_calls: None,
        };
    }

    Message::Assistant { content, reasoning, tool_calls }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCallFragment;

    fn chunk_stream(chunks: Vec<Chunk>) -> BoxStream<'static, Chunk> {
        futures::stream::iter(chunks).boxed()
    }

    #[tokio::test]
    async fn assembles_content_only_message() {
        let chunks = chunk_stream(vec![Chunk { content: Some("hello".into()), ..Default::default() }]);
        let events: Vec<_> = parse(chunks).collect().await;

        assert!(matches!(&events[0], StreamEvent::ContentDelta { text } if text == "hello"));
        match &events[1] {
            StreamEvent::FullMessage { message: Message::Assistant { content, tool_calls, .. } } => {
                assert_eq!(content.as_deref(), Some("hello"));
                assert!(tool_calls.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn merges_fragmented_tool_call_arguments_by_index() {
        // Scenario C
        let chunks = chunk_stream(vec![
            Chunk {
                tool_call_fragments: vec![ToolCallFragment {
                    index: 0,
                    id: Some("c1".into()),
                    name: Some("read_file".into()),
                    arguments: Some("{\"p".into()),
                }],
                ..Default::default()
            },
            Chunk {
                tool_call_fragments: vec![ToolCallFragment {
                    index: 0,
                    id: None,
                    name: None,
                    arguments: Some("ath\":\"x".into()),
                }],
                ..Default::default()
            },
            Chunk {
                tool_call_fragments: vec![ToolCallFragment {
                    index: 0,
                    id: None,
                    name: None,
                    arguments: Some("\"}".into()),
                }],
                ..Default::default()
            },
        ]);

        let events: Vec<_> = parse(chunks).collect().await;
        match events.last().unwrap() {
            StreamEvent::FullMessage { message } => {
                let calls = message.tool_calls().unwrap();
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "read_file");
                assert_eq!(calls[0].arguments, "{\"path\":\"x\"}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reasoning_only_stream_synthesizes_stand_in_message() {
        let chunks = chunk_stream(vec![Chunk { reasoning: Some("pondering".into()), ..Default::default() }]);
        let events: Vec<_> = parse(chunks).collect().await;

        match events.last().unwrap() {
            StreamEvent::FullMessage { message: Message::Assistant { content, .. } } => {
                assert_eq!(content.as_deref(), Some("(Model stopped after thinking)"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_calls_ordered_by_index_not_arrival() {
        let chunks = chunk_stream(vec![
            Chunk {
                tool_call_fragments: vec![ToolCallFragment {
                    index: 1,
                    id: Some("second".into()),
                    name: Some("b".into()),
                    arguments: Some("{}".into()),
                }],
                ..Default::default()
            },
            Chunk {
                tool_call_fragments: vec![ToolCallFragment {
                    index: 0,
                    id: Some("first".into()),
                    name: Some("a".into()),
                    arguments: Some("{}".into()),
                }],
                ..Default::default()
            },
        ]);

        let events: Vec<_> = parse(chunks).collect().await;
        match events.last().unwrap() {
            StreamEvent::FullMessage { message } => {
                let calls = message.tool_calls().unwrap();
                assert_eq!(calls[0].id, "first");
                assert_eq!(calls[1].id, "second");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
