//! Chat-completions wire shapes (§6): the OpenAI-compatible request/response
//! envelope the HTTP surface accepts and emits, plus the translation into
//! and out of the core's transport-agnostic types.

use crate::config::ReasoningEffort;
use crate::llm::{ChatMessage, Role, Usage};
use crate::scheduler::RunOutcome;
use crate::stream::StreamChunk;
use crate::types::Reference;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub reasoning_effort: ReasoningEffort,
    pub max_completion_tokens: Option<u64>,
    pub budget_tokens: Option<u64>,
    pub max_attempts: Option<u32>,
    pub response_format: Option<ResponseFormat>,
    #[serde(default)]
    pub no_direct_answer: bool,
    pub max_returned_urls: Option<usize>,
    #[serde(default)]
    pub boost_hostnames: Vec<String>,
    #[serde(default)]
    pub bad_hostnames: Vec<String>,
    #[serde(default)]
    pub only_hostnames: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
    pub json_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: WireContent,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<WireContentPart>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireContentPart {
    Text { text: String },
    ImageUrl { image_url: WireImageUrl },
}

#[derive(Debug, Deserialize)]
pub struct WireImageUrl {
    pub url: String,
}

static THINK_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Strip `<think>...</think>` spans from assistant turns and flatten
/// `image_url` parts into a `{type: image, image: <url>}` marker line (§6).
pub fn ingest_messages(messages: Vec<WireMessage>) -> Vec<ChatMessage> {
    messages
        .into_iter()
        .map(|message| {
            let role = match message.role.as_str() {
                "system" => Role::System,
                "assistant" => Role::Assistant,
                _ => Role::User,
            };

            let mut content = match message.content {
                WireContent::Text(text) => text,
                WireContent::Parts(parts) => parts
                    .into_iter()
                    .map(|part| match part {
                        WireContentPart::Text { text } => text,
                        WireContentPart::ImageUrl { image_url } => {
                            format!("{{\"type\":\"image\",\"image\":\"{}\"}}", image_url.url)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            };

            if role == Role::Assistant {
                content = THINK_SPAN.replace_all(&content, "").trim().to_string();
            }

            ChatMessage { role, content }
        })
        .collect()
}

/// One SSE `data:` event (or, in buffered mode, one of the accumulated steps).
#[derive(Debug, Serialize)]
pub struct ChatCompletionsChunk {
    pub id: String,
    pub object: &'static str,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<WireUsage>,
    #[serde(rename = "visitedURLs", skip_serializing_if = "Option::is_none")]
    pub visited_urls: Option<Vec<String>>,
    #[serde(rename = "readURLs", skip_serializing_if = "Option::is_none")]
    pub read_urls: Option<Vec<String>>,
    #[serde(rename = "numURLs", skip_serializing_if = "Option::is_none")]
    pub num_urls: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<&'static str>,
}

#[derive(Debug, Default, Serialize)]
pub struct ChunkDelta {
    pub role: Option<&'static str>,
    #[serde(rename = "type")]
    pub kind: Option<&'static str>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub annotations: Option<Vec<Annotation>>,
}

#[derive(Debug, Serialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub url_citation: UrlCitation,
}

#[derive(Debug, Serialize)]
pub struct UrlCitation {
    pub title: String,
    #[serde(rename = "exactQuote")]
    pub exact_quote: String,
    pub url: String,
    #[serde(rename = "dateTime")]
    pub date_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct WireUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<Usage> for WireUsage {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.prompt_tokens + usage.completion_tokens,
        }
    }
}

fn annotations_for(references: &[Reference]) -> Option<Vec<Annotation>> {
    if references.is_empty() {
        return None;
    }
    Some(
        references
            .iter()
            .map(|r| Annotation {
                kind: "url_citation",
                url_citation: UrlCitation {
                    title: r.title.clone(),
                    exact_quote: r.exact_quote.clone(),
                    url: r.url.clone(),
                    date_time: r.date_time,
                },
            })
            .collect(),
    )
}

fn bare_chunk(id: &str, model: &str, delta: ChunkDelta, finish_reason: Option<&'static str>) -> ChatCompletionsChunk {
    ChatCompletionsChunk {
        id: id.to_string(),
        object: "chat.completion.chunk",
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta,
            finish_reason,
        }],
        usage: None,
        visited_urls: None,
        read_urls: None,
        num_urls: None,
    }
}

pub fn opening_chunk(id: &str, model: &str) -> ChatCompletionsChunk {
    bare_chunk(
        id,
        model,
        ChunkDelta {
            role: Some("assistant"),
            kind: Some("think"),
            content: Some("<think>".to_string()),
            ..Default::default()
        },
        None,
    )
}

/// Translate one core `StreamChunk` into its wire representation. The final
/// `Answer` chunk additionally carries usage and URL accounting at the
/// top level (§6).
pub fn chunk_for(id: &str, model: &str, event: StreamChunk) -> ChatCompletionsChunk {
    match event {
        StreamChunk::ThinkOpen => opening_chunk(id, model),
        StreamChunk::Think(text) => bare_chunk(
            id,
            model,
            ChunkDelta {
                kind: Some("think"),
                content: Some(text),
                ..Default::default()
            },
            None,
        ),
        StreamChunk::Url(url) => bare_chunk(
            id,
            model,
            ChunkDelta {
                kind: Some("think"),
                url: Some(url),
                ..Default::default()
            },
            None,
        ),
        StreamChunk::ThinkingEnd => bare_chunk(
            id,
            model,
            ChunkDelta {
                content: Some("</think>\n\n".to_string()),
                ..Default::default()
            },
            Some("thinking_end"),
        ),
        StreamChunk::Answer(answer) => {
            let mut chunk = bare_chunk(
                id,
                model,
                ChunkDelta {
                    kind: Some("text"),
                    content: Some(answer.text),
                    annotations: annotations_for(&answer.references),
                    ..Default::default()
                },
                Some("stop"),
            );
            chunk.usage = Some(answer.usage.into());
            chunk.visited_urls = Some(answer.visited_urls);
            chunk.read_urls = Some(answer.read_urls);
            chunk.num_urls = Some(answer.num_urls);
            chunk
        }
        StreamChunk::Error(message) => bare_chunk(
            id,
            model,
            ChunkDelta {
                kind: Some("error"),
                content: Some(message),
                ..Default::default()
            },
            Some("error"),
        ),
    }
}

/// Buffered (non-streaming) response body: one assistant message carrying
/// the final answer and its citations.
#[derive(Debug, Serialize)]
pub struct ChatCompletionsResponse {
    pub id: String,
    pub object: &'static str,
    pub model: String,
    pub choices: Vec<ResponseChoice>,
    pub usage: WireUsage,
    #[serde(rename = "visitedURLs")]
    pub visited_urls: Vec<String>,
    #[serde(rename = "readURLs")]
    pub read_urls: Vec<String>,
    #[serde(rename = "numURLs")]
    pub num_urls: usize,
}

#[derive(Debug, Serialize)]
pub struct ResponseChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ResponseMessage {
    pub role: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
}

pub fn buffered_response(id: &str, model: &str, usage: Usage, outcome: RunOutcome) -> ChatCompletionsResponse {
    ChatCompletionsResponse {
        id: id.to_string(),
        object: "chat.completion",
        model: model.to_string(),
        choices: vec![ResponseChoice {
            index: 0,
            message: ResponseMessage {
                role: "assistant",
                kind: "text",
                annotations: annotations_for(&outcome.references),
                content: outcome.answer,
            },
            finish_reason: "stop",
        }],
        usage: usage.into(),
        visited_urls: outcome.visited_urls,
        read_urls: outcome.read_urls,
        num_urls: outcome.num_urls,
    }
}

/// §7 fatal-error, non-streaming shape: an assistant message of `type: error`.
pub fn buffered_error_response(id: &str, model: &str, message: &str) -> ChatCompletionsResponse {
    ChatCompletionsResponse {
        id: id.to_string(),
        object: "chat.completion",
        model: model.to_string(),
        choices: vec![ResponseChoice {
            index: 0,
            message: ResponseMessage {
                role: "assistant",
                kind: "error",
                content: message.to_string(),
                annotations: None,
            },
            finish_reason: "error",
        }],
        usage: WireUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
        },
        visited_urls: Vec::new(),
        read_urls: Vec::new(),
        num_urls: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_strips_think_spans_from_assistant_turns() {
        let messages = vec![WireMessage {
            role: "assistant".to_string(),
            content: WireContent::Text("<think>scratch</think>final answer".to_string()),
        }];
        let ingested = ingest_messages(messages);
        assert_eq!(ingested[0].content, "final answer");
    }

    #[test]
    fn ingest_maps_image_url_parts() {
        let messages = vec![WireMessage {
            role: "user".to_string(),
            content: WireContent::Parts(vec![WireContentPart::ImageUrl {
                image_url: WireImageUrl {
                    url: "https://example.com/a.png".to_string(),
                },
            }]),
        }];
        let ingested = ingest_messages(messages);
        assert!(ingested[0].content.contains("\"type\":\"image\""));
    }

    #[test]
    fn opening_chunk_carries_the_think_marker() {
        let chunk = opening_chunk("req-1", "deepresearch");
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("<think>"));
        assert_eq!(chunk.choices[0].delta.role, Some("assistant"));
    }
}
