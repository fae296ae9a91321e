//! Anthropic Messages API provider.

use super::http::{non_empty, send_json};
use super::provider::{LlmProvider, LlmRequest, LlmResponse};
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct Body<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Turn<'a>; 1],
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: Vec<Block<'a>>,
}

/// Image blocks go before the text block.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Block<'a> {
    Image { source: Source<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct Source<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct Reply {
    content: Vec<ReplyBlock>,
    model: String,
    usage: Usage,
}

#[derive(Deserialize)]
struct ReplyBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

fn build_body<'a>(model: &'a str, request: &'a LlmRequest) -> Body<'a> {
    let image = request.image.as_ref().map(|image| Block::Image {
        source: Source {
            kind: "base64",
            media_type: &image.media_type,
            data: &image.data,
        },
    });
    let content = image
        .into_iter()
        .chain(std::iter::once(Block::Text {
            text: &request.prompt,
        }))
        .collect();

    Body {
        model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        messages: [Turn {
            role: "user",
            content,
        }],
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
        let start = Instant::now();
        let http = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION);
        let reply: Reply = send_json(
            http,
            "Anthropic",
            &build_body(&self.model, request),
            self.timeout(),
        )
        .await?;

        let joined: String = reply.content.into_iter().filter_map(|b| b.text).collect();
        Ok(LlmResponse {
            text: non_empty(&joined, &reply.model)?,
            tokens_used: Some(reply.usage.input_tokens + reply.usage.output_tokens),
            model: reply.model,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ImageInput;

    #[test]
    fn test_image_block_uses_base64_source() {
        let request = LlmRequest::caption(ImageInput::jpeg(&[1, 2, 3]), "caption", 20);
        let json = serde_json::to_value(build_body("claude", &request)).unwrap();
        let block = &json["messages"][0]["content"][0];
        assert_eq!(block["type"], "image");
        assert_eq!(block["source"]["type"], "base64");
        assert_eq!(block["source"]["media_type"], "image/jpeg");
        assert_eq!(json["messages"][0]["content"][1]["type"], "text");
    }

    #[test]
    fn test_text_only_body() {
        let request = LlmRequest::text("pick a label".to_string(), 8);
        let json = serde_json::to_value(build_body("claude", &request)).unwrap();
        let content = json["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["text"], "pick a label");
        assert_eq!(json["max_tokens"], 8);
    }

    #[test]
    fn test_reply_joins_text_blocks() {
        let reply: Reply = serde_json::from_str(
            r#"{"model": "claude", "content": [{"type": "text", "text": "a "},
                {"type": "text", "text": "cat"}], "usage": {"input_tokens": 3, "output_tokens": 2}}"#,
        )
        .unwrap();
        let joined: String = reply.content.into_iter().filter_map(|b| b.text).collect();
        assert_eq!(joined, "a cat");
    }
}
