//! Ollama provider using the `/api/chat` endpoint.
//!
//! Serves both captioning (vision models such as llava) and text
//! classification from a local instance. No authentication.

use super::http::{non_empty, send_json};
use super::provider::{LlmProvider, LlmRequest, LlmResponse};
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [Message<'a>; 1],
    stream: bool,
    options: Options,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
    /// Base64 images, without a data-URL prefix
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
}

#[derive(Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatReply {
    message: ReplyMessage,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

fn build_body<'a>(model: &'a str, request: &'a LlmRequest) -> ChatBody<'a> {
    ChatBody {
        model,
        messages: [Message {
            role: "user",
            content: &request.prompt,
            images: request.image.iter().map(|i| i.data.as_str()).collect(),
        }],
        stream: false,
        options: Options {
            temperature: request.temperature,
            num_predict: request.max_tokens,
        },
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
        let start = Instant::now();
        let http = self.client.post(format!("{}/api/chat", self.endpoint));
        let reply: ChatReply = send_json(
            http,
            "Ollama",
            &build_body(&self.model, request),
            self.timeout(),
        )
        .await?;

        Ok(LlmResponse {
            text: non_empty(&reply.message.content, &self.model)?,
            model: reply.model.unwrap_or_else(|| self.model.clone()),
            tokens_used: reply
                .prompt_eval_count
                .zip(reply.eval_count)
                .map(|(prompt, output)| prompt + output),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        // Local vision models on CPU are slow.
        Duration::from_secs(120)
    }
}
