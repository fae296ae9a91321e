//! OpenAI Chat Completions provider.
//!
//! Images are sent as a data URL in the user message content array. Any
//! OpenAI-compatible service (Hyperbolic) reuses this provider with its own
//! base URL and name.

use super::http::{non_empty, send_json};
use super::provider::{LlmProvider, LlmRequest, LlmResponse};
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider for the Chat Completions API and compatible services.
pub struct OpenAiProvider {
    name: &'static str,
    api_key: String,
    model: String,
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::compatible("openai", OPENAI_BASE_URL, api_key, model)
    }

    /// A provider for an OpenAI-compatible service rooted at `base_url`.
    pub fn compatible(name: &'static str, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            name,
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        }
    }
}

#[derive(Serialize)]
struct Body<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Turn; 1],
}

#[derive(Serialize)]
struct Turn {
    role: &'static str,
    content: Vec<Part>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Part {
    ImageUrl { image_url: Url },
    Text { text: String },
}

#[derive(Serialize)]
struct Url {
    url: String,
}

#[derive(Deserialize)]
struct Reply {
    choices: Vec<Choice>,
    model: String,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

fn build_body<'a>(model: &'a str, request: &LlmRequest) -> Body<'a> {
    let image = request.image.as_ref().map(|image| Part::ImageUrl {
        image_url: Url {
            url: image.data_url(),
        },
    });
    let content = image
        .into_iter()
        .chain(std::iter::once(Part::Text {
            text: request.prompt.clone(),
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
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
        let start = Instant::now();
        let http = self.client.post(&self.endpoint).bearer_auth(&self.api_key);
        let reply: Reply = send_json(
            http,
            self.name,
            &build_body(&self.model, request),
            self.timeout(),
        )
        .await?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(LlmResponse {
            text: non_empty(&content, &reply.model)?,
            tokens_used: reply.usage.map(|u| u.total_tokens),
            model: reply.model,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }
}
