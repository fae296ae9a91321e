//! The `LlmProvider` seam and the factory that picks a backend.
//!
//! Captioning sends one image plus a prompt; text classification sends a
//! prompt alone. Both go through the same trait so the run loops can be
//! tested with fakes.

use crate::config::{AnthropicConfig, HyperbolicConfig, LlmConfig, OllamaConfig, OpenAiConfig};
use crate::error::PipelineError;
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use super::anthropic::AnthropicProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAiProvider;

/// An encoded image, base64'd for a JSON request body.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub data: String,
    pub media_type: String,
}

impl ImageInput {
    pub fn jpeg(bytes: &[u8]) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: "image/jpeg".to_string(),
        }
    }

    /// `data:<media type>;base64,<data>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// One prompt, optionally conditioned on an image.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub image: Option<ImageInput>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmRequest {
    /// Captioning request. A little temperature keeps captions from collapsing
    /// onto one phrasing.
    pub fn caption(image: ImageInput, prompt: &str, max_tokens: u32) -> Self {
        Self {
            image: Some(image),
            prompt: prompt.to_string(),
            max_tokens,
            temperature: 0.2,
        }
    }

    /// Text-only request, sampled greedily.
    pub fn text(prompt: String, max_tokens: u32) -> Self {
        Self {
            image: None,
            prompt,
            max_tokens,
            temperature: 0.0,
        }
    }
}

/// What a provider returns. `text` is already trimmed and non-empty.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    /// Model that answered, as reported by the backend
    pub model: String,
    /// Prompt plus completion tokens, when the backend reports them
    pub tokens_used: Option<u32>,
    pub latency_ms: u64,
}

/// A remote or local LLM.
///
/// `async_trait` keeps the trait object-safe for `Box<dyn LlmProvider>`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError>;

    /// HTTP timeout for one request.
    fn timeout(&self) -> Duration;
}

/// Resolve a config string that may be a `${ENV_VAR}` reference.
///
/// Empty strings and unset variables resolve to `None`.
pub fn resolve_env_var(value: &str) -> Option<String> {
    match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(var) => std::env::var(var).ok().filter(|v| !v.is_empty()),
        None if value.is_empty() => None,
        None => Some(value.to_string()),
    }
}

pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Build the provider named `provider` ("ollama", "anthropic", "openai",
    /// "hyperbolic") from its `[llm.*]` section.
    ///
    /// `model_override` replaces the section's model. `api_key_override` is a
    /// session key (`--apikey`) that wins over the configured one.
    pub fn create(
        provider: &str,
        config: &LlmConfig,
        model_override: Option<&str>,
        api_key_override: Option<&str>,
    ) -> Result<Box<dyn LlmProvider>, PipelineError> {
        let model = |configured: String| model_override.map_or(configured, String::from);
        let key = |configured: &str, env_hint: &str| {
            api_key_override
                .filter(|k| !k.is_empty())
                .map(String::from)
                .or_else(|| resolve_env_var(configured))
                .ok_or_else(|| PipelineError::Llm {
                    message: format!("{provider} API key not set. Set {env_hint} or pass --apikey."),
                    status_code: None,
                })
        };

        let created: Box<dyn LlmProvider> = match provider {
            "ollama" => {
                let OllamaConfig {
                    endpoint,
                    model: default_model,
                } = config.ollama.clone().unwrap_or_default();
                Box::new(OllamaProvider::new(&endpoint, &model(default_model)))
            }
            "anthropic" => {
                let AnthropicConfig {
                    api_key,
                    model: default_model,
                } = config.anthropic.clone().unwrap_or_default();
                let api_key = key(&api_key, "ANTHROPIC_API_KEY")?;
                Box::new(AnthropicProvider::new(&api_key, &model(default_model)))
            }
            "openai" => {
                let OpenAiConfig {
                    api_key,
                    model: default_model,
                } = config.openai.clone().unwrap_or_default();
                let api_key = key(&api_key, "OPENAI_API_KEY")?;
                Box::new(OpenAiProvider::new(&api_key, &model(default_model)))
            }
            "hyperbolic" => {
                let HyperbolicConfig {
                    endpoint,
                    api_key,
                    model: default_model,
                } = config.hyperbolic.clone().unwrap_or_default();
                let api_key = key(&api_key, "HYPERBOLIC_API_KEY")?;
                Box::new(OpenAiProvider::compatible(
                    "hyperbolic",
                    &endpoint,
                    &api_key,
                    &model(default_model),
                ))
            }
            other => {
                return Err(PipelineError::Llm {
                    message: format!(
                        "Unknown LLM provider: {other}. Expected ollama, anthropic, openai or hyperbolic."
                    ),
                    status_code: None,
                })
            }
        };

        tracing::debug!("Using LLM provider {}", created.name());
        Ok(created)
    }
}
