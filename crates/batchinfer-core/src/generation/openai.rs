//! OpenAI Images backend (`POST /images/generations`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{decode_base64_image, GenerationRequest, ImageGenerator};
use crate::config::OpenAiImagesConfig;
use crate::error::PipelineError;
use crate::retry::send_failure;

pub struct OpenAiImageGenerator {
    url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    warned_negative: AtomicBool,
}

impl OpenAiImageGenerator {
    pub fn new(config: &OpenAiImagesConfig, api_key: &str) -> Self {
        Self {
            url: format!(
                "{}/images/generations",
                config.endpoint.trim_end_matches('/')
            ),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            client: reqwest::Client::new(),
            warned_negative: AtomicBool::new(false),
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> ImagesRequest {
        if !request.negative_prompt.is_empty() && !self.warned_negative.swap(true, Ordering::Relaxed)
        {
            tracing::warn!("OpenAI Images does not support negative prompts; ignoring them");
        }
        ImagesRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            n: 1,
            size: format!("{}x{}", request.width, request.height),
            response_format: "b64_json".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ImagesRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    response_format: String,
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, PipelineError> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| PipelineError::Generation {
                message: format!("OpenAI Images request {}: {e}", send_failure(&e)),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Generation {
                message: format!("OpenAI Images HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let body: ImagesResponse = resp.json().await.map_err(|e| PipelineError::Generation {
            message: format!("Failed to parse OpenAI Images response: {e}"),
            status_code: None,
        })?;

        let payload = body
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or_else(|| PipelineError::Generation {
                message: "OpenAI Images returned no image data".to_string(),
                status_code: None,
            })?;
        decode_base64_image(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_requests_base64() {
        let generator = OpenAiImageGenerator::new(&OpenAiImagesConfig::default(), "sk-test");
        assert_eq!(generator.url, "https://api.openai.com/v1/images/generations");

        let request = GenerationRequest {
            prompt: "a fox".to_string(),
            negative_prompt: "text".to_string(),
            steps: 40,
            width: 1024,
            height: 1792,
        };
        let json = serde_json::to_value(generator.build_body(&request)).unwrap();
        assert_eq!(json["response_format"], "b64_json");
        assert_eq!(json["size"], "1024x1792");
        assert_eq!(json["model"], "dall-e-3");
        assert!(json.get("negative_prompt").is_none());
        assert!(generator.warned_negative.load(Ordering::Relaxed));
    }
}
