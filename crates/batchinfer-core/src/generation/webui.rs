//! Stable Diffusion WebUI backend (`POST /sdapi/v1/txt2img`).
//!
//! The base checkpoint runs the first `refiner_switch_at` fraction of the
//! steps and the refiner checkpoint finishes the rest.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{decode_base64_image, GenerationRequest, ImageGenerator};
use crate::config::WebUiConfig;
use crate::error::PipelineError;
use crate::retry::send_failure;

pub struct WebUiGenerator {
    url: String,
    checkpoint: Option<String>,
    refiner_checkpoint: Option<String>,
    refiner_switch_at: f32,
    client: reqwest::Client,
}

impl WebUiGenerator {
    pub fn new(config: &WebUiConfig, refiner_switch_at: f32) -> Self {
        Self {
            url: format!(
                "{}/sdapi/v1/txt2img",
                config.endpoint.trim_end_matches('/')
            ),
            checkpoint: config.checkpoint.clone(),
            refiner_checkpoint: config.refiner_checkpoint.clone(),
            refiner_switch_at,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> Txt2ImgRequest {
        let refiner = self.refiner_checkpoint.clone();
        Txt2ImgRequest {
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            steps: request.steps,
            width: request.width,
            height: request.height,
            refiner_switch_at: refiner.as_ref().map(|_| self.refiner_switch_at),
            refiner_checkpoint: refiner,
            override_settings: self.checkpoint.clone().map(|sd_model_checkpoint| {
                OverrideSettings {
                    sd_model_checkpoint,
                }
            }),
        }
    }
}

#[derive(Serialize)]
struct Txt2ImgRequest {
    prompt: String,
    negative_prompt: String,
    steps: u32,
    width: u32,
    height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    refiner_checkpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refiner_switch_at: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    override_settings: Option<OverrideSettings>,
}

#[derive(Serialize)]
struct OverrideSettings {
    sd_model_checkpoint: String,
}

#[derive(Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

#[async_trait]
impl ImageGenerator for WebUiGenerator {
    fn name(&self) -> &str {
        "webui"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, PipelineError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| PipelineError::Generation {
                message: format!("WebUI request {}: {e}", send_failure(&e)),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Generation {
                message: format!("WebUI HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let body: Txt2ImgResponse = resp.json().await.map_err(|e| PipelineError::Generation {
            message: format!("Failed to parse WebUI response: {e}"),
            status_code: None,
        })?;

        let first = body
            .images
            .first()
            .ok_or_else(|| PipelineError::Generation {
                message: "WebUI returned no images".to_string(),
                status_code: None,
            })?;
        decode_base64_image(first)
    }
}
