//! Text-to-image generation for a list of prompts.
//!
//! Each image is saved as `<output>/<id>-<sanitized prompt>.jpeg`.

use std::path::{Path, PathBuf};

use super::{ensure_output_dir, RunContext};
use crate::error::BatchError;
use crate::generation::{make_filename, save_jpeg, GenerationRequest, ImageGenerator};
use crate::input::PromptItem;
use crate::retry::with_retry;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub output_dir: PathBuf,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    /// Timeout for one generation call
    pub timeout_ms: u64,
}

/// Generate one image per prompt. Returns the number of images saved.
pub async fn run(
    prompts: &[PromptItem],
    options: &GenerateOptions,
    generator: &dyn ImageGenerator,
    ctx: &RunContext,
) -> Result<usize, BatchError> {
    ensure_output_dir(&options.output_dir)?;

    let mut done = 0usize;
    for item in prompts {
        if item.prompt.is_empty() {
            tracing::debug!("Skipping prompt {}: empty text", item.id);
            continue;
        }
        tracing::debug!("Generating {:?}", item);

        let request = GenerationRequest {
            prompt: item.prompt.clone(),
            negative_prompt: item.negative.clone(),
            steps: options.steps,
            width: options.width,
            height: options.height,
        };
        let bytes = match with_retry(
            &ctx.retry,
            options.timeout_ms,
            Path::new(&item.id),
            generator.name(),
            || generator.generate(&request),
        )
        .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Generation failed for prompt {}: {e}", item.id);
                continue;
            }
        };

        let path = options.output_dir.join(make_filename(&item.id, &item.prompt));
        if let Err(e) = save_jpeg(&bytes, &path) {
            tracing::warn!("Could not save image for prompt {}: {e}", item.id);
            continue;
        }

        done += 1;
        ctx.status
            .report(&format!("Generated {done} image(s)"), Some(done as u64))
            .await;
    }

    Ok(done)
}
