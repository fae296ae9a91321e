//! batchinfer core - batch inference over folders and files of inputs.
//!
//! Each command wraps a pretrained model and runs it over a batch of inputs,
//! writing one result record per item:
//!
//! ```text
//! validate paths → load model → for each item: run model (skip failures) → write record → report status
//! ```
//!
//! Image classification and CLIP labeling run locally through ONNX Runtime.
//! Captioning and text classification call a vision-language or chat LLM.
//! Image generation calls a Stable Diffusion WebUI or the OpenAI Images API.
//!
//! # Usage
//!
//! ```rust,ignore
//! use batchinfer_core::tasks::{caption, RunContext};
//! use batchinfer_core::{Config, LlmProviderFactory, StatusReporter};
//!
//! #[tokio::main]
//! async fn main() -> batchinfer_core::Result<()> {
//!     let config = Config::load()?;
//!     let provider = LlmProviderFactory::create("ollama", &config.llm, None, None)?;
//!     let ctx = RunContext::new(&config, StatusReporter::local());
//!     let options = caption::CaptionOptions {
//!         image_folder: "./photos".into(),
//!         output_dir: "./out".into(),
//!         dataset_name: "photos".into(),
//!         prompt: config.captioning.default_prompt.clone(),
//!         max_tokens: config.captioning.max_tokens,
//!     };
//!     caption::run(&options, provider.as_ref(), &ctx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod generation;
pub mod input;
pub mod llm;
pub mod math;
pub mod output;
pub mod retry;
pub mod status;
pub mod tasks;
pub mod vision;

pub use config::Config;
pub use error::{BatchError, ConfigError, PipelineError, PipelineResult, Result, SetupError};
pub use llm::{LlmProvider, LlmProviderFactory};
pub use output::{JsonObjectWriter, NdjsonWriter};
pub use status::StatusReporter;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
