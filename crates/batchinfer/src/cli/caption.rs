//! The `batchinfer caption` command.

use batchinfer_core::tasks::caption::{self, CaptionOptions};
use batchinfer_core::tasks::RunContext;
use batchinfer_core::{Config, LlmProviderFactory};
use clap::Args;
use std::path::PathBuf;

use super::StatusArgs;

/// Arguments for the `caption` command.
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Folder of images to caption
    #[arg(short = 'i', long = "image-folder", alias = "image_folder")]
    pub image_folder: PathBuf,

    /// LLM model name (provider-specific)
    #[arg(short, long)]
    pub model: Option<String>,

    /// LLM provider: ollama, openai, anthropic or hyperbolic
    #[arg(long)]
    pub provider: Option<String>,

    /// Caption prompt
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Existing folder for `<dataset-name>.ndjson`
    #[arg(short = 'o', long = "output-dir", alias = "output_dir")]
    pub output_dir: PathBuf,

    /// Name of the output file, without extension
    #[arg(short = 'd', long = "dataset-name", alias = "dataset_name")]
    pub dataset_name: String,

    #[command(flatten)]
    pub status: StatusArgs,
}

/// Execute the caption command.
pub async fn execute(args: CaptionArgs, config: &Config) -> anyhow::Result<()> {
    let provider_name = args
        .provider
        .as_deref()
        .unwrap_or(&config.captioning.provider);
    let model = args.model.as_deref().or(config.captioning.model.as_deref());
    let provider = LlmProviderFactory::create(provider_name, &config.llm, model, None)?;

    let options = CaptionOptions {
        image_folder: args.image_folder,
        output_dir: args.output_dir,
        dataset_name: args.dataset_name,
        prompt: args
            .prompt
            .unwrap_or_else(|| config.captioning.default_prompt.clone()),
        max_tokens: config.captioning.max_tokens,
    };
    let ctx = RunContext::new(config, args.status.reporter(config));

    caption::run(&options, provider.as_ref(), &ctx).await?;
    Ok(())
}
