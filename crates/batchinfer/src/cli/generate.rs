//! The `batchinfer generate` command.

use batchinfer_core::generation::create_generator;
use batchinfer_core::input::{load_prompts_file, single_prompt, PromptItem};
use batchinfer_core::tasks::generate::{self, GenerateOptions};
use batchinfer_core::tasks::{ensure_output_dir, RunContext};
use batchinfer_core::{Config, SetupError};
use clap::Args;
use std::path::PathBuf;

use super::StatusArgs;

/// Arguments for the `generate` command.
///
/// `-s` is taken by `--steps` here, so the status server flag is `-m`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// JSON object of `id -> {"prompt": .., "negative": ..}`
    #[arg(short = 'f', long = "prompts-file", alias = "prompts_file")]
    pub prompts_file: Option<PathBuf>,

    /// Single prompt, saved with id 1
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Negative prompt for the single prompt
    #[arg(short = 'n', long = "negative-prompt", alias = "negative_prompt", default_value = "")]
    pub negative_prompt: String,

    /// Denoising steps (defaults to the configured value)
    #[arg(short, long)]
    pub steps: Option<u32>,

    /// Existing folder for the generated JPEGs
    #[arg(short = 'o', long = "output-dir", alias = "output_dir")]
    pub output_dir: PathBuf,

    /// Key of the dataset record to update on the status server
    #[arg(short = 'k', long = "database-key", alias = "database_key")]
    pub database_key: Option<String>,

    /// Base URL of the status server
    #[arg(short = 'm', long = "dmi-sm-server", alias = "dmi_sm_server")]
    pub dmi_sm_server: Option<String>,
}

impl GenerateArgs {
    /// The prompts file wins over `--prompt` when both are given.
    fn prompts(&self) -> Result<Vec<PromptItem>, SetupError> {
        match (&self.prompts_file, &self.prompt) {
            (Some(path), _) => load_prompts_file(path),
            (None, Some(prompt)) => Ok(single_prompt(prompt, &self.negative_prompt)),
            (None, None) => Err(SetupError::MissingPrompt),
        }
    }

    fn status(&self) -> StatusArgs {
        StatusArgs {
            database_key: self.database_key.clone(),
            dmi_sm_server: self.dmi_sm_server.clone(),
        }
    }
}

/// Execute the generate command.
pub async fn execute(args: GenerateArgs, config: &Config) -> anyhow::Result<()> {
    let prompts = args.prompts()?;
    ensure_output_dir(&args.output_dir)?;
    let generator = create_generator(&config.generation)?;

    let options = GenerateOptions {
        output_dir: args.output_dir.clone(),
        steps: args.steps.unwrap_or(config.generation.steps),
        width: config.generation.width,
        height: config.generation.height,
        timeout_ms: config.generation.timeout_ms,
    };
    let ctx = RunContext::new(config, args.status().reporter(config));

    tracing::info!(
        "Generating {} prompt(s) with {} ({} steps)",
        prompts.len(),
        generator.name(),
        options.steps
    );
    generate::run(&prompts, &options, generator.as_ref(), &ctx).await?;
    Ok(())
}
