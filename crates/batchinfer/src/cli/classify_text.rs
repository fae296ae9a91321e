//! The `batchinfer classify-text` command.

use batchinfer_core::input::LabelSet;
use batchinfer_core::tasks::text_classify::{self, ClassifyTextOptions, Completion, PromptClassifier};
use batchinfer_core::{Config, LlmProviderFactory, SetupError};
use clap::Args;
use std::path::PathBuf;

use super::StatusArgs;

/// Arguments for the `classify-text` command.
#[derive(Args, Debug)]
pub struct ClassifyTextArgs {
    /// Model id from `[text_classification].models`
    #[arg(short, long)]
    pub model: String,

    /// Extra instruction prepended to the classification prompt
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Session API key for the model's provider
    #[arg(short = 'a', long)]
    pub apikey: Option<String>,

    /// NDJSON input, one `{"id": "text", ...}` object per line
    #[arg(short = 'i', long)]
    pub inputfile: PathBuf,

    /// JSON object mapping each label to a list of examples
    #[arg(short = 'l', long)]
    pub labelfile: PathBuf,

    /// Existing folder for `results.json`
    #[arg(short = 'o', long = "output-dir", alias = "output_dir")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub status: StatusArgs,
}

/// Execute the classify-text command.
pub async fn execute(args: ClassifyTextArgs, config: &Config) -> anyhow::Result<()> {
    let entry = config
        .text_classification
        .model(&args.model)
        .ok_or_else(|| SetupError::UnknownModel(args.model.clone()))?;
    if !args.labelfile.exists() {
        return Err(SetupError::LabelFileMissing(args.labelfile).into());
    }
    if !args.inputfile.is_file() {
        return Err(SetupError::InputMissing(args.inputfile).into());
    }
    let labels = LabelSet::load(&args.labelfile)?;

    let provider = LlmProviderFactory::create(
        &entry.provider,
        &config.llm,
        Some(&entry.id),
        args.apikey.as_deref(),
    )?;
    let classifier = PromptClassifier::new(
        provider,
        labels,
        args.prompt.filter(|p| !p.trim().is_empty()),
        config.text_classification.max_tokens,
        config.retry.clone(),
    );

    let options = ClassifyTextOptions {
        input_file: args.inputfile,
        output_dir: args.output_dir,
        batch_size: config.text_classification.batch_size,
    };
    let status = args.status.reporter(config);

    let summary = text_classify::run(&options, &classifier, &status).await?;
    match summary.completion {
        Completion::Finished => {
            tracing::info!("Classified {} items", summary.classified)
        }
        Completion::HaltedOnInput | Completion::HaltedOnModel => tracing::warn!(
            "Halted early after {} items; results so far are in {:?}",
            summary.classified,
            options.output_dir.join("results.json")
        ),
    }
    Ok(())
}
