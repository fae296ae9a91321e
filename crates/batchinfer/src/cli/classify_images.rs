//! The `batchinfer classify-images` command.

use batchinfer_core::tasks::image_classify::{self, ClassifyImagesOptions};
use batchinfer_core::tasks::{ensure_output_dir, RunContext};
use batchinfer_core::Config;
use clap::Args;
use std::path::PathBuf;

use super::StatusArgs;

/// Arguments for the `classify-images` command.
#[derive(Args, Debug)]
pub struct ClassifyImagesArgs {
    /// Folder of images to classify
    #[arg(short = 'i', long = "image-folder", alias = "image_folder")]
    pub image_folder: PathBuf,

    /// Run the general ImageNet feature classifier
    #[arg(short = 'f', long = "with-features", alias = "with_features")]
    pub with_features: bool,

    /// Run the celebrity classifier
    #[arg(short = 'c', long = "with-celebrities", alias = "with_celebrities")]
    pub with_celebrities: bool,

    /// Run the NSFW classifier
    #[arg(short = 'n', long = "with-nsfw", alias = "with_nsfw")]
    pub with_nsfw: bool,

    /// Existing folder for `<dataset-name>.ndjson`
    #[arg(short = 'o', long = "output-dir", alias = "output_dir")]
    pub output_dir: PathBuf,

    /// Name of the output file, without extension
    #[arg(short = 'd', long = "dataset-name", alias = "dataset_name")]
    pub dataset_name: String,

    /// Keep labels scoring above this (defaults to the configured threshold)
    #[arg(short = 't', long = "label-threshold", alias = "label_threshold")]
    pub label_threshold: Option<f32>,

    #[command(flatten)]
    pub status: StatusArgs,
}

impl ClassifyImagesArgs {
    /// Classifier names in a fixed order.
    fn enabled(&self) -> Vec<&'static str> {
        [
            (self.with_features, "features"),
            (self.with_celebrities, "celebrities"),
            (self.with_nsfw, "nsfw"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

/// Execute the classify-images command.
pub async fn execute(args: ClassifyImagesArgs, config: &Config) -> anyhow::Result<()> {
    let threshold = args
        .label_threshold
        .unwrap_or(config.image_classification.label_threshold);
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("--label-threshold must be between 0 and 1, got {threshold}");
    }

    // Fail on a missing output folder before paying for model loading.
    ensure_output_dir(&args.output_dir)?;
    let classifiers = image_classify::load_classifiers(config, &args.enabled())?;

    let options = ClassifyImagesOptions {
        image_folder: args.image_folder.clone(),
        output_dir: args.output_dir.clone(),
        dataset_name: args.dataset_name.clone(),
        threshold,
    };
    let ctx = RunContext::new(config, args.status.reporter(config));

    let written = image_classify::run(&options, &classifiers, &ctx).await?;
    tracing::info!("Wrote {written} records to {:?}", args.output_dir);
    Ok(())
}
