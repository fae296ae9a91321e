//! The `batchinfer clip` command.

use batchinfer_core::tasks::clip_label::{self, ClipOptions};
use batchinfer_core::tasks::{ensure_output_dir, RunContext};
use batchinfer_core::vision::clip::{variant_installed, CLIP_VARIANTS};
use batchinfer_core::{Config, SetupError};
use clap::Args;
use std::path::PathBuf;

use super::StatusArgs;

/// Arguments for the `clip` command.
#[derive(Args, Debug)]
pub struct ClipArgs {
    /// List known CLIP models and whether they are installed, then exit
    #[arg(short = 'a', long = "available-models", alias = "available_models")]
    pub available_models: bool,

    /// Built-in or installed dataset whose classes to score (e.g. CIFAR10)
    #[arg(short, long)]
    pub dataset: Option<String>,

    /// CLIP model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Existing folder for the per-image `<stem>.json` files
    #[arg(short = 'o', long = "output-dir", alias = "output_dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Comma-separated class names
    #[arg(short, long)]
    pub categories: Option<String>,

    /// Images to label
    #[arg(short, long, num_args = 1..)]
    pub images: Vec<PathBuf>,

    #[command(flatten)]
    pub status: StatusArgs,
}

/// Execute the clip command.
pub async fn execute(args: ClipArgs, config: &Config) -> anyhow::Result<()> {
    if args.available_models {
        print_available(config);
        return Ok(());
    }

    let classes = clip_label::resolve_classes(
        args.dataset.as_deref(),
        args.categories.as_deref(),
        &config.datasets_dir(),
    )?;
    let variant = clip_label::resolve_model(config, args.model.as_deref())?;
    if args.images.is_empty() {
        return Err(SetupError::NoImages.into());
    }
    ensure_output_dir(&args.output_dir)?;

    tracing::info!("Loading {} ({} classes)", variant.name, classes.len());
    let model = clip_label::load_model(config, variant)?;

    let options = ClipOptions {
        images: args.images,
        output_dir: args.output_dir,
        classes,
        label_template: config.clip.label_template.clone(),
        top_k_log: config.clip.top_k_log,
    };
    let ctx = RunContext::new(config, args.status.reporter(config));

    clip_label::run(&options, &model, &ctx).await?;
    Ok(())
}

fn print_available(config: &Config) {
    let clip_dir = config.clip_dir();
    println!("Available CLIP models:");
    println!("  Directory: {}\n", clip_dir.display());
    for variant in CLIP_VARIANTS {
        let status = if variant_installed(&clip_dir.join(variant.name)) {
            "ready"
        } else {
            "not installed"
        };
        println!("    - {:30} {}", variant.name, status);
    }
}
