//! batchinfer CLI - batch inference over folders and files of inputs.
//!
//! Each command wraps one pretrained model: it reads a folder or file,
//! runs the model item by item, and writes NDJSON/JSON/JPEG results into
//! an existing output directory.
//!
//! # Usage
//!
//! ```bash
//! # Caption every image in a folder
//! batchinfer caption -i ./photos -o ./out -d holiday
//!
//! # Classify images with the NSFW head
//! batchinfer classify-images -i ./photos -o ./out -d holiday --with-nsfw
//!
//! # Zero-shot CLIP labels for a few images
//! batchinfer clip -m clip-vit-base-patch32 -d CIFAR10 -i a.jpg b.jpg
//!
//! # Manage models
//! batchinfer models download --clip clip-vit-base-patch32 --classifiers
//! ```

use std::path::PathBuf;

use batchinfer_core::Config;
use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// batchinfer - batch inference commands for images and text.
#[derive(Parser, Debug)]
#[command(name = "batchinfer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "BATCHINFER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Caption every image in a folder with a vision LLM
    Caption(cli::caption::CaptionArgs),

    /// Classify images with one or more ONNX classification heads
    ClassifyImages(cli::classify_images::ClassifyImagesArgs),

    /// Classify NDJSON text records into a label set (zero/few-shot)
    ClassifyText(cli::classify_text::ClassifyTextArgs),

    /// Zero-shot label images against a class list with CLIP
    Clip(cli::clip::ClipArgs),

    /// Generate images from text prompts
    Generate(cli::generate::GenerateArgs),

    /// Manage local models (download, list, etc.)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `batchinfer config path`."
            );
            Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("batchinfer v{}", batchinfer_core::VERSION);

    match cli.command {
        Commands::Caption(args) => cli::caption::execute(args, &config).await,
        Commands::ClassifyImages(args) => cli::classify_images::execute(args, &config).await,
        Commands::ClassifyText(args) => cli::classify_text::execute(args, &config).await,
        Commands::Clip(args) => cli::clip::execute(args, &config).await,
        Commands::Generate(args) => cli::generate::execute(args, &config).await,
        Commands::Models(args) => cli::models::execute(args, &config).await,
        Commands::Config(args) => cli::config::execute(args, &config, cli.config.as_deref()).await,
    }
}
