//! The `batchinfer models` command for managing local ONNX models.
//!
//! Layout under the model directory:
//!
//! ```text
//! clip/<variant>/{visual.onnx, text_model.onnx, tokenizer.json}
//! classifiers/<name>/{model.onnx, config.json, preprocessor_config.json}
//! ```

use batchinfer_core::config::ClassifierSpec;
use batchinfer_core::vision::clip::{self, ClipVariant, CLIP_FILES, CLIP_VARIANTS};
use batchinfer_core::vision::OnnxImageClassifier;
use batchinfer_core::Config;
use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download ONNX exports from Hugging Face (default CLIP model and all
    /// classifiers when no selection is given)
    Download {
        /// CLIP variant(s) to download
        #[arg(long = "clip", value_name = "VARIANT")]
        clip: Vec<String>,

        /// Download every configured image classifier
        #[arg(long)]
        classifiers: bool,
    },

    /// List known models and whether they are installed
    List,

    /// Show model directory path
    Path,
}

/// Classifier files: local name, path in the repository, required.
const CLASSIFIER_CONFIG_FILES: &[(&str, &str, bool)] = &[
    ("config.json", "config.json", true),
    ("preprocessor_config.json", "preprocessor_config.json", false),
];

fn hf_url(repo: &str, path: &str) -> String {
    format!("https://huggingface.co/{repo}/resolve/main/{path}")
}

/// Resolve `--clip` names, falling back to the configured default.
fn selected_variants(
    names: &[String],
    classifiers: bool,
    config: &Config,
) -> anyhow::Result<Vec<&'static ClipVariant>> {
    let names: Vec<&str> = if names.is_empty() && !classifiers {
        vec![config.clip.default_model.as_str()]
    } else {
        names.iter().map(String::as_str).collect()
    };

    names
        .into_iter()
        .map(|name| {
            clip::variant(name).ok_or_else(|| {
                let known: Vec<_> = CLIP_VARIANTS.iter().map(|v| v.name).collect();
                anyhow::anyhow!("Unknown CLIP model {name}. Known models: {known:?}")
            })
        })
        .collect()
}

/// Download one CLIP variant. Skips files that already exist.
pub async fn download_clip(
    variant: &ClipVariant,
    config: &Config,
    client: &reqwest::Client,
) -> anyhow::Result<()> {
    let variant_dir = config.clip_dir().join(variant.name);
    std::fs::create_dir_all(&variant_dir)?;

    for (local, remote) in CLIP_FILES {
        let dest = variant_dir.join(local);
        if dest.exists() {
            tracing::info!("{} {} already exists at {:?}", variant.name, local, dest);
            continue;
        }
        tracing::info!("Downloading {} {}...", variant.name, local);
        download_file(client, &hf_url(variant.repo, remote), &dest).await?;
    }
    Ok(())
}

/// Download one classifier head. A missing preprocessor config is not fatal.
pub async fn download_classifier(
    spec: &ClassifierSpec,
    config: &Config,
    client: &reqwest::Client,
) -> anyhow::Result<()> {
    let dir = config.classifier_dir().join(&spec.name);
    std::fs::create_dir_all(&dir)?;

    let files = std::iter::once(("model.onnx", spec.remote_path.as_str(), true))
        .chain(CLASSIFIER_CONFIG_FILES.iter().copied());
    for (local, remote, required) in files {
        let dest = dir.join(local);
        if dest.exists() {
            tracing::info!("{} {} already exists at {:?}", spec.name, local, dest);
            continue;
        }
        tracing::info!("Downloading {} ({}) {}...", spec.name, spec.model_name, local);
        match download_file(client, &hf_url(&spec.repo, remote), &dest).await {
            Ok(()) => {}
            Err(e) if !required => {
                tracing::warn!("Skipping optional {local} for {}: {e}", spec.name)
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: &Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Download { clip, classifiers } => {
            let variants = selected_variants(&clip, classifiers, config)?;
            let client = reqwest::Client::new();

            for variant in variants {
                download_clip(variant, config, &client).await?;
            }
            if classifiers || clip.is_empty() {
                for spec in &config.image_classification.classifiers {
                    download_classifier(spec, config, &client).await?;
                }
            }

            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            let model_dir = config.model_dir();
            println!("Models:");
            println!("  Directory: {}\n", model_dir.display());

            println!("  CLIP:");
            for variant in CLIP_VARIANTS {
                let installed = clip::variant_installed(&config.clip_dir().join(variant.name));
                let default_marker = if variant.name == config.clip.default_model {
                    "  (default)"
                } else {
                    ""
                };
                println!(
                    "    - {:30} {:14}{}",
                    variant.name,
                    status_label(installed),
                    default_marker
                );
            }

            println!("\n  Classifiers:");
            for spec in &config.image_classification.classifiers {
                let installed =
                    OnnxImageClassifier::model_exists(&config.classifier_dir().join(&spec.name));
                println!(
                    "    - {:30} {:14}{}",
                    spec.name,
                    status_label(installed),
                    spec.model_name
                );
            }
        }

        ModelsCommand::Path => {
            println!("{}", config.model_dir().display());
        }
    }

    Ok(())
}

fn status_label(installed: bool) -> &'static str {
    if installed {
        "ready"
    } else {
        "not installed"
    }
}

/// Stream a URL to `dest` with a progress bar.
///
/// Writes to `<dest>.part` and renames on success, so an interrupted download
/// is never mistaken for an installed file.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    tracing::debug!("  Source: {url}");
    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let progress = progress_bar(response.content_length(), dest)?;
    let partial = partial_path(dest);
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                progress.abandon();
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e.into());
            }
        };
        file.write_all(&chunk).await?;
        progress.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);
    tokio::fs::rename(&partial, dest).await?;
    progress.finish_and_clear();

    let size = std::fs::metadata(dest)?.len();
    tracing::info!(
        "  Saved {:?} ({:.1} MB)",
        dest,
        size as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn progress_bar(total: Option<u64>, dest: &Path) -> anyhow::Result<ProgressBar> {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let bar = match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
                    )?
                    .progress_chars("#>-"),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {bytes} {msg}")?);
            bar
        }
    };
    bar.set_message(name);
    Ok(bar)
}
