//! CLIP zero-shot labeling of individual images.
//!
//! Each image gets its own `<output>/<stem>.json` with every class ranked
//! by probability, or an error entry when the image can't be read.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{ensure_output_dir, RunContext};
use crate::config::Config;
use crate::error::{BatchError, PipelineError, SetupError};
use crate::input::file_name;
use crate::output::write_json_file;
use crate::vision::clip::{self, ClipModel, ClipVariant};
use crate::vision::{dataset_classes, parse_categories, rank_classes, ZeroShotScorer};

#[derive(Debug, Clone)]
pub struct ClipOptions {
    pub images: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub classes: Vec<String>,
    /// Prompt template; `{}` is replaced with the class name
    pub label_template: String,
    /// Predictions echoed to the log per image
    pub top_k_log: usize,
}

/// Contents of a per-image result file.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ClipResult {
    Predictions {
        filename: String,
        predictions: Vec<(String, f32)>,
    },
    Error {
        filename: String,
        error: String,
    },
}

/// Resolve the class list from exactly one of `--dataset` or `--categories`.
pub fn resolve_classes(
    dataset: Option<&str>,
    categories: Option<&str>,
    datasets_dir: &Path,
) -> Result<Vec<String>, SetupError> {
    let dataset = dataset.filter(|d| !d.is_empty());
    let categories = categories.filter(|c| !c.is_empty());
    match (dataset, categories) {
        (Some(_), Some(_)) => Err(SetupError::ConflictingCategories),
        (Some(name), None) => dataset_classes(name, datasets_dir),
        (None, Some(list)) => {
            let classes = parse_categories(list);
            if classes.is_empty() {
                Err(SetupError::MissingCategories)
            } else {
                Ok(classes)
            }
        }
        (None, None) => Err(SetupError::MissingCategories),
    }
}

/// Check that `name` is a known variant installed under the model directory.
pub fn resolve_model(config: &Config, name: Option<&str>) -> Result<&'static ClipVariant, SetupError> {
    let name = name
        .filter(|n| !n.is_empty())
        .ok_or(SetupError::MissingModel)?;
    let not_installed = || SetupError::ModelNotInstalled {
        name: name.to_string(),
        available: clip::installed_variants(&config.clip_dir()),
    };

    let variant = clip::variant(name).ok_or_else(not_installed)?;
    if !clip::variant_installed(&config.clip_dir().join(variant.name)) {
        return Err(not_installed());
    }
    Ok(variant)
}

/// Load a resolved variant.
pub fn load_model(config: &Config, variant: &ClipVariant) -> Result<ClipModel, SetupError> {
    ClipModel::load(&config.clip_dir().join(variant.name), variant.image_size)
        .map_err(|e| SetupError::Backend(e.to_string()))
}

fn label_image(
    path: &Path,
    ctx: &RunContext,
    scorer: &dyn ZeroShotScorer,
    text_features: &[Vec<f32>],
    classes: &[String],
) -> Result<Vec<(String, f32)>, PipelineError> {
    let image = ctx.loader.load(path)?;
    let features = scorer.encode_image(&image.image)?;
    Ok(rank_classes(&features, text_features, classes))
}

/// Label each image in order. Returns the number of result files written.
pub async fn run(
    options: &ClipOptions,
    scorer: &dyn ZeroShotScorer,
    ctx: &RunContext,
) -> Result<usize, BatchError> {
    ensure_output_dir(&options.output_dir)?;
    if options.images.is_empty() {
        return Err(SetupError::NoImages.into());
    }

    let prompts: Vec<String> = options
        .classes
        .iter()
        .map(|c| options.label_template.replacen("{}", c, 1))
        .collect();
    let text_features = scorer.encode_texts(&prompts)?;

    for (i, path) in options.images.iter().enumerate() {
        let name = file_name(path);

        let result = if path.is_file() {
            match label_image(path, ctx, scorer, &text_features, &options.classes) {
                Ok(predictions) => {
                    tracing::info!("Top predictions for {name}:");
                    for (class, prob) in predictions.iter().take(options.top_k_log) {
                        tracing::info!("{class:>16}: {:.2}%", prob * 100.0);
                    }
                    ClipResult::Predictions {
                        filename: name.clone(),
                        predictions,
                    }
                }
                Err(e) => {
                    let error = format!("Invalid image path {}: {e}", path.display());
                    tracing::warn!("{error}");
                    ClipResult::Error {
                        filename: name.clone(),
                        error,
                    }
                }
            }
        } else {
            let error = format!("Invalid image path {}", path.display());
            tracing::warn!("{error}");
            ClipResult::Error {
                filename: name.clone(),
                error,
            }
        };

        let output_name = Path::new(&name).with_extension("json");
        write_json_file(&options.output_dir.join(output_name), &result)?;

        let done = i + 1;
        ctx.status
            .report(&format!("Processed {done} images"), Some(done as u64))
            .await;
    }

    Ok(options.images.len())
}
