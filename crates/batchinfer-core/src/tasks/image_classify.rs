//! Multi-head image classification.
//!
//! Each enabled classifier contributes a `{label: score}` map with the labels
//! that score above the threshold. Output is one NDJSON line per image:
//! `{"<file>": {"<classifier>": {"<label>": score}}}`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use super::{ensure_output_dir, RunContext};
use crate::config::Config;
use crate::error::{BatchError, SetupError};
use crate::input::{file_name, list_folder};
use crate::output::NdjsonWriter;
use crate::vision::{above_threshold, ImageLabeler, OnnxImageClassifier};

#[derive(Debug, Clone)]
pub struct ClassifyImagesOptions {
    pub image_folder: PathBuf,
    pub output_dir: PathBuf,
    pub dataset_name: String,
    /// Labels must score strictly above this
    pub threshold: f32,
}

/// Load the named classifiers from the model directory.
pub fn load_classifiers(
    config: &Config,
    names: &[&str],
) -> Result<Vec<Box<dyn ImageLabeler>>, SetupError> {
    if names.is_empty() {
        return Err(SetupError::NoClassifiers);
    }

    names
        .iter()
        .map(|name| {
            let spec = config
                .image_classification
                .classifier(name)
                .ok_or_else(|| SetupError::UnknownModel(name.to_string()))?;
            tracing::info!("Loading {} classifier ({})", spec.name, spec.model_name);
            let classifier =
                OnnxImageClassifier::load(&spec.name, &config.classifier_dir().join(&spec.name))
                    .map_err(|e| SetupError::Backend(e.to_string()))?;
            Ok(Box::new(classifier) as Box<dyn ImageLabeler>)
        })
        .collect()
}

/// Classify every image in the folder. Returns the number of records written.
pub async fn run(
    options: &ClassifyImagesOptions,
    classifiers: &[Box<dyn ImageLabeler>],
    ctx: &RunContext,
) -> Result<usize, BatchError> {
    ensure_output_dir(&options.output_dir)?;
    if classifiers.is_empty() {
        return Err(SetupError::NoClassifiers.into());
    }
    let images = list_folder(&options.image_folder)?;

    let output_path = options
        .output_dir
        .join(format!("{}.ndjson", options.dataset_name));
    let mut writer = NdjsonWriter::new(BufWriter::new(File::create(&output_path)?));

    'images: for path in &images {
        let name = file_name(path);

        let image = match ctx.loader.load(path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Unable to open image {name}: {e}");
                continue;
            }
        };
        if image.is_single_pixel() {
            tracing::debug!("Skipping {name}: 1x1 tracking pixel");
            continue;
        }

        let mut metadata: BTreeMap<String, BTreeMap<String, f32>> = BTreeMap::new();
        for classifier in classifiers {
            match classifier.classify(&image.image) {
                Ok(scores) => {
                    metadata.insert(
                        classifier.name().to_string(),
                        above_threshold(scores, options.threshold),
                    );
                }
                Err(e) => {
                    tracing::warn!("{} failed on {name}: {e}", classifier.name());
                    continue 'images;
                }
            }
        }

        writer.write_keyed(&name, &metadata)?;
        writer.flush()?;

        let done = writer.records_written();
        ctx.status
            .report(&format!("Processed {done} images"), Some(done as u64))
            .await;
    }

    writer.flush()?;
    Ok(writer.records_written())
}
