//! ONNX image classification heads.
//!
//! Each classifier lives in its own directory:
//!
//! ```text
//! <model_dir>/classifiers/<name>/
//!     model.onnx                 logits output, shape [1, num_labels]
//!     config.json                {"id2label": {"0": "...", ...}}
//!     preprocessor_config.json   optional; size, image_mean, image_std
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;
use serde::Deserialize;

use super::preprocess::{preprocess_resize, Normalization};
use crate::error::PipelineError;

/// Something that scores an image against a fixed label set.
///
/// The run loop only sees this trait, so tests can swap in fakes.
pub trait ImageLabeler: Send + Sync {
    /// Short name used as the key in output records.
    fn name(&self) -> &str;

    /// Score every label. Scores sum to 1.
    fn classify(&self, image: &DynamicImage) -> Result<Vec<(String, f32)>, PipelineError>;
}

/// `config.json` as exported by Hugging Face.
#[derive(Deserialize)]
struct ModelConfig {
    id2label: BTreeMap<String, String>,
}

/// `preprocessor_config.json`. `size` is an int or an object depending on the exporter.
#[derive(Deserialize, Default)]
struct PreprocessorConfig {
    size: Option<serde_json::Value>,
    image_mean: Option<[f32; 3]>,
    image_std: Option<[f32; 3]>,
}

impl PreprocessorConfig {
    fn image_size(&self) -> u32 {
        let from = |v: &serde_json::Value| v.as_u64().map(|n| n as u32);
        match &self.size {
            Some(v) if v.is_u64() => from(v),
            Some(v) => v
                .get("height")
                .or_else(|| v.get("shortest_edge"))
                .and_then(from),
            None => None,
        }
        .unwrap_or(DEFAULT_IMAGE_SIZE)
    }

    fn normalization(&self) -> Normalization {
        Normalization {
            mean: self.image_mean.unwrap_or(Normalization::UNIT.mean),
            std: self.image_std.unwrap_or(Normalization::UNIT.std),
        }
    }
}

const DEFAULT_IMAGE_SIZE: u32 = 224;

/// Parse `id2label` into a label vector indexed by class id.
fn parse_labels(content: &str) -> Result<Vec<String>, String> {
    let config: ModelConfig = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let mut indexed = config
        .id2label
        .into_iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|i| (i, label))
                .map_err(|_| format!("non-numeric class id {id:?}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    indexed.sort_by_key(|(i, _)| *i);

    if indexed.iter().enumerate().any(|(pos, (i, _))| pos != *i) {
        return Err("id2label ids are not contiguous from 0".to_string());
    }
    Ok(indexed.into_iter().map(|(_, label)| label).collect())
}

/// An image classifier backed by an ONNX Runtime session.
pub struct OnnxImageClassifier {
    name: String,
    session: Mutex<Session>,
    input_name: String,
    labels: Vec<String>,
    image_size: u32,
    normalization: Normalization,
}

impl OnnxImageClassifier {
    /// Load the classifier stored in `dir`, naming it `name` in output.
    pub fn load(name: &str, dir: &Path) -> Result<Self, PipelineError> {
        let model_path = dir.join("model.onnx");
        let config_path = dir.join("config.json");
        if !Self::model_exists(dir) {
            return Err(PipelineError::Model {
                message: format!(
                    "Classifier {name} not found at {:?}. Run `batchinfer models download --classifiers` first.",
                    dir
                ),
            });
        }

        let config = std::fs::read_to_string(&config_path).map_err(|e| PipelineError::Model {
            message: format!("Failed to read {:?}: {e}", config_path),
        })?;
        let labels = parse_labels(&config).map_err(|message| PipelineError::Model {
            message: format!("Invalid {:?}: {message}", config_path),
        })?;

        let preprocessor_path = dir.join("preprocessor_config.json");
        let preprocessor = match std::fs::read_to_string(&preprocessor_path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| PipelineError::Model {
                message: format!("Invalid {:?}: {e}", preprocessor_path),
            })?,
            Err(_) => PreprocessorConfig::default(),
        };

        let session = Session::builder()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(&model_path)
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to load classifier {name}: {e}"),
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());

        tracing::debug!(
            "Loaded classifier {name} from {:?} ({} labels, input {}px)",
            model_path,
            labels.len(),
            preprocessor.image_size()
        );

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            labels,
            image_size: preprocessor.image_size(),
            normalization: preprocessor.normalization(),
        })
    }

    /// Check whether the classifier files exist.
    pub fn model_exists(dir: &Path) -> bool {
        dir.join("model.onnx").exists() && dir.join("config.json").exists()
    }
}

impl ImageLabeler for OnnxImageClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, image: &DynamicImage) -> Result<Vec<(String, f32)>, PipelineError> {
        let tensor = preprocess_resize(image, self.image_size, &self.normalization);
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = tensor.iter().copied().collect();

        let input = Value::from_array((shape, data)).map_err(|e| PipelineError::Model {
            message: format!("Failed to create input tensor: {e}"),
        })?;

        let mut session = self.session.lock().map_err(|e| PipelineError::Model {
            message: format!("Session lock poisoned: {e}"),
        })?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| PipelineError::Model {
                message: format!("{} inference failed: {e}", self.name),
            })?;

        let logits = outputs
            .iter()
            .find(|(name, _)| *name == "logits")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| PipelineError::Model {
                message: format!("{} produced no outputs", self.name),
            })?;
        let (_shape, data) = logits
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to extract logits: {e}"),
            })?;

        if data.len() < self.labels.len() {
            return Err(PipelineError::Model {
                message: format!(
                    "{} returned {} logits for {} labels",
                    self.name,
                    data.len(),
                    self.labels.len()
                ),
            });
        }

        let scores = crate::math::softmax(&data[..self.labels.len()]);
        Ok(self.labels.iter().cloned().zip(scores).collect())
    }
}

/// Keep labels scoring strictly above `threshold`.
pub fn above_threshold(scores: Vec<(String, f32)>, threshold: f32) -> BTreeMap<String, f32> {
    scores
        .into_iter()
        .filter(|(_, score)| *score > threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels_orders_by_id() {
        let labels =
            parse_labels(r#"{"id2label": {"1": "nsfw", "0": "normal"}, "other": 1}"#).unwrap();
        assert_eq!(labels, vec!["normal", "nsfw"]);
    }

    #[test]
    fn test_parse_labels_numeric_not_lexicographic() {
        let json = r#"{"id2label": {"0": "a", "1": "b", "2": "c", "10": "k", "3": "d",
            "4": "e", "5": "f", "6": "g", "7": "h", "8": "i", "9": "j"}}"#;
        let labels = parse_labels(json).unwrap();
        assert_eq!(labels[2], "c");
        assert_eq!(labels[10], "k");
    }

    #[test]
    fn test_parse_labels_rejects_gaps() {
        assert!(parse_labels(r#"{"id2label": {"0": "a", "2": "c"}}"#).is_err());
        assert!(parse_labels(r#"{"id2label": {"x": "a"}}"#).is_err());
        assert!(parse_labels(r#"{"labels": []}"#).is_err());
    }

    #[test]
    fn test_preprocessor_size_variants() {
        let int: PreprocessorConfig = serde_json::from_str(r#"{"size": 384}"#).unwrap();
        assert_eq!(int.image_size(), 384);

        let obj: PreprocessorConfig =
            serde_json::from_str(r#"{"size": {"height": 256, "width": 256}}"#).unwrap();
        assert_eq!(obj.image_size(), 256);

        let edge: PreprocessorConfig =
            serde_json::from_str(r#"{"size": {"shortest_edge": 288}}"#).unwrap();
        assert_eq!(edge.image_size(), 288);

        assert_eq!(PreprocessorConfig::default().image_size(), 224);
    }

    #[test]
    fn test_preprocessor_normalization() {
        let cfg: PreprocessorConfig = serde_json::from_str(
            r#"{"image_mean": [0.485, 0.456, 0.406], "image_std": [0.229, 0.224, 0.225]}"#,
        )
        .unwrap();
        assert_eq!(cfg.normalization().mean, [0.485, 0.456, 0.406]);
        assert_eq!(PreprocessorConfig::default().normalization(), Normalization::UNIT);
    }

    #[test]
    fn test_above_threshold_is_strict() {
        let scores = vec![
            ("cat".to_string(), 0.7),
            ("dog".to_string(), 0.5),
            ("car".to_string(), 0.1),
        ];
        let kept = above_threshold(scores, 0.5);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains_key("cat"));
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!OnnxImageClassifier::model_exists(dir.path()));
        assert!(OnnxImageClassifier::load("nsfw", dir.path()).is_err());
    }
}
