//! CLIP zero-shot image labeling.
//!
//! Uses the separate vision and text ONNX exports published by Xenova on
//! Hugging Face. Each installed variant lives in `<model_dir>/clip/<variant>/`
//! with `visual.onnx`, `text_model.onnx` and `tokenizer.json`.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;

use super::preprocess::preprocess_clip;
use crate::error::PipelineError;

/// A CLIP variant that `models download` knows how to fetch.
#[derive(Debug, Clone, Copy)]
pub struct ClipVariant {
    /// Name accepted by `--model`
    pub name: &'static str,
    /// Hugging Face repository with the ONNX export
    pub repo: &'static str,
    /// Input resolution of the vision tower
    pub image_size: u32,
}

/// Variants with a published ONNX export.
pub const CLIP_VARIANTS: &[ClipVariant] = &[
    ClipVariant {
        name: "clip-vit-base-patch32",
        repo: "Xenova/clip-vit-base-patch32",
        image_size: 224,
    },
    ClipVariant {
        name: "clip-vit-base-patch16",
        repo: "Xenova/clip-vit-base-patch16",
        image_size: 224,
    },
    ClipVariant {
        name: "clip-vit-large-patch14",
        repo: "Xenova/clip-vit-large-patch14",
        image_size: 224,
    },
];

/// Files each variant needs locally, paired with their path in the repository.
pub const CLIP_FILES: &[(&str, &str)] = &[
    ("visual.onnx", "onnx/vision_model.onnx"),
    ("text_model.onnx", "onnx/text_model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
];

/// CLIP's learned logit scale, fixed at its trained maximum.
const LOGIT_SCALE: f32 = 100.0;

/// CLIP text context length.
const MAX_TOKENS: usize = 77;

/// Look up a known variant by name.
pub fn variant(name: &str) -> Option<&'static ClipVariant> {
    CLIP_VARIANTS.iter().find(|v| v.name == name)
}

/// Whether all files of a variant are present in `dir`.
pub fn variant_installed(dir: &Path) -> bool {
    CLIP_FILES.iter().all(|(local, _)| dir.join(local).exists())
}

/// Names of known variants installed under `clip_dir`.
pub fn installed_variants(clip_dir: &Path) -> Vec<String> {
    CLIP_VARIANTS
        .iter()
        .filter(|v| variant_installed(&clip_dir.join(v.name)))
        .map(|v| v.name.to_string())
        .collect()
}

/// Encoders needed for zero-shot scoring.
///
/// Both methods return L2-normalized vectors in the shared embedding space.
pub trait ZeroShotScorer: Send + Sync {
    fn encode_image(&self, image: &DynamicImage) -> Result<Vec<f32>, PipelineError>;

    fn encode_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// Score one image embedding against class text embeddings.
///
/// Returns `softmax(100 * image · text)` paired with class names, highest first.
pub fn rank_classes(
    image: &[f32],
    texts: &[Vec<f32>],
    classes: &[String],
) -> Vec<(String, f32)> {
    let logits: Vec<f32> = texts
        .iter()
        .map(|t| LOGIT_SCALE * crate::math::dot(image, t))
        .collect();
    let probs = crate::math::softmax(&logits);

    let mut ranked: Vec<(String, f32)> = classes.iter().cloned().zip(probs).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// A loaded CLIP variant.
pub struct ClipModel {
    visual: Mutex<Session>,
    visual_input: String,
    text: Mutex<Session>,
    text_uses_mask: bool,
    tokenizer: tokenizers::Tokenizer,
    image_size: u32,
}

fn load_session(path: &Path) -> Result<Session, PipelineError> {
    Session::builder()
        .map_err(|e| PipelineError::Model {
            message: format!("Failed to create ONNX session builder: {e}"),
        })?
        .commit_from_file(path)
        .map_err(|e| PipelineError::Model {
            message: format!("Failed to load {:?}: {e}", path),
        })
}

impl ClipModel {
    /// Load a variant from its directory.
    pub fn load(dir: &Path, image_size: u32) -> Result<Self, PipelineError> {
        if !variant_installed(dir) {
            return Err(PipelineError::Model {
                message: format!(
                    "CLIP model not found at {:?}. Run `batchinfer models download --clip <variant>` first.",
                    dir
                ),
            });
        }

        let visual = load_session(&dir.join("visual.onnx"))?;
        let text = load_session(&dir.join("text_model.onnx"))?;
        let tokenizer =
            tokenizers::Tokenizer::from_file(dir.join("tokenizer.json")).map_err(|e| {
                PipelineError::Model {
                    message: format!("Failed to load tokenizer: {e}"),
                }
            })?;

        let visual_input = visual
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());
        let text_uses_mask = text.inputs().iter().any(|i| i.name() == "attention_mask");

        tracing::debug!(
            "Loaded CLIP from {:?} (visual input: {visual_input}, text mask: {text_uses_mask})",
            dir
        );

        Ok(Self {
            visual: Mutex::new(visual),
            visual_input,
            text: Mutex::new(text),
            text_uses_mask,
            tokenizer,
            image_size,
        })
    }
}

/// Split a `[rows, dim]` embedding tensor into normalized rows.
fn split_embeddings(
    shape: &[i64],
    data: &[f32],
    rows: usize,
    name: &str,
) -> Result<Vec<Vec<f32>>, PipelineError> {
    if shape.len() != 2 || shape[0] as usize != rows || shape[1] <= 0 {
        return Err(PipelineError::Model {
            message: format!("Unexpected {name} shape: {:?}", shape),
        });
    }
    let dim = shape[1] as usize;
    Ok(data.chunks(dim).map(crate::math::l2_normalize).collect())
}

/// Find the named output tensor, falling back to the first output.
macro_rules! named_output {
    ($outputs:expr, $name:expr) => {{
        let output = $outputs
            .iter()
            .find(|(n, _)| *n == $name)
            .or_else(|| $outputs.iter().next())
            .ok_or_else(|| PipelineError::Model {
                message: format!("CLIP model did not produce {}", $name),
            })?;
        let (shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to extract {}: {e}", $name),
            })?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        (dims, data.to_vec())
    }};
}

impl ZeroShotScorer for ClipModel {
    fn encode_image(&self, image: &DynamicImage) -> Result<Vec<f32>, PipelineError> {
        let tensor = preprocess_clip(image, self.image_size);
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = tensor.iter().copied().collect();
        let input = Value::from_array((shape, data)).map_err(|e| PipelineError::Model {
            message: format!("Failed to create input tensor: {e}"),
        })?;

        let mut session = self.visual.lock().map_err(|e| PipelineError::Model {
            message: format!("Session lock poisoned: {e}"),
        })?;
        let outputs = session
            .run(ort::inputs![self.visual_input.as_str() => input])
            .map_err(|e| PipelineError::Model {
                message: format!("CLIP image inference failed: {e}"),
            })?;

        let (shape, data) = named_output!(outputs, "image_embeds");
        split_embeddings(&shape, &data, 1, "image_embeds")?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Model {
                message: "CLIP returned no image embedding".to_string(),
            })
    }

    fn encode_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| PipelineError::Model {
                message: format!("Tokenization failed: {e}"),
            })?;

        // Pad to the longest prompt; the text tower pools at the EOS token.
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(MAX_TOKENS))
            .max()
            .unwrap_or(1)
            .max(1);
        let rows = texts.len();
        let mut input_ids = vec![0i64; rows * seq_len];
        let mut attention_mask = vec![0i64; rows * seq_len];
        for (i, encoding) in encodings.iter().enumerate() {
            for (j, &id) in encoding.get_ids().iter().take(seq_len).enumerate() {
                input_ids[i * seq_len + j] = id as i64;
                attention_mask[i * seq_len + j] = 1;
            }
        }

        let shape = vec![rows as i64, seq_len as i64];
        let tensor = |data: Vec<i64>| {
            Value::from_array((shape.clone(), data)).map_err(|e| PipelineError::Model {
                message: format!("Failed to create text tensor: {e}"),
            })
        };
        let ids = tensor(input_ids)?;

        let mut session = self.text.lock().map_err(|e| PipelineError::Model {
            message: format!("Session lock poisoned: {e}"),
        })?;
        let outputs = if self.text_uses_mask {
            let mask = tensor(attention_mask)?;
            session.run(ort::inputs!["input_ids" => ids, "attention_mask" => mask])
        } else {
            session.run(ort::inputs!["input_ids" => ids])
        }
        .map_err(|e| PipelineError::Model {
            message: format!("CLIP text inference failed: {e}"),
        })?;

        let (shape, data) = named_output!(outputs, "text_embeds");
        split_embeddings(&shape, &data, rows, "text_embeds")
    }
}
