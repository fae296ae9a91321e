//! Local ONNX vision models: multi-head image classification and CLIP.

pub mod classifier;
pub mod clip;
pub mod datasets;
pub mod preprocess;

pub use classifier::{above_threshold, ImageLabeler, OnnxImageClassifier};
pub use clip::{rank_classes, ClipModel, ZeroShotScorer};
pub use datasets::{dataset_classes, parse_categories};
