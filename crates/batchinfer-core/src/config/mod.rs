//! Configuration management for batchinfer.
//!
//! Configuration is loaded from the platform config directory with defaults
//! for every section, so a missing file is never an error.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Retry policy for remote model calls
    pub retry: RetryConfig,

    /// Image captioning settings
    pub captioning: CaptioningConfig,

    /// Image classification settings
    pub image_classification: ImageClassificationConfig,

    /// CLIP zero-shot labeling settings
    pub clip: ClipConfig,

    /// Zero/few-shot text classification settings
    pub text_classification: TextClassificationConfig,

    /// Text-to-image generation settings
    pub generation: GenerationConfig,

    /// Status endpoint settings
    pub status: StatusConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// LLM provider settings
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.batchinfer.batchinfer/config.toml
    /// - Linux: ~/.config/batchinfer/config.toml
    ///
    /// Falls back to ~/.batchinfer/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "batchinfer", "batchinfer")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".batchinfer").join("config.toml")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        expand(&self.general.model_dir.to_string_lossy())
    }

    /// Directory holding image classifier exports.
    pub fn classifier_dir(&self) -> PathBuf {
        self.model_dir().join("classifiers")
    }

    /// Directory holding CLIP variants.
    pub fn clip_dir(&self) -> PathBuf {
        self.model_dir().join("clip")
    }

    /// Directory holding extra dataset label lists (`<name>.txt`).
    pub fn datasets_dir(&self) -> PathBuf {
        expand(&self.clip.datasets_dir)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.text_classification.batch_size, 100);
        assert_eq!(config.generation.steps, 40);
        assert_eq!(config.limits.max_file_size_mb, 100);
        assert!((config.image_classification.label_threshold - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[text_classification]"));
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let toml = Config::default().to_toml().unwrap();
        let parsed = Config::from_toml(&toml).unwrap();
        assert_eq!(parsed.clip.default_model, "clip-vit-base-patch32");
        assert_eq!(parsed.image_classification.classifiers.len(), 3);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [text_classification]
            batch_size = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.text_classification.batch_size, 10);
        assert_eq!(config.generation.steps, 40);
    }

    #[test]
    fn test_classifier_dir_is_under_model_dir() {
        let mut config = Config::default();
        config.general.model_dir = PathBuf::from("/opt/models");
        assert_eq!(config.classifier_dir(), PathBuf::from("/opt/models/classifiers"));
        assert_eq!(config.clip_dir(), PathBuf::from("/opt/models/clip"));
    }
}
