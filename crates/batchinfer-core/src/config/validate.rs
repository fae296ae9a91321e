//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_file_size_mb == 0 {
            return Err(invalid("limits.max_file_size_mb must be > 0"));
        }
        if self.status.timeout_ms == 0 {
            return Err(invalid("status.timeout_ms must be > 0"));
        }
        let threshold = self.image_classification.label_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid(
                "image_classification.label_threshold must be between 0.0 and 1.0",
            ));
        }
        if self.text_classification.batch_size == 0 {
            return Err(invalid("text_classification.batch_size must be > 0"));
        }
        if self.generation.timeout_ms == 0 {
            return Err(invalid("generation.timeout_ms must be > 0"));
        }
        if self.generation.steps == 0 {
            return Err(invalid("generation.steps must be > 0"));
        }
        if self.generation.width == 0 || self.generation.height == 0 {
            return Err(invalid("generation.width and generation.height must be > 0"));
        }
        let split = self.generation.refiner_switch_at;
        if split <= 0.0 || split >= 1.0 {
            return Err(invalid(
                "generation.refiner_switch_at must be strictly between 0.0 and 1.0",
            ));
        }
        if !matches!(self.generation.backend.as_str(), "webui" | "openai") {
            return Err(ConfigError::ValidationError(format!(
                "generation.backend must be \"webui\" or \"openai\", got {:?}",
                self.generation.backend
            )));
        }
        if self.clip.label_template.matches("{}").count() != 1 {
            return Err(invalid(
                "clip.label_template must contain exactly one {} placeholder",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.text_classification.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut config = Config::default();
        config.image_classification.label_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("label_threshold"));

        config.image_classification.label_threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_refiner_split_bounds() {
        let mut config = Config::default();
        config.generation.refiner_switch_at = 1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refiner_switch_at"));
    }

    #[test]
    fn test_validate_rejects_unknown_backend() {
        let mut config = Config::default();
        config.generation.backend = "midjourney".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("midjourney"));
    }

    #[test]
    fn test_validate_rejects_template_without_placeholder() {
        let mut config = Config::default();
        config.clip.label_template = "a photo".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("label_template"));
    }
}
