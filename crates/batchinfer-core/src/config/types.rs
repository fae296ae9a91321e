//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.batchinfer/models"),
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum image file size in megabytes
    pub max_file_size_mb: u64,

    /// Decompression-bomb guard: images with more pixels than this are
    /// skipped. 0 disables the check.
    pub max_image_pixels: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            // Pillow's decompression-bomb error threshold
            max_image_pixels: 178_956_970,
        }
    }
}

/// Retry policy for transient remote failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Max retry attempts after the first call
    pub attempts: u32,

    /// Base delay between retries in milliseconds (doubled per attempt)
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 1000,
        }
    }
}

/// Image captioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptioningConfig {
    /// LLM provider used for captions ("ollama", "openai", "anthropic", "hyperbolic")
    pub provider: String,

    /// Model override; the provider section's model is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Maximum tokens to generate per caption
    pub max_tokens: u32,

    /// Prompt used when none is given on the command line
    pub default_prompt: String,
}

impl Default for CaptioningConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            max_tokens: 20,
            default_prompt: "Write a short caption for this image.".to_string(),
        }
    }
}

/// One ONNX image classification head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSpec {
    /// Short name used in output records and on disk ("features", "nsfw", ...)
    pub name: String,

    /// Upstream model identifier, shown in help and logs
    pub model_name: String,

    /// Hugging Face repository holding the ONNX export
    pub repo: String,

    /// Path of the ONNX file inside the repository
    pub remote_path: String,
}

impl ClassifierSpec {
    fn new(name: &str, model_name: &str, repo: &str) -> Self {
        Self {
            name: name.to_string(),
            model_name: model_name.to_string(),
            repo: repo.to_string(),
            remote_path: "onnx/model.onnx".to_string(),
        }
    }
}

/// Image classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageClassificationConfig {
    /// Labels must score strictly above this to be included in output
    pub label_threshold: f32,

    /// Available classifier heads
    pub classifiers: Vec<ClassifierSpec>,
}

impl Default for ImageClassificationConfig {
    fn default() -> Self {
        Self {
            label_threshold: 0.5,
            classifiers: vec![
                ClassifierSpec::new(
                    "features",
                    "google/vit-base-patch16-224",
                    "Xenova/vit-base-patch16-224",
                ),
                ClassifierSpec::new(
                    "celebrities",
                    "tonyassi/celebrity-classifier",
                    "tonyassi/celebrity-classifier",
                ),
                ClassifierSpec::new(
                    "nsfw",
                    "Falconsai/nsfw_image_detection",
                    "Falconsai/nsfw_image_detection",
                ),
            ],
        }
    }
}

impl ImageClassificationConfig {
    /// Look up a classifier by its short name.
    pub fn classifier(&self, name: &str) -> Option<&ClassifierSpec> {
        self.classifiers.iter().find(|c| c.name == name)
    }
}

/// CLIP zero-shot labeling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    /// Variant used by `models download` when none is named
    pub default_model: String,

    /// Number of top predictions echoed to the log per image
    pub top_k_log: usize,

    /// Prompt template; `{}` is replaced with the class name
    pub label_template: String,

    /// Directory with extra dataset class lists (`<name>.txt`, one class per line)
    pub datasets_dir: String,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            default_model: "clip-vit-base-patch32".to_string(),
            top_k_log: 5,
            label_template: "a photo of a {}".to_string(),
            datasets_dir: "~/.batchinfer/datasets".to_string(),
        }
    }
}

/// A text classification model enabled for this installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextModelEntry {
    /// Model identifier accepted by `--model`
    pub id: String,

    /// LLM provider serving it
    pub provider: String,
}

/// Zero/few-shot text classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextClassificationConfig {
    /// Items classified per batch; bounds memory on large inputs
    pub batch_size: usize,

    /// Maximum tokens the model may reply with per item
    pub max_tokens: u32,

    /// Models that may be requested with `--model`
    pub models: Vec<TextModelEntry>,
}

impl Default for TextClassificationConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_tokens: 32,
            models: vec![
                TextModelEntry {
                    id: "llama3.2".to_string(),
                    provider: "ollama".to_string(),
                },
                TextModelEntry {
                    id: "gpt-4o-mini".to_string(),
                    provider: "openai".to_string(),
                },
            ],
        }
    }
}

impl TextClassificationConfig {
    /// Find the registry entry for a model id.
    pub fn model(&self, id: &str) -> Option<&TextModelEntry> {
        self.models.iter().find(|m| m.id == id)
    }
}

/// Text-to-image generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Backend: "webui" (Stable Diffusion WebUI API) or "openai"
    pub backend: String,

    /// Default number of denoising steps
    pub steps: u32,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Fraction of steps run on the base model before the refiner takes over
    pub refiner_switch_at: f32,

    /// Timeout for a single generation call in milliseconds
    pub timeout_ms: u64,

    /// Stable Diffusion WebUI settings
    pub webui: WebUiConfig,

    /// OpenAI Images settings
    pub openai: OpenAiImagesConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: "webui".to_string(),
            steps: 40,
            width: 1024,
            height: 1024,
            refiner_switch_at: 0.8,
            timeout_ms: 300_000,
            webui: WebUiConfig::default(),
            openai: OpenAiImagesConfig::default(),
        }
    }
}

/// Stable Diffusion WebUI (`/sdapi/v1/txt2img`) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebUiConfig {
    /// API endpoint
    pub endpoint: String,

    /// Base checkpoint to load; the server's current one when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,

    /// Refiner checkpoint; no refiner pass when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refiner_checkpoint: Option<String>,
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:7860".to_string(),
            checkpoint: Some("sd_xl_base_1.0".to_string()),
            refiner_checkpoint: Some("sd_xl_refiner_1.0".to_string()),
        }
    }
}

/// OpenAI Images API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiImagesConfig {
    /// API endpoint (base URL)
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for OpenAiImagesConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: "${OPENAI_API_KEY}".to_string(),
            model: "dall-e-3".to_string(),
        }
    }
}

/// Status endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Timeout for a single status update in milliseconds
    pub timeout_ms: u64,

    /// Value sent as the `status` query parameter
    pub status: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10000,
            status: "running".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// LLM provider configurations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama (local) configuration
    pub ollama: Option<OllamaConfig>,

    /// Hyperbolic configuration
    pub hyperbolic: Option<HyperbolicConfig>,

    /// Anthropic configuration
    pub anthropic: Option<AnthropicConfig>,

    /// OpenAI configuration
    pub openai: Option<OpenAiConfig>,
}

/// Ollama configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama API endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
        }
    }
}

/// Hyperbolic configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperbolicConfig {
    /// API endpoint
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for HyperbolicConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.hyperbolic.xyz/v1".to_string(),
            api_key: "${HYPERBOLIC_API_KEY}".to_string(),
            model: "meta-llama/Llama-3.2-11B-Vision-Instruct".to_string(),
        }
    }
}

/// Anthropic configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: "${ANTHROPIC_API_KEY}".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

/// OpenAI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: "${OPENAI_API_KEY}".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}
