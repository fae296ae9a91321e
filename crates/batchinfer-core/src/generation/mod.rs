//! Text-to-image generation through remote backends.
//!
//! Backends return encoded image bytes; [`save_jpeg`] normalizes whatever
//! format they send to an RGB JPEG on disk.

mod openai;
mod webui;

pub use openai::OpenAiImageGenerator;
pub use webui::WebUiGenerator;

use async_trait::async_trait;
use base64::Engine;
use image::ImageFormat;
use std::path::Path;

use crate::config::GenerationConfig;
use crate::error::{PipelineError, SetupError};
use crate::llm::provider::resolve_env_var;

/// Maximum length of the sanitized prompt part of a file name.
const MAX_SAFE_PROMPT_LEN: usize = 90;

/// A single generation job.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
}

/// A backend that turns a prompt into an image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Generate one image and return its encoded bytes.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, PipelineError>;
}

/// Create the configured backend.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn ImageGenerator>, SetupError> {
    match config.backend.as_str() {
        "webui" => Ok(Box::new(WebUiGenerator::new(
            &config.webui,
            config.refiner_switch_at,
        ))),
        "openai" => {
            let key = resolve_env_var(&config.openai.api_key).ok_or_else(|| {
                SetupError::Backend(
                    "OpenAI API key not set. Set OPENAI_API_KEY or generation.openai.api_key."
                        .to_string(),
                )
            })?;
            Ok(Box::new(OpenAiImageGenerator::new(&config.openai, &key)))
        }
        other => Err(SetupError::Backend(format!(
            "Unknown generation backend: {other}"
        ))),
    }
}

/// Output file name for a prompt: `<id>-<sanitized prompt>.jpeg`.
///
/// The prompt keeps only `[a-zA-Z0-9 _-]`, spaces become dashes, and the
/// result is lowercased and cut to 90 characters.
pub fn make_filename(id: &str, prompt: &str) -> String {
    let safe: String = prompt
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .map(|c| if c == ' ' { '-' } else { c.to_ascii_lowercase() })
        .take(MAX_SAFE_PROMPT_LEN)
        .collect();
    format!("{id}-{safe}.jpeg")
}

/// Decode a base64 image payload.
pub(crate) fn decode_base64_image(payload: &str) -> Result<Vec<u8>, PipelineError> {
    // WebUI may prefix a data URL header.
    let data = payload
        .split_once("base64,")
        .map(|(_, data)| data)
        .unwrap_or(payload);
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| PipelineError::Generation {
            message: format!("Invalid base64 image in response: {e}"),
            status_code: None,
        })
}

/// Decode generated image bytes and save them as an RGB JPEG.
pub fn save_jpeg(bytes: &[u8], path: &Path) -> Result<(), PipelineError> {
    let image = image::load_from_memory(bytes).map_err(|e| PipelineError::Decode {
        path: path.to_path_buf(),
        message: format!("Backend returned an undecodable image: {e}"),
    })?;
    image
        .to_rgb8()
        .save_with_format(path, ImageFormat::Jpeg)
        .map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Failed to write JPEG: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn test_make_filename() {
        assert_eq!(
            make_filename("54", "Rasta Bill Gates"),
            "54-rasta-bill-gates.jpeg"
        );
        assert_eq!(make_filename("1", "a cat, on Mars!"), "1-a-cat-on-mars.jpeg");
        assert_eq!(make_filename("7", "snake_case-ok"), "7-snake_case-ok.jpeg");
    }

    #[test]
    fn test_make_filename_truncates() {
        let long = "x".repeat(200);
        let name = make_filename("3", &long);
        assert_eq!(name, format!("3-{}.jpeg", "x".repeat(90)));
    }

    #[test]
    fn test_make_filename_drops_non_ascii() {
        assert_eq!(make_filename("2", "café über"), "2-caf-ber.jpeg");
    }

    #[test]
    fn test_decode_base64_with_and_without_header() {
        assert_eq!(decode_base64_image("AQID").unwrap(), vec![1, 2, 3]);
        assert_eq!(
            decode_base64_image("data:image/png;base64,AQID").unwrap(),
            vec![1, 2, 3]
        );
        assert!(decode_base64_image("!!!").is_err());
    }

    #[test]
    fn test_save_jpeg_converts_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 128])))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let path = dir.path().join("1-test.jpeg");
        save_jpeg(&png, &path).unwrap();
        let saved = image::open(&path).unwrap();
        assert_eq!(saved.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn test_save_jpeg_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jpeg");
        assert!(save_jpeg(b"not an image", &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_create_generator() {
        let config = GenerationConfig::default();
        assert_eq!(create_generator(&config).unwrap().name(), "webui");

        let mut unknown = GenerationConfig::default();
        unknown.backend = "midjourney".to_string();
        assert!(create_generator(&unknown).is_err());
    }
}
