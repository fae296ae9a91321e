//! Image loading with size limits and RGB normalization.

use image::{DynamicImage, ImageDecoder, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Loads images from disk, enforcing configured limits.
pub struct ImageLoader {
    limits: LimitsConfig,
}

/// A decoded image, always in RGB8.
#[derive(Debug)]
pub struct LoadedImage {
    /// The decoded image, converted to RGB
    pub image: DynamicImage,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl LoadedImage {
    /// Whether the image is a 1x1 tracking pixel.
    pub fn is_single_pixel(&self) -> bool {
        self.width == 1 && self.height == 1
    }

    /// Re-encode the image as JPEG bytes.
    pub fn to_jpeg(&self) -> Result<Vec<u8>, PipelineError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to encode JPEG: {e}"),
            })?;
        Ok(bytes)
    }
}

impl ImageLoader {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read and decode an image, detecting the format from its content.
    pub fn load(&self, path: &Path) -> Result<LoadedImage, PipelineError> {
        if !path.is_file() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let size = std::fs::metadata(path)
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot read metadata: {e}"),
            })?
            .len();
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if size > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: size / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let bytes = std::fs::read(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read file: {e}"),
        })?;
        self.decode_bytes(bytes, path)
    }

    /// Decode an in-memory image. `path` is only used in error messages.
    ///
    /// The pixel limit is checked against the header before any pixel data is
    /// decoded. The `image` crate's own allocation cap is lifted so that large
    /// but legitimate images below the limit still decode.
    pub fn decode_bytes(&self, bytes: Vec<u8>, path: &Path) -> Result<LoadedImage, PipelineError> {
        let decode_error = |message: String| PipelineError::Decode {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| decode_error(format!("Cannot detect image format: {e}")))?;
        if reader.format().is_none() {
            return Err(decode_error("Unrecognized image format".to_string()));
        }
        reader.no_limits();

        let decoder = reader
            .into_decoder()
            .map_err(|e| decode_error(e.to_string()))?;
        let (width, height) = decoder.dimensions();
        let max_pixels = self.limits.max_image_pixels;
        if max_pixels > 0 && u64::from(width) * u64::from(height) > max_pixels {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_pixels,
            });
        }

        let image = match DynamicImage::from_decoder(decoder)
            .map_err(|e| decode_error(e.to_string()))?
        {
            rgb @ DynamicImage::ImageRgb8(_) => rgb,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };

        Ok(LoadedImage {
            image,
            width,
            height,
        })
    }
}
