//! Pixel preprocessing for ONNX vision models.
//!
//! Both model families take an NCHW float tensor `[1, 3, H, W]` built from
//! RGB pixels scaled to [0, 1] and normalized per channel. They differ in
//! how the image is brought to the input size:
//! - classifiers resize straight to `size × size`
//! - CLIP resizes the shorter side to `size` and center-crops

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::Array4;

/// Per-channel normalization applied after scaling pixels to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    /// Maps [0, 1] to [-1, 1]. ViT-style default.
    pub const UNIT: Self = Self {
        mean: [0.5, 0.5, 0.5],
        std: [0.5, 0.5, 0.5],
    };

    /// OpenAI CLIP statistics.
    pub const CLIP: Self = Self {
        mean: [0.481_454_66, 0.457_827_5, 0.408_210_73],
        std: [0.268_629_54, 0.261_302_58, 0.275_777_11],
    };
}

/// Resize to `size × size` ignoring aspect ratio, then normalize.
pub fn preprocess_resize(image: &DynamicImage, size: u32, norm: &Normalization) -> Array4<f32> {
    let resized = image.resize_exact(size, size, FilterType::Triangle);
    to_nchw(&resized.to_rgb8(), norm)
}

/// CLIP preprocessing: shorter side to `size` (bicubic), center crop, normalize.
pub fn preprocess_clip(image: &DynamicImage, size: u32) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let scale = size as f32 / width.min(height).max(1) as f32;
    let new_w = ((width as f32 * scale).round() as u32).max(size);
    let new_h = ((height as f32 * scale).round() as u32).max(size);

    let resized = image.resize_exact(new_w, new_h, FilterType::CatmullRom);
    let left = (new_w - size) / 2;
    let top = (new_h - size) / 2;
    let cropped = resized.crop_imm(left, top, size, size);

    to_nchw(&cropped.to_rgb8(), &Normalization::CLIP)
}

/// Convert an RGB buffer into a normalized `[1, 3, H, W]` tensor.
fn to_nchw(rgb: &RgbImage, norm: &Normalization) -> Array4<f32> {
    let (width, height) = rgb.dimensions();
    Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, c, y, x)| {
            let value = rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - norm.mean[c]) / norm.std[c]
        },
    )
}
