//! Grayscale and RGB face transforms

use face_frame::FaceImage;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::PreprocessError;

/// Turns a face crop into a model-ready NHWC tensor
pub trait Preprocessor: Send + Sync {
    /// Short identifier used in logs and ensemble info
    fn name(&self) -> &'static str;

    /// Tensor shape produced by [`Preprocessor::prepare`] (N, H, W, C)
    fn input_shape(&self) -> [usize; 4];

    fn prepare(&self, face: &FaceImage) -> Result<Array4<f32>, PreprocessError>;
}

/// Input format a model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// 48x48 single channel (FER2013 from scratch)
    Grayscale48,
    /// 96x96 RGB (MobileNetV3 transfer models)
    Rgb96,
}

impl InputKind {
    /// Preprocessor for this input kind at its default size
    pub fn preprocessor(&self) -> Box<dyn Preprocessor> {
        match self {
            InputKind::Grayscale48 => Box::new(GrayscalePreprocessor::default()),
            InputKind::Rgb96 => Box::new(RgbPreprocessor::default()),
        }
    }
}

fn ensure_not_empty(face: &FaceImage) -> Result<(), PreprocessError> {
    if face.is_empty() {
        return Err(PreprocessError::InvalidInput(format!(
            "crop is {}x{}",
            face.width(),
            face.height()
        )));
    }
    Ok(())
}

fn to_tensor(pixels: &[u8], size: usize, channels: usize) -> Result<Array4<f32>, PreprocessError> {
    let scaled: Vec<f32> = pixels.iter().map(|&p| p as f32 / 255.0).collect();
    Array4::from_shape_vec((1, size, size, channels), scaled)
        .map_err(|e| PreprocessError::Shape(e.to_string()))
}

/// Grayscale, resize to `size` x `size`, scale to [0, 1]
#[derive(Debug, Clone)]
pub struct GrayscalePreprocessor {
    size: u32,
}

impl GrayscalePreprocessor {
    pub fn new(size: u32) -> Self {
        Self { size }
    }
}

impl Default for GrayscalePreprocessor {
    fn default() -> Self {
        Self::new(48)
    }
}

impl Preprocessor for GrayscalePreprocessor {
    fn name(&self) -> &'static str {
        "grayscale"
    }

    fn input_shape(&self) -> [usize; 4] {
        [1, self.size as usize, self.size as usize, 1]
    }

    fn prepare(&self, face: &FaceImage) -> Result<Array4<f32>, PreprocessError> {
        ensure_not_empty(face)?;

        let gray = GrayImage::from_raw(face.width(), face.height(), face.to_grayscale())
            .ok_or_else(|| PreprocessError::InvalidInput("grayscale buffer size mismatch".into()))?;
        let resized = imageops::resize(&gray, self.size, self.size, FilterType::Triangle);
        debug!("Grayscale crop {}x{} -> {}", face.width(), face.height(), self.size);

        to_tensor(resized.as_raw(), self.size as usize, 1)
    }
}

/// RGB, resize to `size` x `size`, scale to [0, 1]
#[derive(Debug, Clone)]
pub struct RgbPreprocessor {
    size: u32,
}

impl RgbPreprocessor {
    pub fn new(size: u32) -> Self {
        Self { size }
    }
}

impl Default for RgbPreprocessor {
    fn default() -> Self {
        Self::new(96)
    }
}

impl Preprocessor for RgbPreprocessor {
    fn name(&self) -> &'static str {
        "rgb"
    }

    fn input_shape(&self) -> [usize; 4] {
        [1, self.size as usize, self.size as usize, 3]
    }

    fn prepare(&self, face: &FaceImage) -> Result<Array4<f32>, PreprocessError> {
        ensure_not_empty(face)?;

        let rgb = RgbImage::from_raw(face.width(), face.height(), face.to_rgb())
            .ok_or_else(|| PreprocessError::InvalidInput("rgb buffer size mismatch".into()))?;
        let resized = imageops::resize(&rgb, self.size, self.size, FilterType::Triangle);
        debug!("RGB crop {}x{} -> {}", face.width(), face.height(), self.size);

        to_tensor(resized.as_raw(), self.size as usize, 3)
    }
}
