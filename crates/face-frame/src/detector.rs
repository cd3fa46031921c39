//! Face detection backends

use std::io::Cursor;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{FaceImage, FrameError};

/// Face bounding box in pixel space, corners (x1, y1) inclusive and (x2, y2) exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Create new box from corners; coordinates are not reordered
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from origin and size, as most detectors report
    pub fn from_xywh(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x.saturating_add(width as i32),
            y2: y.saturating_add(height as i32),
        }
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Clamp corners into a `width` x `height` frame
    pub fn clamp(&self, width: u32, height: u32) -> BoundingBox {
        let (w, h) = (width as i32, height as i32);
        BoundingBox {
            x1: self.x1.clamp(0, w),
            y1: self.y1.clamp(0, h),
            x2: self.x2.clamp(0, w),
            y2: self.y2.clamp(0, h),
        }
    }
}

/// Face detector contract: frame in, pixel-space boxes out
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &FaceImage) -> Result<Vec<BoundingBox>, FrameError>;
}

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// SeetaFace frontal model (`seeta_fd_frontal_v1.0.bin`); `None` treats
    /// every frame as a single pre-cropped face
    pub model_path: Option<String>,

    /// Smallest face reported (pixels)
    pub min_face_size: u32,

    /// Classifier score threshold
    pub score_threshold: f64,

    /// Image pyramid scale step
    pub pyramid_scale_factor: f32,

    /// Sliding window step (pixels, both axes)
    pub slide_window_step: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            min_face_size: 30,
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            slide_window_step: 4,
        }
    }
}

impl DetectorConfig {
    /// Build the detector this config describes
    pub fn build(&self) -> Result<Box<dyn FaceDetector>, FrameError> {
        match &self.model_path {
            Some(_) => Ok(Box::new(RustfaceDetector::new(self)?)),
            None => {
                warn!("No face model path configured. Treating each frame as one face.");
                Ok(Box::new(WholeFrameDetector))
            }
        }
    }
}

/// Face detector backed by the `rustface` crate (SeetaFace engine)
pub struct RustfaceDetector {
    model: rustface::Model,
    config: DetectorConfig,
}

impl RustfaceDetector {
    /// Load the SeetaFace model named in `config`
    pub fn new(config: &DetectorConfig) -> Result<Self, FrameError> {
        let path = config
            .model_path
            .as_deref()
            .ok_or_else(|| FrameError::ModelLoad("no model path configured".into()))?;

        info!("Loading face detection model from {}", path);
        let model_data = std::fs::read(path)
            .map_err(|e| FrameError::ModelLoad(format!("{}: {}", path, e)))?;

        let model = rustface::read_model(Cursor::new(model_data))
            .map_err(|e| FrameError::ModelLoad(format!("{}: {}", path, e)))?;

        Ok(Self {
            model,
            config: config.clone(),
        })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, frame: &FaceImage) -> Result<Vec<BoundingBox>, FrameError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        // Detectors are stateful; each call gets its own
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.config.min_face_size);
        detector.set_score_thresh(self.config.score_threshold);
        detector.set_pyramid_scale_factor(self.config.pyramid_scale_factor);
        let step = self.config.slide_window_step;
        detector.set_slide_window_step(step, step);

        let gray = frame.to_grayscale();
        let image = rustface::ImageData::new(&gray, frame.width(), frame.height());
        let faces = detector.detect(&image);
        debug!("Detected {} faces", faces.len());

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                BoundingBox::from_xywh(bbox.x(), bbox.y(), bbox.width(), bbox.height())
            })
            .collect())
    }
}

/// Treats the whole frame as one face (clients that crop on-device)
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeFrameDetector;

impl FaceDetector for WholeFrameDetector {
    fn detect(&self, frame: &FaceImage) -> Result<Vec<BoundingBox>, FrameError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![BoundingBox::new(0, 0, frame.width() as i32, frame.height() as i32)])
    }
}
