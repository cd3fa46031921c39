//! Face Frame Library
//!
//! Pixel buffers and face localisation for the emotion pipeline:
//! - Decoded frames (grayscale, BGR, RGB, with optional alpha)
//! - Bounding boxes in pixel space, clamped crops
//! - Face detection backends (SeetaFace via rustface, whole-frame)

pub mod detector;
pub mod frame;

pub use detector::{BoundingBox, DetectorConfig, FaceDetector, RustfaceDetector, WholeFrameDetector};
pub use frame::{ChannelOrder, FaceImage};

use thiserror::Error;

/// Frame error types
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Detector model load failed: {0}")]
    ModelLoad(String),

    #[error("Face detection failed: {0}")]
    Detection(String),
}
