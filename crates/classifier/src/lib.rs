//! Emotion Classifiers
//!
//! A classifier maps a preprocessed face tensor to a probability vector
//! over a fixed, ordered label set. Backends:
//! - ONNX models executed with tract
//! - Mock classifiers with fixed outputs (tests, demos)

mod labels;
mod mock;
mod onnx;
mod probability;

pub use labels::{ColorMap, DisplayColor, EmotionLabel, LabelSet};
pub use mock::MockClassifier;
pub use onnx::OnnxClassifier;
pub use probability::{argmax, ProbabilityVector};

use ndarray::Array4;
use thiserror::Error;

/// Errors during classification
#[derive(Debug, Clone, Error)]
pub enum ClassifierError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Invalid output: expected {expected} scores, got {actual}")]
    InvalidOutput { expected: usize, actual: usize },
    #[error("Non-finite score at index {0}")]
    NonFinite(usize),
    #[error("Invalid label set: {0}")]
    InvalidLabels(String),
}

/// Scores a preprocessed face tensor
///
/// Implementations must be side-effect free from the caller's point of view;
/// any caching is internal.
pub trait Classifier: Send + Sync {
    /// Model name used in logs and errors
    fn name(&self) -> &str;

    /// Label order of the vectors this classifier returns
    fn labels(&self) -> &LabelSet;

    fn score(&self, input: &Array4<f32>) -> Result<ProbabilityVector, ClassifierError>;
}
