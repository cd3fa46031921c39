//! Face Preprocessing
//!
//! Converts a face crop into the exact tensor a classifier expects:
//! colour space, input resolution, and [0, 1] scaling.

mod transform;

pub use transform::{GrayscalePreprocessor, InputKind, Preprocessor, RgbPreprocessor};

use thiserror::Error;

/// Errors during preprocessing
#[derive(Debug, Clone, Error)]
pub enum PreprocessError {
    /// Crop has no pixels or a buffer that cannot be coerced
    #[error("Invalid face crop: {0}")]
    InvalidInput(String),

    /// Tensor could not be assembled
    #[error("Tensor shape error: {0}")]
    Shape(String),
}
