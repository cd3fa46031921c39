//! Emotion ensemble
//!
//! Weighted fusion of several emotion classifiers plus per-session
//! majority-vote smoothing over recent predictions.

pub mod analysis;
pub mod config;
pub mod fusion;
pub mod smoother;

use std::collections::HashMap;
use std::sync::Arc;

use classifier::{ClassifierError, DisplayColor};
use face_frame::{FaceImage, FrameError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use analysis::{analyze_frame, detect_and_fuse, FaceAnalysis};
pub use config::{AgreementPolicy, EnsembleSpec, ModelSpec, SmoothingConfig, MAX_SMOOTHING_CAPACITY};
pub use fusion::{
    agreement_score, weighted_sum, EnsembleInfo, EnsembleMember, FusedPrediction, FusionEngine,
    FusionEngineBuilder, ModelScore, ModelWeight,
};
pub use smoother::{Smoothed, SmootherState, TemporalSmoother};

#[derive(Error, Debug)]
pub enum EnsembleError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Inference failed in '{model}': {source}")]
    Inference {
        model: String,
        #[source]
        source: ClassifierError,
    },

    #[error("Invalid ensemble configuration: {0}")]
    Config(String),

    #[error("Label order of '{model}' differs: expected {expected:?}, got {actual:?}")]
    LabelMismatch {
        model: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Model load failed for '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Face detection failed: {0}")]
    Detection(#[from] FrameError),

    #[error("Prediction timed out after {0}ms")]
    Timeout(u64),
}

/// Final, possibly smoothed prediction for one face
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub label_index: usize,
    /// Fused score, or the vote share once smoothing is active
    pub confidence: f32,
    /// Whether majority-vote smoothing produced `label`
    pub smoothed: bool,
    /// Unsmoothed fusion output
    pub fused: FusedPrediction,
}

impl Prediction {
    /// Agreement score of the underlying fusion
    pub fn agreement(&self) -> f32 {
        self.fused.agreement
    }
}

/// One session's view of an ensemble: shared engine, private history
///
/// Cheap to create; build one per stream or user.
#[derive(Debug, Clone)]
pub struct Ensemble {
    engine: Arc<FusionEngine>,
    smoother: TemporalSmoother,
}

impl Ensemble {
    /// Create new session over a shared engine, with an empty history
    pub fn new(engine: Arc<FusionEngine>) -> Self {
        let smoother = TemporalSmoother::new(engine.smoothing());
        Self { engine, smoother }
    }

    /// Build the engine from `spec`, loading every model
    pub fn from_spec(spec: &EnsembleSpec) -> Result<Self, EnsembleError> {
        Ok(Self::new(Arc::new(FusionEngine::from_spec(spec)?)))
    }

    /// Engine used for fusion
    pub fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    /// Another handle to the engine, for building more sessions
    pub fn shared_engine(&self) -> Arc<FusionEngine> {
        Arc::clone(&self.engine)
    }

    /// Fuse `face` and, if requested, smooth the result
    ///
    /// History is only updated after fusion succeeds.
    pub fn predict(
        &mut self,
        face: &FaceImage,
        use_smoothing: bool,
    ) -> Result<Prediction, EnsembleError> {
        let fused = self.engine.fuse(face)?;
        Ok(self.smooth(fused, use_smoothing))
    }

    /// Apply this session's smoothing to an already fused prediction
    ///
    /// With `use_smoothing == false` the history is left untouched.
    pub fn smooth(&mut self, fused: FusedPrediction, use_smoothing: bool) -> Prediction {
        if !use_smoothing {
            return Prediction {
                label: fused.label.clone(),
                label_index: fused.label_index,
                confidence: fused.confidence,
                smoothed: false,
                fused,
            };
        }

        let out = self.smoother.observe(fused.label_index, fused.confidence);
        if out.smoothed && out.label_index != fused.label_index {
            debug!(
                "Smoothing overrode {} with {} ({:.2})",
                fused.label,
                self.engine.label_name(out.label_index),
                out.confidence
            );
        }

        Prediction {
            label: self.engine.label_name(out.label_index),
            label_index: out.label_index,
            confidence: out.confidence,
            smoothed: out.smoothed,
            fused,
        }
    }

    /// Clear the smoothing history; the next frames warm up again
    pub fn reset(&mut self) {
        debug!("Resetting smoothing history ({} entries)", self.smoother.len());
        self.smoother.reset();
    }

    /// Ensemble description from the shared engine
    pub fn info(&self) -> EnsembleInfo {
        self.engine.info()
    }

    /// Display colour for `label`, white when unmapped
    pub fn color_for(&self, label: &str) -> DisplayColor {
        self.engine.color_for(label)
    }

    /// This session's smoothing history
    pub fn smoother(&self) -> &TemporalSmoother {
        &self.smoother
    }

    /// Most frequent recent label; see [`TemporalSmoother::dominant`]
    pub fn dominant_emotion(&self, window: Option<usize>) -> Option<String> {
        self.smoother.dominant(window).map(|i| self.engine.label_name(i))
    }

    /// Label name -> percentage of the current history
    pub fn emotion_distribution(&self) -> HashMap<String, f32> {
        self.smoother
            .distribution()
            .into_iter()
            .map(|(i, percent)| (self.engine.label_name(i), percent))
            .collect()
    }

    /// History as label names, oldest first
    pub fn history_labels(&self) -> Vec<String> {
        self.smoother.history().map(|i| self.engine.label_name(i)).collect()
    }
}
