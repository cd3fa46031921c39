//! Ensemble configuration

use preprocess::InputKind;
use serde::{Deserialize, Serialize};

/// Largest accepted smoothing history
pub const MAX_SMOOTHING_CAPACITY: usize = 1024;

/// Temporal smoothing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// History capacity (frames)
    pub capacity: usize,

    /// Observations needed before the majority vote replaces the raw label
    pub warmup: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            warmup: 5,
        }
    }
}

/// Which members' top labels are compared for the agreement score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AgreementPolicy {
    /// Compare two members by index
    Pair { first: usize, second: usize },
    /// All members must agree
    Unanimous,
}

impl Default for AgreementPolicy {
    fn default() -> Self {
        AgreementPolicy::Pair { first: 0, second: 1 }
    }
}

/// One ensemble member as described in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Display name, unique within the ensemble
    pub name: String,

    /// Training data provenance
    pub dataset: String,

    /// ONNX model path
    pub path: String,

    /// Fusion weight
    pub weight: f32,

    /// Input format the model was trained on
    pub input: InputKind,

    /// Output label order of the model, when it differs from or must be
    /// checked against the ensemble's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// Full ensemble description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleSpec {
    /// Human readable ensemble type
    pub kind: String,

    /// Combined training set size, for display
    pub total_images: String,

    /// Output label order shared by every member
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    pub models: Vec<ModelSpec>,

    #[serde(default)]
    pub agreement: AgreementPolicy,

    #[serde(default)]
    pub smoothing: SmoothingConfig,
}

fn default_labels() -> Vec<String> {
    classifier::LabelSet::fer2013().to_vec()
}

impl Default for EnsembleSpec {
    fn default() -> Self {
        Self::cross_dataset("models")
    }
}

impl EnsembleSpec {
    /// FER2013 from scratch + ImageNet-pretrained MobileNetV3 fine-tuned on FER2013
    pub fn cross_dataset(models_dir: &str) -> Self {
        Self {
            kind: "Cross-Dataset Ensemble".to_string(),
            total_images: "14M + 35K".to_string(),
            labels: default_labels(),
            models: vec![
                ModelSpec {
                    name: "FER2013 (Scratch)".to_string(),
                    dataset: "FER2013: 35K".to_string(),
                    path: format!("{}/fer_model_best.onnx", models_dir),
                    weight: 0.4,
                    input: InputKind::Grayscale48,
                    labels: None,
                },
                ModelSpec {
                    name: "ImageNet+FER2013 (Transfer)".to_string(),
                    dataset: "ImageNet: 14M + FER2013: 35K".to_string(),
                    path: format!("{}/pretrained/mobilenetv3_finetuned.onnx", models_dir),
                    weight: 0.6,
                    input: InputKind::Rgb96,
                    labels: None,
                },
            ],
            agreement: AgreementPolicy::default(),
            smoothing: SmoothingConfig::default(),
        }
    }

    /// FER2013 from scratch + ImageNet/FER2013/RAF-DB staged transfer model
    pub fn three_dataset(models_dir: &str) -> Self {
        Self {
            kind: "Three-Dataset Cross-Generalization Ensemble".to_string(),
            total_images: "14,065,000".to_string(),
            labels: default_labels(),
            models: vec![
                ModelSpec {
                    name: "FER2013 (Scratch)".to_string(),
                    dataset: "FER2013: 35K".to_string(),
                    path: format!("{}/fer_model_best.onnx", models_dir),
                    weight: 0.3,
                    input: InputKind::Grayscale48,
                    labels: None,
                },
                ModelSpec {
                    name: "ImageNet+FER2013+RAF-DB (Transfer)".to_string(),
                    dataset: "ImageNet: 14M + FER2013: 35K + RAF-DB: 30K".to_string(),
                    path: format!("{}/pretrained/final_cross_dataset.onnx", models_dir),
                    weight: 0.7,
                    input: InputKind::Rgb96,
                    labels: None,
                },
            ],
            agreement: AgreementPolicy::default(),
            smoothing: SmoothingConfig::default(),
        }
    }

    /// Sum of member weights
    pub fn weight_sum(&self) -> f32 {
        self.models.iter().map(|m| m.weight).sum()
    }
}
