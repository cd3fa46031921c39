//! Weighted fusion of member classifiers

use classifier::{
    argmax, Classifier, ColorMap, DisplayColor, LabelSet, OnnxClassifier, ProbabilityVector,
};
use face_frame::FaceImage;
use preprocess::{PreprocessError, Preprocessor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AgreementPolicy, EnsembleSpec, SmoothingConfig, MAX_SMOOTHING_CAPACITY};
use crate::EnsembleError;

/// Agreement score when the compared members share a top label
pub const AGREEMENT_FULL: f32 = 1.0;
/// Agreement score otherwise
pub const AGREEMENT_PARTIAL: f32 = 0.5;

/// One classifier with its preprocessing and fusion weight
pub struct EnsembleMember {
    name: String,
    dataset: String,
    weight: f32,
    preprocessor: Box<dyn Preprocessor>,
    classifier: Box<dyn Classifier>,
}

impl EnsembleMember {
    /// Create new member; `weight` scales its vector in the fused sum
    pub fn new(
        name: impl Into<String>,
        dataset: impl Into<String>,
        weight: f32,
        preprocessor: Box<dyn Preprocessor>,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        Self {
            name: name.into(),
            dataset: dataset.into(),
            weight,
            preprocessor,
            classifier,
        }
    }

    /// Member name, unique within an engine
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Training dataset, for display
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Fusion weight as configured
    pub fn weight(&self) -> f32 {
        self.weight
    }
}

/// Probability vector produced by one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: String,
    pub probabilities: ProbabilityVector,
}

/// Result of one fusion call, before smoothing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedPrediction {
    /// Top label of the fused vector
    pub label: String,
    pub label_index: usize,
    /// Fused score at `label_index`
    pub confidence: f32,
    /// Weighted sum of member vectors
    pub fused: Vec<f32>,
    /// Member vectors in member order
    pub individual: Vec<ModelScore>,
    /// 1.0 if the compared members agree on the top label, 0.5 otherwise
    pub agreement: f32,
}

/// Member weight entry in [`EnsembleInfo`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelWeight {
    pub model: String,
    pub weight: f32,
}

/// Descriptive ensemble metadata for diagnostics and UIs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleInfo {
    pub kind: String,
    pub models: Vec<String>,
    pub datasets: Vec<String>,
    pub weights: Vec<ModelWeight>,
    pub total_images: String,
    pub labels: Vec<String>,
}

/// Element-wise Σ weight_i * probs_i
///
/// Vectors shorter than `len` contribute nothing past their end; callers
/// validate lengths first.
pub fn weighted_sum(len: usize, parts: &[(f32, &ProbabilityVector)]) -> Vec<f32> {
    let mut fused = vec![0.0f32; len];
    for (weight, probs) in parts {
        for (slot, p) in fused.iter_mut().zip(probs.as_slice()) {
            *slot += weight * p;
        }
    }
    fused
}

/// Binary agreement between member top labels
pub fn agreement_score(policy: AgreementPolicy, individual: &[ProbabilityVector]) -> f32 {
    let top = |i: usize| individual.get(i).and_then(ProbabilityVector::argmax);

    let agree = match policy {
        AgreementPolicy::Pair { first, second } => {
            top(first).is_some() && top(first) == top(second)
        }
        AgreementPolicy::Unanimous => {
            let first = top(0);
            first.is_some() && (1..individual.len()).all(|i| top(i) == first)
        }
    };

    if agree {
        AGREEMENT_FULL
    } else {
        AGREEMENT_PARTIAL
    }
}

/// Immutable ensemble: label order, members, weights, colours
///
/// Shared by reference between sessions; holds no per-session state.
pub struct FusionEngine {
    labels: LabelSet,
    members: Vec<EnsembleMember>,
    agreement: AgreementPolicy,
    smoothing: SmoothingConfig,
    colors: ColorMap,
    kind: String,
    total_images: String,
}

impl std::fmt::Debug for FusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionEngine")
            .field("kind", &self.kind)
            .field("members", &self.members.iter().map(|m| m.name.as_str()).collect::<Vec<_>>())
            .field("agreement", &self.agreement)
            .finish()
    }
}

impl FusionEngine {
    /// Start building an engine over `labels`
    pub fn builder(labels: LabelSet) -> FusionEngineBuilder {
        FusionEngineBuilder::new(labels)
    }

    /// Load every model in `spec` eagerly and build the engine
    pub fn from_spec(spec: &EnsembleSpec) -> Result<Self, EnsembleError> {
        info!("Initializing {} ({} models)", spec.kind, spec.models.len());

        let labels = LabelSet::new(spec.labels.clone())
            .map_err(|e| EnsembleError::Config(e.to_string()))?;
        let mut builder = FusionEngine::builder(labels.clone())
            .kind(&spec.kind)
            .total_images(&spec.total_images)
            .agreement(spec.agreement)
            .smoothing(spec.smoothing);

        for (i, model) in spec.models.iter().enumerate() {
            info!("  [{}/{}] Loading {} ({})", i + 1, spec.models.len(), model.name, model.dataset);

            let model_labels = match &model.labels {
                Some(names) => LabelSet::new(names.clone())
                    .map_err(|e| EnsembleError::Config(e.to_string()))?,
                None => labels.clone(),
            };
            let preprocessor = model.input.preprocessor();
            let classifier = OnnxClassifier::load(
                &model.name,
                &model.path,
                preprocessor.input_shape(),
                model_labels,
            )
            .map_err(|e| EnsembleError::ModelLoad {
                model: model.name.clone(),
                reason: e.to_string(),
            })?;

            builder = builder.member(EnsembleMember::new(
                &model.name,
                &model.dataset,
                model.weight,
                preprocessor,
                Box::new(classifier),
            ));
        }

        builder.build()
    }

    /// Run every member on `face` and fuse the results
    ///
    /// All-or-nothing: the first member failure aborts the call.
    pub fn fuse(&self, face: &FaceImage) -> Result<FusedPrediction, EnsembleError> {
        if face.is_empty() {
            return Err(EnsembleError::InvalidInput(format!(
                "empty face crop ({}x{})",
                face.width(),
                face.height()
            )));
        }

        let mut individual = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let input = member.preprocessor.prepare(face).map_err(|e| match e {
                PreprocessError::InvalidInput(reason) | PreprocessError::Shape(reason) => {
                    EnsembleError::InvalidInput(format!("{}: {}", member.name, reason))
                }
            })?;

            let probs = member.classifier.score(&input).map_err(|source| EnsembleError::Inference {
                model: member.name.clone(),
                source,
            })?;
            probs.validate(self.labels.len()).map_err(|source| EnsembleError::Inference {
                model: member.name.clone(),
                source,
            })?;

            individual.push(probs);
        }

        let parts: Vec<(f32, &ProbabilityVector)> = self
            .members
            .iter()
            .zip(&individual)
            .map(|(member, probs)| (member.weight, probs))
            .collect();
        let fused = weighted_sum(self.labels.len(), &parts);

        let label_index =
            argmax(&fused).ok_or_else(|| EnsembleError::Config("empty label set".into()))?;
        let confidence = fused[label_index];
        let label = self.label_name(label_index);
        let agreement = agreement_score(self.agreement, &individual);

        debug!(
            "Fused prediction: {} (conf={:.3}, agreement={:.1})",
            label, confidence, agreement
        );

        Ok(FusedPrediction {
            label,
            label_index,
            confidence,
            fused,
            individual: self
                .members
                .iter()
                .zip(individual)
                .map(|(member, probabilities)| ModelScore {
                    model: member.name.clone(),
                    probabilities,
                })
                .collect(),
            agreement,
        })
    }

    /// Label set shared by every member
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub(crate) fn label_name(&self, index: usize) -> String {
        self.labels.name(index).unwrap_or_default().to_string()
    }

    /// Members in fusion order
    pub fn members(&self) -> &[EnsembleMember] {
        &self.members
    }

    /// Members compared for the agreement score
    pub fn agreement_policy(&self) -> AgreementPolicy {
        self.agreement
    }

    /// Smoothing settings for sessions built on this engine
    pub fn smoothing(&self) -> SmoothingConfig {
        self.smoothing
    }

    /// Display colour for a label, white when unmapped
    pub fn color_for(&self, label: &str) -> DisplayColor {
        self.colors.get(label)
    }

    /// Ensemble description for display
    pub fn info(&self) -> EnsembleInfo {
        EnsembleInfo {
            kind: self.kind.clone(),
            models: self.members.iter().map(|m| m.name.clone()).collect(),
            datasets: self.members.iter().map(|m| m.dataset.clone()).collect(),
            weights: self
                .members
                .iter()
                .map(|m| ModelWeight {
                    model: m.name.clone(),
                    weight: m.weight,
                })
                .collect(),
            total_images: self.total_images.clone(),
            labels: self.labels.to_vec(),
        }
    }
}

/// Validating builder for [`FusionEngine`]
pub struct FusionEngineBuilder {
    labels: LabelSet,
    members: Vec<EnsembleMember>,
    agreement: AgreementPolicy,
    smoothing: SmoothingConfig,
    colors: ColorMap,
    kind: String,
    total_images: String,
}

impl FusionEngineBuilder {
    fn new(labels: LabelSet) -> Self {
        Self {
            labels,
            members: Vec::new(),
            agreement: AgreementPolicy::default(),
            smoothing: SmoothingConfig::default(),
            colors: ColorMap::fer2013(),
            kind: "Ensemble".to_string(),
            total_images: String::new(),
        }
    }

    /// Append a member
    pub fn member(mut self, member: EnsembleMember) -> Self {
        self.members.push(member);
        self
    }

    /// Set the agreement policy (default: members 0 and 1)
    pub fn agreement(mut self, policy: AgreementPolicy) -> Self {
        self.agreement = policy;
        self
    }

    /// Set the smoothing history and warm-up
    pub fn smoothing(mut self, config: SmoothingConfig) -> Self {
        self.smoothing = config;
        self
    }

    /// Set display colours
    pub fn colors(mut self, colors: ColorMap) -> Self {
        self.colors = colors;
        self
    }

    /// Set the ensemble name shown in info
    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = kind.to_string();
        self
    }

    pub fn total_images(mut self, total: &str) -> Self {
        self.total_images = total.to_string();
        self
    }

    /// Validate and build; every configuration error is reported here
    pub fn build(self) -> Result<FusionEngine, EnsembleError> {
        if self.members.len() < 2 {
            return Err(EnsembleError::Config(format!(
                "an ensemble needs at least 2 members, got {}",
                self.members.len()
            )));
        }

        for (i, member) in self.members.iter().enumerate() {
            if !member.weight.is_finite() {
                return Err(EnsembleError::Config(format!(
                    "member '{}' has non-finite weight {}",
                    member.name, member.weight
                )));
            }
            if self.members[..i].iter().any(|m| m.name == member.name) {
                return Err(EnsembleError::Config(format!(
                    "duplicate member name '{}'",
                    member.name
                )));
            }
            if member.classifier.labels() != &self.labels {
                return Err(EnsembleError::LabelMismatch {
                    model: member.name.clone(),
                    expected: self.labels.to_vec(),
                    actual: member.classifier.labels().to_vec(),
                });
            }
        }

        if let AgreementPolicy::Pair { first, second } = self.agreement {
            if first == second || first >= self.members.len() || second >= self.members.len() {
                return Err(EnsembleError::Config(format!(
                    "agreement pair ({}, {}) is invalid for {} members",
                    first,
                    second,
                    self.members.len()
                )));
            }
        }

        let SmoothingConfig { capacity, warmup } = self.smoothing;
        if capacity == 0 || capacity > MAX_SMOOTHING_CAPACITY {
            return Err(EnsembleError::Config(format!(
                "smoothing capacity {} must be within 1..={}",
                capacity, MAX_SMOOTHING_CAPACITY
            )));
        }
        if warmup == 0 || warmup > capacity {
            return Err(EnsembleError::Config(format!(
                "smoothing warm-up {} must be within 1..={} capacity",
                warmup, capacity
            )));
        }

        // Weights are not required to sum to 1; the raw weights are used as given.
        let weight_sum: f32 = self.members.iter().map(|m| m.weight).sum();
        if (weight_sum - 1.0).abs() > 1e-4 {
            warn!(
                "Ensemble weights sum to {:.4}, not 1.0; fused scores are not normalised",
                weight_sum
            );
        }

        info!(
            "{} ready: {}",
            self.kind,
            self.members
                .iter()
                .map(|m| format!("{} (w={})", m.name, m.weight))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(FusionEngine {
            labels: self.labels,
            members: self.members,
            agreement: self.agreement,
            smoothing: self.smoothing,
            colors: self.colors,
            kind: self.kind,
            total_images: self.total_images,
        })
    }
}
