//! ONNX classifier backed by tract

use ndarray::Array4;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::{Classifier, ClassifierError, LabelSet, ProbabilityVector};

type RunnableOnnx = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Emotion classifier loaded from an ONNX export of a Keras model
pub struct OnnxClassifier {
    name: String,
    model_path: String,
    labels: LabelSet,
    input_shape: [usize; 4],
    model: RunnableOnnx,
}

impl OnnxClassifier {
    /// Load and optimise the model eagerly
    ///
    /// `input_shape` is the NHWC shape the model was exported with and
    /// `labels` the order of its output vector.
    pub fn load(
        name: &str,
        model_path: &str,
        input_shape: [usize; 4],
        labels: LabelSet,
    ) -> Result<Self, ClassifierError> {
        info!("Loading classifier '{}' from {}", name, model_path);

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|m| m.with_input_fact(0, f32::fact(input_shape).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| ClassifierError::ModelLoadError(format!("{}: {}", model_path, e)))?;

        info!("Classifier '{}' loaded (input {:?}, {} labels)", name, input_shape, labels.len());

        Ok(Self {
            name: name.to_string(),
            model_path: model_path.to_string(),
            labels,
            input_shape,
            model,
        })
    }

    /// Get model path
    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn score(&self, input: &Array4<f32>) -> Result<ProbabilityVector, ClassifierError> {
        let start = std::time::Instant::now();

        if input.shape() != self.input_shape {
            return Err(ClassifierError::InvalidInputShape {
                expected: format!("{:?}", self.input_shape),
                actual: format!("{:?}", input.shape()),
            });
        }

        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_shape(&self.input_shape, &data)
            .map_err(|e| ClassifierError::InferenceFailed(e.to_string()))?;

        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| ClassifierError::InferenceFailed(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| ClassifierError::InferenceFailed("model produced no outputs".into()))?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(e.to_string()))?
            .iter()
            .copied()
            .collect();

        let probs = ProbabilityVector::new(scores);
        probs.validate(self.labels.len())?;

        debug!("'{}' inference completed in {}ms", self.name, start.elapsed().as_millis());
        Ok(probs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_fails_at_load() {
        let result = OnnxClassifier::load(
            "fer2013",
            "/nonexistent/fer_model_best.onnx",
            [1, 48, 48, 1],
            LabelSet::fer2013(),
        );
        assert!(matches!(result, Err(ClassifierError::ModelLoadError(_))));
    }
}
