//! Mock classifier with scripted outputs

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ndarray::Array4;
use tracing::debug;

use crate::{Classifier, ClassifierError, LabelSet, ProbabilityVector};

enum Behaviour {
    /// Same vector on every call
    Fixed(ProbabilityVector),
    /// Pop one vector per call, repeat the last one when drained
    Sequence(Mutex<VecDeque<ProbabilityVector>>),
    /// Every call fails
    Failing(String),
}

/// Classifier returning scripted outputs, for tests and offline demos
pub struct MockClassifier {
    name: String,
    labels: LabelSet,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl MockClassifier {
    /// Always returns `probs`
    pub fn fixed(name: &str, labels: LabelSet, probs: Vec<f32>) -> Self {
        Self::with_behaviour(name, labels, Behaviour::Fixed(ProbabilityVector::new(probs)))
    }

    /// Returns `outputs` in order, then keeps returning the last one
    pub fn sequence(name: &str, labels: LabelSet, outputs: Vec<Vec<f32>>) -> Self {
        let queue = outputs.into_iter().map(ProbabilityVector::new).collect();
        Self::with_behaviour(name, labels, Behaviour::Sequence(Mutex::new(queue)))
    }

    /// Fails every call with `reason`
    pub fn failing(name: &str, labels: LabelSet, reason: &str) -> Self {
        Self::with_behaviour(name, labels, Behaviour::Failing(reason.to_string()))
    }

    fn with_behaviour(name: &str, labels: LabelSet, behaviour: Behaviour) -> Self {
        debug!("Creating mock classifier '{}'", name);
        Self {
            name: name.to_string(),
            labels,
            behaviour,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `score` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Classifier for MockClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn score(&self, _input: &Array4<f32>) -> Result<ProbabilityVector, ClassifierError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let probs = match &self.behaviour {
            Behaviour::Fixed(probs) => probs.clone(),
            Behaviour::Sequence(queue) => {
                let mut queue = queue
                    .lock()
                    .map_err(|e| ClassifierError::InferenceFailed(format!("Lock error: {}", e)))?;
                match queue.len() {
                    0 => return Err(ClassifierError::InferenceFailed("empty mock sequence".into())),
                    1 => queue[0].clone(),
                    _ => queue.pop_front().unwrap_or_default(),
                }
            }
            Behaviour::Failing(reason) => {
                return Err(ClassifierError::InferenceFailed(reason.clone()))
            }
        };

        probs.validate(self.labels.len())?;
        Ok(probs)
    }
}
