//! Probability vectors

use serde::{Deserialize, Serialize};

use crate::ClassifierError;

/// Scores over a label set, indexed by label order
///
/// Entries are expected to be softmax outputs but normalisation is not
/// assumed anywhere downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbabilityVector(Vec<f32>);

impl ProbabilityVector {
    /// Wrap raw scores; see `validate` for checks
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Score at `index`
    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    /// Index of the highest score; ties resolve to the lowest index
    pub fn argmax(&self) -> Option<usize> {
        argmax(&self.0)
    }

    /// Check length against the label count and reject NaN/inf entries
    pub fn validate(&self, expected_len: usize) -> Result<(), ClassifierError> {
        if self.0.len() != expected_len {
            return Err(ClassifierError::InvalidOutput {
                expected: expected_len,
                actual: self.0.len(),
            });
        }
        match self.0.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(ClassifierError::NonFinite(index)),
            None => Ok(()),
        }
    }
}

impl From<Vec<f32>> for ProbabilityVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Index of the first maximum
///
/// Strict comparison keeps the earliest index on ties, unlike
/// `Iterator::max_by` which keeps the last.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, top)) if v <= top => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
